use crate::entry::Level;

/// ANSI color codes for text output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub timestamp: &'static str,   // Blue for timestamps
    pub component: &'static str,   // Cyan for component paths
    pub level_error: &'static str, // Red for ERROR
    pub level_warn: &'static str,  // Yellow for WARNING
    pub level_info: &'static str,  // Green for INFO
    pub level_debug: &'static str, // Gray for DEBUG
    pub reset: &'static str,       // Reset to default color
}

impl ColorScheme {
    pub fn new(use_colors: bool) -> Self {
        if use_colors {
            Self {
                timestamp: "\x1b[34m",
                component: "\x1b[36m",
                level_error: "\x1b[31m",
                level_warn: "\x1b[33m",
                level_info: "\x1b[32m",
                level_debug: "\x1b[90m",
                reset: "\x1b[0m",
            }
        } else {
            // All empty strings for no-color mode
            Self {
                timestamp: "",
                component: "",
                level_error: "",
                level_warn: "",
                level_info: "",
                level_debug: "",
                reset: "",
            }
        }
    }

    pub fn level(&self, level: Option<Level>) -> &'static str {
        match level {
            Some(Level::Error) => self.level_error,
            Some(Level::Warning) => self.level_warn,
            Some(Level::Info) => self.level_info,
            Some(Level::Debug) => self.level_debug,
            None => "",
        }
    }

    /// Wrap `text` in `color`, leaving it bare when the color is empty
    pub fn paint(&self, color: &str, text: &str) -> String {
        if color.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", color, text, self.reset)
        }
    }
}
