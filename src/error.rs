/// The source could not be opened. The only fatal condition of a read pass.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Failed to open '{source_name}': {source}")]
    Open {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single line produced no entry. Recovered and counted, never surfaced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Record has neither a message nor pod metadata")]
    NoContent,

    #[error("Line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Line too long: {length} > {max_length}")]
    LineTooLong { length: usize, max_length: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid time for '{key}': {value}")]
    InvalidTime { key: String, value: String },

    #[error("Unknown log level: {0} (expected DEBUG, INFO, WARNING or ERROR)")]
    UnknownLevel(String),

    #[error("Invalid minute count for 'last_minutes': {0}")]
    InvalidMinutes(String),

    #[error("Expected KEY=VALUE, got '{0}'")]
    MalformedPair(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),
}

impl ExportError {
    /// Kind of the underlying write failure, whichever encoder reported it
    pub fn io_error_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ExportError::Stream(_) => None,
            ExportError::Io(e) => Some(e.kind()),
            ExportError::Json(e) => e.io_error_kind(),
            ExportError::Csv(e) => match e.kind() {
                csv::ErrorKind::Io(e) => Some(e.kind()),
                _ => None,
            },
        }
    }

    /// The reader went away, e.g. `podlog ... | head`
    pub fn is_broken_pipe(&self) -> bool {
        self.io_error_kind() == Some(std::io::ErrorKind::BrokenPipe)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read query file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed query file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid query file: {0}")]
    Invalid(String),

    #[error("Invalid filter in query file: {0}")]
    Filter(#[from] FilterError),
}
