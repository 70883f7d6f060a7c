use chrono::SecondsFormat;
use std::io::Write;

use crate::colors::ColorScheme;
use crate::entry::Entry;
use crate::error::ExportError;

pub const CSV_HEADER: [&str; 6] = ["timestamp", "level", "component", "message", "container", "pod"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[value(name = "json", help = "A single JSON array of entries")]
    Json,
    #[value(name = "jsonl", help = "JSON Lines format (one JSON object per line)")]
    Jsonl,
    #[value(name = "csv", help = "Comma-separated values with a header row")]
    Csv,
    #[default]
    #[value(name = "text", help = "One human-readable line per entry")]
    Text,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" => Ok(ExportFormat::Jsonl),
            "csv" => Ok(ExportFormat::Csv),
            "text" => Ok(ExportFormat::Text),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

/// Writes entries one at a time in the chosen format; nothing is buffered
/// beyond the entry being written.
pub struct OutputFormatter {
    format: ExportFormat,
    colors: ColorScheme,
}

impl OutputFormatter {
    pub fn new(format: ExportFormat) -> Self {
        Self::new_with_colors(format, false)
    }

    /// Colors apply to the text format only
    pub fn new_with_colors(format: ExportFormat, use_colors: bool) -> Self {
        OutputFormatter {
            format,
            colors: ColorScheme::new(use_colors),
        }
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn write_all<W: Write>(
        &mut self,
        output: &mut W,
        entries: impl Iterator<Item = Entry>,
    ) -> Result<usize, ExportError> {
        match self.format {
            ExportFormat::Json => self.write_json(output, entries),
            ExportFormat::Jsonl => self.write_jsonl(output, entries),
            ExportFormat::Csv => self.write_csv(output, entries),
            ExportFormat::Text => self.write_text(output, entries),
        }
    }

    fn write_json<W: Write>(
        &self,
        output: &mut W,
        entries: impl Iterator<Item = Entry>,
    ) -> Result<usize, ExportError> {
        let mut written = 0;
        output.write_all(b"[\n")?;
        for entry in entries {
            if written > 0 {
                output.write_all(b",\n")?;
            }
            serde_json::to_writer(&mut *output, &entry)?;
            written += 1;
        }
        output.write_all(b"\n]\n")?;
        Ok(written)
    }

    fn write_jsonl<W: Write>(
        &self,
        output: &mut W,
        entries: impl Iterator<Item = Entry>,
    ) -> Result<usize, ExportError> {
        let mut written = 0;
        for entry in entries {
            serde_json::to_writer(&mut *output, &entry)?;
            output.write_all(b"\n")?;
            written += 1;
        }
        Ok(written)
    }

    fn write_csv<W: Write>(
        &self,
        output: &mut W,
        entries: impl Iterator<Item = Entry>,
    ) -> Result<usize, ExportError> {
        let mut writer = csv::Writer::from_writer(output);
        writer.write_record(CSV_HEADER)?;

        let mut written = 0;
        for entry in entries {
            writer.write_record([
                entry.timestamp().map(format_timestamp).unwrap_or_default().as_str(),
                entry.level().map_or("", |level| level.as_str()),
                entry.component().unwrap_or_default(),
                entry.message(),
                entry.container_name().unwrap_or_default(),
                entry.pod_name().unwrap_or_default(),
            ])?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    fn write_text<W: Write>(
        &self,
        output: &mut W,
        entries: impl Iterator<Item = Entry>,
    ) -> Result<usize, ExportError> {
        let mut written = 0;
        for entry in entries {
            writeln!(output, "{}", self.format_text(&entry))?;
            written += 1;
        }
        Ok(written)
    }

    /// `[timestamp] [LEVEL] component: message`
    pub fn format_text(&self, entry: &Entry) -> String {
        let timestamp = entry
            .timestamp()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        let level = entry.level().map_or("UNKNOWN", |level| level.as_str());
        let component = entry.component().unwrap_or("UNKNOWN");

        format!(
            "[{}] [{}] {}: {}",
            self.colors.paint(self.colors.timestamp, &timestamp),
            self.colors.paint(self.colors.level(entry.level()), level),
            self.colors.paint(self.colors.component, component),
            entry.message()
        )
    }
}

fn format_timestamp(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_line;

    fn entries() -> Vec<Entry> {
        [
            r#"{"time":"2025-10-07T16:19:05.771609Z","log":"INFO:app.main:Resolved, tenant=company_a","kubernetes":{"pod_name":"backend-1","container_name":"backend"}}"#,
            r#"{"log":"no prefix at all"}"#,
        ]
        .iter()
        .map(|line| decode_line(line).unwrap())
        .collect()
    }

    fn render(format: ExportFormat, entries: Vec<Entry>) -> (usize, String) {
        let mut out = Vec::new();
        let count = OutputFormatter::new(format)
            .write_all(&mut out, entries.into_iter())
            .unwrap();
        (count, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_json_array_is_valid() {
        let (count, text) = render(ExportFormat::Json, entries());
        assert_eq!(count, 2);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        let array = parsed.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["level"], "INFO");
        assert_eq!(array[0]["timestamp"], "2025-10-07T16:19:05.771609Z");
        assert_eq!(array[0]["fields"]["tenant"], "company_a");
        assert!(array[1]["level"].is_null());
        assert!(array[1]["timestamp"].is_null());
        assert!(array[1]["pod_name"].is_null());
    }

    #[test]
    fn test_empty_json_array_is_valid() {
        let (count, text) = render(ExportFormat::Json, Vec::new());
        assert_eq!(count, 0);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, serde_json::json!([]));
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let (_, text) = render(ExportFormat::Jsonl, entries());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(serde_json::from_str::<serde_json::Value>(line).unwrap().is_object());
        }
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let (_, text) = render(ExportFormat::Csv, entries());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,level,component,message,container,pod");
        assert_eq!(
            lines[1],
            r#"2025-10-07T16:19:05.771609Z,INFO,app.main,"Resolved, tenant=company_a",backend,backend-1"#
        );
        assert_eq!(lines[2], ",,,no prefix at all,,");
    }

    #[test]
    fn test_csv_header_written_without_entries() {
        let (_, text) = render(ExportFormat::Csv, Vec::new());
        assert_eq!(text, "timestamp,level,component,message,container,pod\n");
    }

    #[test]
    fn test_text_lines() {
        let (_, text) = render(ExportFormat::Text, entries());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "[2025-10-07T16:19:05.771609Z] [INFO] app.main: Resolved, tenant=company_a"
        );
        assert_eq!(lines[1], "[-] [UNKNOWN] UNKNOWN: no prefix at all");
    }

    #[test]
    fn test_text_colors() {
        let formatter = OutputFormatter::new_with_colors(ExportFormat::Text, true);
        let line = formatter.format_text(&entries()[0]);
        assert!(line.contains("\x1b[32mINFO\x1b[0m"));
    }

    /// Accepts `limit` bytes, then fails like a pipe whose reader exited
    struct ClosedPipe {
        limit: usize,
    }

    impl Write for ClosedPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.limit == 0 {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            let n = buf.len().min(self.limit);
            self.limit -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn write_to_closed_pipe(format: ExportFormat, limit: usize) -> ExportError {
        OutputFormatter::new(format)
            .write_all(&mut ClosedPipe { limit }, entries().into_iter())
            .unwrap_err()
    }

    #[test]
    fn test_broken_pipe_inside_json_encoder() {
        // "[\n" fits, the first object does not
        let err = write_to_closed_pipe(ExportFormat::Json, 2);
        assert!(matches!(err, ExportError::Json(_)));
        assert!(err.is_broken_pipe());

        let err = write_to_closed_pipe(ExportFormat::Jsonl, 0);
        assert!(matches!(err, ExportError::Json(_)));
        assert!(err.is_broken_pipe());
    }

    #[test]
    fn test_broken_pipe_in_csv_and_text() {
        assert!(write_to_closed_pipe(ExportFormat::Csv, 0).is_broken_pipe());
        assert!(write_to_closed_pipe(ExportFormat::Text, 0).is_broken_pipe());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
