// src/reader.rs
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ReaderConfig;
use crate::error::{DecodeFailure, StreamError};

/// Something that can be opened, from the start, any number of times
pub trait Source: Send + Sync {
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
    fn describe(&self) -> String;
}

/// A file on disk, reopened on every pass
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Shared in-memory bytes
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        MemorySource {
            data: Arc::from(data.into()),
        }
    }
}

impl Source for MemorySource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }

    fn describe(&self) -> String {
        format!("<memory: {} bytes>", self.data.len())
    }
}

/// A non-blank line, or the reason it cannot be decoded at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawLine {
    Text(String),
    Invalid(DecodeFailure),
}

/// Pull-based line iterator over one opened source.
///
/// Holds one reusable byte buffer, so memory is bounded by the longest line.
/// Blank lines are skipped. A read error ends the sequence and is kept
/// in `error()`.
pub struct LineReader {
    reader: Box<dyn BufRead + Send>,
    buffer: Vec<u8>,
    max_line_length: usize,
    line_number: usize,
    blank_lines: usize,
    error: Option<io::Error>,
    done: bool,
}

impl LineReader {
    pub fn open(source: &dyn Source, config: &ReaderConfig) -> Result<Self, StreamError> {
        let inner = source.open().map_err(|e| StreamError::Open {
            source_name: source.describe(),
            source: e,
        })?;
        Ok(Self::new(
            Box::new(BufReader::with_capacity(config.buffer_size, inner)),
            config,
        ))
    }

    pub fn new(reader: Box<dyn BufRead + Send>, config: &ReaderConfig) -> Self {
        LineReader {
            reader,
            buffer: Vec::new(),
            max_line_length: config.max_line_length,
            line_number: 0,
            blank_lines: 0,
            error: None,
            done: false,
        }
    }

    /// Physical lines read so far, blank ones included
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn blank_lines(&self) -> usize {
        self.blank_lines
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn classify(&mut self) -> Option<RawLine> {
        let mut line: &[u8] = &self.buffer;
        if let Some(stripped) = line.strip_suffix(b"\n") {
            line = stripped;
        }
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }

        if line.iter().all(u8::is_ascii_whitespace) {
            self.blank_lines += 1;
            return None;
        }

        if line.len() > self.max_line_length {
            return Some(RawLine::Invalid(DecodeFailure::LineTooLong {
                length: line.len(),
                max_length: self.max_line_length,
            }));
        }

        let text = match std::str::from_utf8(line) {
            Ok(text) => text,
            Err(_) => return Some(RawLine::Invalid(DecodeFailure::InvalidUtf8)),
        };

        if text.trim().is_empty() {
            self.blank_lines += 1;
            return None;
        }

        Some(RawLine::Text(text.to_string()))
    }
}

impl Iterator for LineReader {
    type Item = RawLine;

    fn next(&mut self) -> Option<RawLine> {
        while !self.done {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    if let Some(line) = self.classify() {
                        return Some(line);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!(
                        "read failed after line {}, stopping: {}",
                        self.line_number,
                        e
                    );
                    self.error = Some(e);
                    self.done = true;
                }
            }
        }
        None
    }
}
