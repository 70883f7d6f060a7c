use chrono::Utc;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ReaderConfig;
use crate::decoder::decode_line;
use crate::entry::Entry;
use crate::error::{DecodeFailure, ExportError, FilterError, StreamError};
use crate::filter::{Condition, FilterGroup};
use crate::output_format::{ExportFormat, OutputFormatter};
use crate::reader::{FileSource, LineReader, RawLine, Source};
use crate::stats::{Aggregator, PassStats, StatsSummary};

/// An immutable filter chain bound to a source.
///
/// Every chaining call returns a new `Query` that shares the parent's groups;
/// the parent is left untouched. Nothing is read until `iter`, `stats` or
/// `export` is called, and each of those reopens the source from the start.
#[derive(Clone)]
pub struct Query {
    source: Arc<dyn Source>,
    config: ReaderConfig,
    groups: Vec<Arc<FilterGroup>>,
}

impl Query {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::from_source(FileSource::new(path))
    }

    pub fn from_source(source: impl Source + 'static) -> Self {
        Self::from_source_with_config(source, ReaderConfig::default())
    }

    pub fn from_source_with_config(source: impl Source + 'static, config: ReaderConfig) -> Self {
        Query {
            source: Arc::new(source),
            config,
            groups: Vec::new(),
        }
    }

    /// Append a group, ANDed with everything already in the chain
    pub fn with_group(&self, group: FilterGroup) -> Query {
        let mut groups = self.groups.clone();
        groups.push(Arc::new(group));
        Query {
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            groups,
        }
    }

    /// All of `conditions` must hold
    pub fn filter_all(&self, conditions: impl IntoIterator<Item = Condition>) -> Query {
        self.with_group(FilterGroup::all(conditions))
    }

    /// At least one of `conditions` must hold
    pub fn filter_any(&self, conditions: impl IntoIterator<Item = Condition>) -> Query {
        self.with_group(FilterGroup::any(conditions))
    }

    /// `filter_all` from `(key, value)` pairs; see `Condition::parse` for the keys
    pub fn where_all<K, V>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Query, FilterError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(self.filter_all(parse_pairs(pairs)?))
    }

    /// `filter_any` from `(key, value)` pairs
    pub fn where_any<K, V>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Query, FilterError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(self.filter_any(parse_pairs(pairs)?))
    }

    pub fn groups(&self) -> impl Iterator<Item = &FilterGroup> {
        self.groups.iter().map(Arc::as_ref)
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        matches_groups(&self.groups, entry)
    }

    /// Open the source and return a lazy iterator of matching entries
    pub fn iter(&self) -> Result<Entries, StreamError> {
        let lines = LineReader::open(self.source.as_ref(), &self.config)?;
        Ok(Entries {
            lines,
            groups: self.groups.clone(),
            decode_failures: 0,
            entries_decoded: 0,
            entries_matched: 0,
        })
    }

    pub fn stats(&self) -> Result<StatsSummary, StreamError> {
        let mut entries = self.iter()?;
        let mut aggregator = Aggregator::new();
        for entry in entries.by_ref() {
            aggregator.observe(&entry);
        }
        Ok(aggregator.finish(entries.decode_failures()))
    }

    /// Stream every matching entry to `writer`. Returns the entry count.
    pub fn export<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<usize, ExportError> {
        self.export_with(writer, &mut OutputFormatter::new(format))
    }

    pub fn export_with<W: Write>(
        &self,
        writer: &mut W,
        formatter: &mut OutputFormatter,
    ) -> Result<usize, ExportError> {
        let entries = self.iter()?;
        let written = formatter.write_all(writer, entries)?;
        writer.flush()?;
        Ok(written)
    }

    pub fn export_to_path(&self, path: &Path, format: ExportFormat) -> Result<usize, ExportError> {
        // Open the source before creating the output file
        let entries = self.iter()?;
        let mut writer = BufWriter::new(File::create(path)?);
        let written = OutputFormatter::new(format).write_all(&mut writer, entries)?;
        writer.flush()?;
        Ok(written)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("source", &self.source.describe())
            .field("config", &self.config)
            .field("groups", &self.groups)
            .finish()
    }
}

fn parse_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Vec<Condition>, FilterError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    // One clock reading per call, so every last_minutes in the group agrees
    let now = Utc::now();
    pairs
        .into_iter()
        .map(|(key, value)| Condition::parse_at(key.as_ref(), value.as_ref(), now))
        .collect()
}

fn matches_groups(groups: &[Arc<FilterGroup>], entry: &Entry) -> bool {
    groups.iter().all(|group| group.matches(entry))
}

/// Lazy iterator over the entries of one pass.
///
/// Holds a single line buffer and at most one decoded entry. Dropping it
/// closes the source.
pub struct Entries {
    lines: LineReader,
    groups: Vec<Arc<FilterGroup>>,
    decode_failures: usize,
    entries_decoded: usize,
    entries_matched: usize,
}

impl Entries {
    /// Lines skipped so far because they could not be decoded
    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }

    /// The I/O error that ended the pass early, if any
    pub fn read_error(&self) -> Option<&io::Error> {
        self.lines.error()
    }

    pub fn pass_stats(&self) -> PassStats {
        PassStats {
            lines_read: self.lines.line_number(),
            blank_lines: self.lines.blank_lines(),
            decode_failures: self.decode_failures,
            entries_decoded: self.entries_decoded,
            entries_matched: self.entries_matched,
        }
    }

    fn record_failure(&mut self, failure: DecodeFailure) {
        self.decode_failures += 1;
        log::debug!("line {}: skipped: {}", self.lines.line_number(), failure);
    }
}

impl Iterator for Entries {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        loop {
            let line = match self.lines.next()? {
                RawLine::Text(line) => line,
                RawLine::Invalid(failure) => {
                    self.record_failure(failure);
                    continue;
                }
            };

            match decode_line(&line) {
                Ok(entry) => {
                    self.entries_decoded += 1;
                    if matches_groups(&self.groups, &entry) {
                        self.entries_matched += 1;
                        return Some(entry);
                    }
                }
                Err(failure) => self.record_failure(failure),
            }
        }
    }
}
