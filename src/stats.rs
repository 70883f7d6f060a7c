use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::entry::Entry;

/// Bucket used for entries without a level or container
pub const UNKNOWN_BUCKET: &str = "unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl TimeRange {
    fn update(&mut self, timestamp: DateTime<Utc>) {
        if self.earliest.map_or(true, |earliest| timestamp < earliest) {
            self.earliest = Some(timestamp);
        }
        if self.latest.map_or(true, |latest| timestamp > latest) {
            self.latest = Some(timestamp);
        }
    }
}

/// Summary of one pass over a query's entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub total: usize,
    pub by_level: BTreeMap<String, usize>,
    pub by_container: BTreeMap<String, usize>,
    pub time_range: TimeRange,
    /// Lines dropped by the decoder during the pass
    pub decode_failures: usize,
}

/// Single-pass accumulator. Memory grows only with the number of distinct
/// levels and containers seen.
#[derive(Debug, Default)]
pub struct Aggregator {
    summary: StatsSummary,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, entry: &Entry) {
        let summary = &mut self.summary;
        summary.total += 1;

        let level = entry.level().map_or(UNKNOWN_BUCKET, |level| level.as_str());
        bump(&mut summary.by_level, level);

        let container = entry.container_name().unwrap_or(UNKNOWN_BUCKET);
        bump(&mut summary.by_container, container);

        if let Some(timestamp) = entry.timestamp() {
            summary.time_range.update(timestamp);
        }
    }

    pub fn finish(self, decode_failures: usize) -> StatsSummary {
        StatsSummary {
            decode_failures,
            ..self.summary
        }
    }
}

fn bump(counts: &mut BTreeMap<String, usize>, key: &str) {
    if let Some(count) = counts.get_mut(key) {
        *count += 1;
    } else {
        counts.insert(key.to_string(), 1);
    }
}

/// Line-level counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Physical lines read, blank ones included
    pub lines_read: usize,
    pub blank_lines: usize,
    pub decode_failures: usize,
    pub entries_decoded: usize,
    pub entries_matched: usize,
}
