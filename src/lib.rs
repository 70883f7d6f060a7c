// src/lib.rs
pub mod colors;
pub mod config;
pub mod decoder;
pub mod entry;
pub mod error;
pub mod filter;
pub mod message;
pub mod output_format;
pub mod query;
pub mod reader;
pub mod stats;

pub use error::*;

pub use config::{QueryFile, ReaderConfig};
pub use entry::{Entry, Level};
pub use filter::{Condition, FilterGroup, GroupMode};
pub use output_format::{ExportFormat, OutputFormatter};
pub use query::{Entries, Query};
pub use reader::{FileSource, MemorySource, Source};
pub use stats::{Aggregator, PassStats, StatsSummary, TimeRange};
