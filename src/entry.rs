use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;

/// Severity carried in the `LEVEL:component:` message prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warning, Level::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Case-sensitive: "error" is not a level.
impl FromStr for Level {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| FilterError::UnknownLevel(s.to_string()))
    }
}

/// Pod metadata from the `kubernetes` sub-object of a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodMetadata {
    pub pod_name: Option<String>,
    pub namespace: Option<String>,
    pub container_name: Option<String>,
}

/// What the message sub-parser extracted from the raw message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub level: Option<Level>,
    pub component: Option<String>,
    pub message: String,
    pub fields: IndexMap<String, String>,
}

/// One decoded log record. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    timestamp: Option<DateTime<Utc>>,
    level: Option<Level>,
    component: Option<String>,
    message: String,
    raw_message: String,
    stream: Option<String>,
    pod_name: Option<String>,
    namespace: Option<String>,
    container_name: Option<String>,
    fields: IndexMap<String, String>,
}

impl Entry {
    pub(crate) fn new(
        timestamp: Option<DateTime<Utc>>,
        stream: Option<String>,
        raw_message: String,
        metadata: PodMetadata,
        parsed: ParsedMessage,
    ) -> Self {
        Entry {
            timestamp,
            level: parsed.level,
            component: parsed.component,
            message: parsed.message,
            raw_message,
            stream,
            pod_name: metadata.pod_name,
            namespace: metadata.namespace,
            container_name: metadata.container_name,
            fields: parsed.fields,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn level(&self) -> Option<Level> {
        self.level
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// Message text with any `LEVEL:component:` prefix removed
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `log` field exactly as it appeared in the record
    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    pub fn stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    pub fn pod_name(&self) -> Option<&str> {
        self.pod_name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}
