use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

use crate::error::{ConfigError, FilterError};
use crate::filter::{Condition, FilterGroup};
use crate::query::Query;

/// Configuration for reading a source
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub buffer_size: usize,
    pub max_line_length: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            buffer_size: 65536,       // 64KB
            max_line_length: 1048576, // 1MB
        }
    }
}

/// A saved filter chain:
///
/// ```yaml
/// filters:
///   - all: { level: ERROR, container: backend }
///   - any: { tenant: company_a, last_minutes: 30 }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryFile {
    #[serde(default)]
    pub filters: Vec<GroupSpec>,
}

/// One list item of `filters`; exactly one of the two keys is set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    #[serde(default)]
    pub all: Option<IndexMap<String, serde_yaml::Value>>,
    #[serde(default)]
    pub any: Option<IndexMap<String, serde_yaml::Value>>,
}

impl QueryFile {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Resolve every group, with `now` as the reference for `last_minutes`
    pub fn groups_at(&self, now: DateTime<Utc>) -> Result<Vec<FilterGroup>, ConfigError> {
        self.filters
            .iter()
            .enumerate()
            .map(|(index, group)| match (&group.all, &group.any) {
                (Some(pairs), None) => Ok(FilterGroup::all(conditions(pairs, now)?)),
                (None, Some(pairs)) => Ok(FilterGroup::any(conditions(pairs, now)?)),
                _ => Err(ConfigError::Invalid(format!(
                    "filter #{} must have exactly one of 'all' or 'any'",
                    index + 1
                ))),
            })
            .collect()
    }

    /// Chain this file's groups onto `query`, in file order
    pub fn apply(&self, query: &Query, now: DateTime<Utc>) -> Result<Query, ConfigError> {
        Ok(self
            .groups_at(now)?
            .into_iter()
            .fold(query.clone(), |query, group| query.with_group(group)))
    }
}

fn conditions(
    pairs: &IndexMap<String, serde_yaml::Value>,
    now: DateTime<Utc>,
) -> Result<Vec<Condition>, FilterError> {
    pairs
        .iter()
        .map(|(key, value)| Condition::parse_at(key, &scalar_text(key, value)?, now))
        .collect()
}

fn scalar_text(key: &str, value: &serde_yaml::Value) -> Result<String, FilterError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(FilterError::MalformedPair(format!("{}=<non-scalar>", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Level;
    use crate::filter::GroupMode;
    use chrono::TimeZone;

    #[test]
    fn test_parse_query_file() {
        let file = QueryFile::from_yaml_str(
            r#"
filters:
  - all: { level: ERROR, container: backend }
  - any:
      tenant: company_a
      last_minutes: 30
"#,
        )
        .unwrap();

        let now = Utc.with_ymd_and_hms(2025, 10, 7, 17, 0, 0).unwrap();
        let groups = file.groups_at(now).unwrap();
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].mode(), GroupMode::All);
        assert_eq!(
            groups[0].conditions(),
            &[Condition::level(Level::Error), Condition::container("backend")]
        );

        assert_eq!(groups[1].mode(), GroupMode::Any);
        assert_eq!(
            groups[1].conditions(),
            &[
                Condition::field("tenant", "company_a"),
                Condition::after(Utc.with_ymd_and_hms(2025, 10, 7, 16, 30, 0).unwrap()),
            ]
        );
    }

    #[test]
    fn test_numeric_field_values_are_stringified() {
        let file = QueryFile::from_yaml_str("filters:\n  - all: { case_id: 123 }\n").unwrap();
        let groups = file.groups_at(Utc::now()).unwrap();
        assert_eq!(groups[0].conditions(), &[Condition::field("case_id", "123")]);
    }

    #[test]
    fn test_invalid_filter_value() {
        let file = QueryFile::from_yaml_str("filters:\n  - all: { level: LOUD }\n").unwrap();
        assert!(matches!(
            file.groups_at(Utc::now()),
            Err(ConfigError::Filter(FilterError::UnknownLevel(_)))
        ));
    }

    #[test]
    fn test_unknown_group_kind_rejected() {
        assert!(QueryFile::from_yaml_str("filters:\n  - none: { level: ERROR }\n").is_err());
        assert!(QueryFile::from_yaml_str("filterz: []\n").is_err());
    }

    #[test]
    fn test_group_needs_exactly_one_kind() {
        let both = QueryFile::from_yaml_str(
            "filters:\n  - all: { level: ERROR }\n    any: { level: INFO }\n",
        )
        .unwrap();
        assert!(matches!(
            both.groups_at(Utc::now()),
            Err(ConfigError::Invalid(_))
        ));

        let neither = QueryFile::from_yaml_str("filters:\n  - {}\n").unwrap();
        assert!(matches!(
            neither.groups_at(Utc::now()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_empty_file_has_no_groups() {
        let file = QueryFile::from_yaml_str("{}").unwrap();
        assert!(file.groups_at(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_default_reader_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.buffer_size, 65536);
        assert_eq!(config.max_line_length, 1048576);
    }
}
