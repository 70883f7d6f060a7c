use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

use crate::decoder::parse_timestamp;
use crate::entry::{Entry, Level};
use crate::error::FilterError;

/// A single named rule over one Entry field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Level(Level),
    Container(String),
    Pod(String),
    Namespace(String),
    /// Timestamp at or after the instant
    After(DateTime<Utc>),
    /// Timestamp at or before the instant
    Before(DateTime<Utc>),
    /// Exact match on a message key=value field
    Field { key: String, value: String },
}

impl Condition {
    pub fn level(level: Level) -> Self {
        Condition::Level(level)
    }

    pub fn container(name: impl Into<String>) -> Self {
        Condition::Container(name.into())
    }

    pub fn pod(name: impl Into<String>) -> Self {
        Condition::Pod(name.into())
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Condition::Namespace(name.into())
    }

    pub fn after(instant: DateTime<Utc>) -> Self {
        Condition::After(instant)
    }

    pub fn before(instant: DateTime<Utc>) -> Self {
        Condition::Before(instant)
    }

    pub fn field(key: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Field {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Lower time bound `minutes` before `now`, fixed at construction
    pub fn last_minutes(minutes: f64, now: DateTime<Utc>) -> Result<Self, FilterError> {
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(FilterError::InvalidMinutes(minutes.to_string()));
        }
        let cutoff = TimeDelta::try_milliseconds((minutes * 60_000.0) as i64)
            .and_then(|delta| now.checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(Condition::After(cutoff))
    }

    /// Build a condition from a filter key and its string value.
    /// `last_minutes` is resolved against the current clock.
    pub fn parse(key: &str, value: &str) -> Result<Self, FilterError> {
        Self::parse_at(key, value, Utc::now())
    }

    pub fn parse_at(key: &str, value: &str, now: DateTime<Utc>) -> Result<Self, FilterError> {
        let instant = || {
            parse_timestamp(value).ok_or_else(|| FilterError::InvalidTime {
                key: key.to_string(),
                value: value.to_string(),
            })
        };

        match key {
            "level" => Ok(Condition::Level(value.parse()?)),
            "container" => Ok(Condition::container(value)),
            "pod" | "pod_name" => Ok(Condition::pod(value)),
            "namespace" => Ok(Condition::namespace(value)),
            "after" | "start" => Ok(Condition::After(instant()?)),
            "before" | "end" => Ok(Condition::Before(instant()?)),
            "last_minutes" => {
                let minutes: f64 = value
                    .trim()
                    .parse()
                    .map_err(|_| FilterError::InvalidMinutes(value.to_string()))?;
                Self::last_minutes(minutes, now)
            }
            _ => Ok(Condition::field(key, value)),
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Condition::Level(level) => entry.level() == Some(*level),
            Condition::Container(name) => entry.container_name() == Some(name.as_str()),
            Condition::Pod(name) => entry.pod_name() == Some(name.as_str()),
            Condition::Namespace(name) => entry.namespace() == Some(name.as_str()),
            Condition::After(instant) => entry.timestamp().is_some_and(|ts| ts >= *instant),
            Condition::Before(instant) => entry.timestamp().is_some_and(|ts| ts <= *instant),
            Condition::Field { key, value } => entry.field(key) == Some(value.as_str()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Level(level) => write!(f, "level={}", level),
            Condition::Container(name) => write!(f, "container={}", name),
            Condition::Pod(name) => write!(f, "pod={}", name),
            Condition::Namespace(name) => write!(f, "namespace={}", name),
            Condition::After(instant) => write!(f, "after={}", instant.to_rfc3339()),
            Condition::Before(instant) => write!(f, "before={}", instant.to_rfc3339()),
            Condition::Field { key, value } => write!(f, "{}={}", key, value),
        }
    }
}

/// Parses `KEY=VALUE`, splitting at the first `=`
impl FromStr for Condition {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Condition::parse(key, value),
            _ => Err(FilterError::MalformedPair(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// Every condition must hold
    All,
    /// At least one condition must hold
    Any,
}

/// The conditions passed to one `filter_all` or `filter_any` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGroup {
    mode: GroupMode,
    conditions: Vec<Condition>,
}

impl FilterGroup {
    pub fn new(mode: GroupMode, conditions: Vec<Condition>) -> Self {
        FilterGroup { mode, conditions }
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::new(GroupMode::All, conditions.into_iter().collect())
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::new(GroupMode::Any, conditions.into_iter().collect())
    }

    pub fn mode(&self) -> GroupMode {
        self.mode
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Short-circuits in both modes. An empty Any group matches nothing.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self.mode {
            GroupMode::All => self.conditions.iter().all(|c| c.matches(entry)),
            GroupMode::Any => self.conditions.iter().any(|c| c.matches(entry)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_line;
    use chrono::TimeZone;

    fn sample() -> Entry {
        decode_line(
            r#"{"time":"2025-10-07T16:20:15Z","log":"ERROR:app.backend:Failed tenant=company_a company.a=x","kubernetes":{"pod_name":"backend-1","namespace_name":"pax-dev","container_name":"backend"}}"#,
        )
        .unwrap()
    }

    fn untimed() -> Entry {
        decode_line(r#"{"log":"INFO:app:no time"}"#).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 7, h, m, s).unwrap()
    }

    #[test]
    fn test_parse_known_keys() {
        let now = at(17, 0, 0);
        assert_eq!(
            Condition::parse_at("level", "ERROR", now).unwrap(),
            Condition::Level(Level::Error)
        );
        assert_eq!(
            Condition::parse_at("pod_name", "p", now).unwrap(),
            Condition::pod("p")
        );
        assert_eq!(
            Condition::parse_at("start", "2025-10-07T16:00:00Z", now).unwrap(),
            Condition::After(at(16, 0, 0))
        );
        assert_eq!(
            Condition::parse_at("end", "2025-10-07T16:00:00Z", now).unwrap(),
            Condition::Before(at(16, 0, 0))
        );
        assert_eq!(
            Condition::parse_at("tenant", "company_a", now).unwrap(),
            Condition::field("tenant", "company_a")
        );
    }

    #[test]
    fn test_parse_date_only_and_zoneless_bounds() {
        let now = at(17, 0, 0);
        assert_eq!(
            Condition::parse_at("after", "2025-10-07", now).unwrap(),
            Condition::After(at(0, 0, 0))
        );
        assert_eq!(
            Condition::parse_at("before", "2025-10-07 16:20:15", now).unwrap(),
            Condition::Before(at(16, 20, 15))
        );
        // Date-only bounds do not drift between calls
        assert_eq!(
            Condition::parse("after", "2025-10-07").unwrap(),
            Condition::parse("after", "2025-10-07").unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let now = at(17, 0, 0);
        assert!(matches!(
            Condition::parse_at("level", "FATAL", now),
            Err(FilterError::UnknownLevel(_))
        ));
        assert!(matches!(
            Condition::parse_at("after", "yesterday-ish", now),
            Err(FilterError::InvalidTime { .. })
        ));
        assert!(matches!(
            Condition::parse_at("last_minutes", "ten", now),
            Err(FilterError::InvalidMinutes(_))
        ));
        assert!(matches!(
            Condition::parse_at("last_minutes", "-5", now),
            Err(FilterError::InvalidMinutes(_))
        ));
    }

    #[test]
    fn test_last_minutes_is_fixed_at_build_time() {
        let now = at(16, 30, 0);
        let condition = Condition::parse_at("last_minutes", "15", now).unwrap();
        assert_eq!(condition, Condition::After(at(16, 15, 0)));

        let fractional = Condition::parse_at("last_minutes", "0.5", now).unwrap();
        assert_eq!(fractional, Condition::After(at(16, 29, 30)));
    }

    #[test]
    fn test_last_minutes_huge_value_saturates() {
        let condition = Condition::last_minutes(1e300, at(16, 30, 0)).unwrap();
        assert!(condition.matches(&sample()));
    }

    #[test]
    fn test_condition_matching() {
        let entry = sample();
        assert!(Condition::level(Level::Error).matches(&entry));
        assert!(!Condition::level(Level::Info).matches(&entry));
        assert!(Condition::container("backend").matches(&entry));
        assert!(Condition::pod("backend-1").matches(&entry));
        assert!(Condition::namespace("pax-dev").matches(&entry));
        assert!(Condition::field("company.a", "x").matches(&entry));
        assert!(!Condition::field("tenant", "company_b").matches(&entry));
        assert!(!Condition::field("missing", "x").matches(&entry));
    }

    #[test]
    fn test_time_bounds_are_inclusive() {
        let entry = sample();
        assert!(Condition::after(at(16, 20, 15)).matches(&entry));
        assert!(Condition::before(at(16, 20, 15)).matches(&entry));
        assert!(!Condition::after(at(16, 20, 16)).matches(&entry));
        assert!(!Condition::before(at(16, 20, 14)).matches(&entry));
    }

    #[test]
    fn test_absent_timestamp_never_matches_time_bounds() {
        let entry = untimed();
        assert!(!Condition::after(DateTime::<Utc>::MIN_UTC).matches(&entry));
        assert!(!Condition::before(DateTime::<Utc>::MAX_UTC).matches(&entry));
    }

    #[test]
    fn test_absent_level_never_matches() {
        let entry = decode_line(r#"{"log":"no prefix here"}"#).unwrap();
        for level in Level::ALL {
            assert!(!Condition::level(level).matches(&entry));
        }
    }

    #[test]
    fn test_from_str_pairs() {
        let condition: Condition = "url=http://x/?q=1".parse().unwrap();
        assert_eq!(condition, Condition::field("url", "http://x/?q=1"));
        assert!(matches!(
            "novalue".parse::<Condition>(),
            Err(FilterError::MalformedPair(_))
        ));
        assert!(matches!(
            "=x".parse::<Condition>(),
            Err(FilterError::MalformedPair(_))
        ));
    }

    #[test]
    fn test_group_modes() {
        let entry = sample();
        let both = FilterGroup::all([Condition::level(Level::Error), Condition::container("ocr")]);
        assert!(!both.matches(&entry));

        let either = FilterGroup::any([Condition::level(Level::Info), Condition::container("backend")]);
        assert!(either.matches(&entry));

        assert!(FilterGroup::new(GroupMode::All, Vec::new()).matches(&entry));
        assert!(!FilterGroup::new(GroupMode::Any, Vec::new()).matches(&entry));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let now = at(17, 0, 0);
        let condition = Condition::after(at(16, 0, 0));
        let text = condition.to_string();
        let (key, value) = text.split_once('=').unwrap();
        assert_eq!(Condition::parse_at(key, value, now).unwrap(), condition);
    }
}
