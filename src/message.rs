use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::{Level, ParsedMessage};

/// `LEVEL:component:rest`. The level alternation is the closed set of known levels.
static PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(DEBUG|INFO|WARNING|ERROR):([\w.]+):(.*)$").expect("valid prefix regex")
});

/// One whitespace-delimited `key=value` token. Keys allow dots and hyphens.
static PAIR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w.-]+)=(\S+)$").expect("valid key=value regex"));

/// Split a raw message into level, component, text and key=value fields.
///
/// The prefix match and the key=value scan are independent: a message without
/// a level prefix still has its pairs extracted from the whole text.
pub fn parse_message(raw: &str) -> ParsedMessage {
    let (level, component, text) = match split_prefix(raw) {
        Some((level, component, rest)) => (Some(level), Some(component.to_string()), rest),
        None => (None, None, raw),
    };

    ParsedMessage {
        level,
        component,
        message: text.trim().to_string(),
        fields: extract_pairs(text),
    }
}

/// Match the `LEVEL:component:` prefix, returning the remainder after the second colon
pub fn split_prefix(raw: &str) -> Option<(Level, &str, &str)> {
    let captures = PREFIX_REGEX.captures(raw)?;
    let level = captures.get(1)?.as_str().parse().ok()?;
    let component = captures.get(2)?.as_str();
    let rest = captures.get(3)?.as_str();
    Some((level, component, rest))
}

/// Collect `key=value` tokens; later duplicates overwrite earlier ones
pub fn extract_pairs(text: &str) -> IndexMap<String, String> {
    let mut fields = IndexMap::new();
    for token in text.split_whitespace() {
        if let Some(captures) = PAIR_REGEX.captures(token) {
            fields.insert(captures[1].to_string(), captures[2].to_string());
        }
    }
    fields
}
