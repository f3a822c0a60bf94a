//! Dialog templates and variant selection.
//!
//! A dialog table maps keys to speech templates. Keys that share a prefix and
//! differ only in a trailing number (`greeting_1`, `greeting_2`, ...) are
//! variants of one line; asking for `greeting_*` picks one of them, never the
//! same one twice in a row.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::VoiceTable;

/// Dialog templates of one locale.
pub type DialogTable = BTreeMap<String, DialogTemplate>;

/// One dialog entry: a single template or a list of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DialogTemplate {
    /// A single template.
    One(String),
    /// Alternatives; one is picked at random each time.
    Many(Vec<String>),
}

impl DialogTemplate {
    /// Pick the template to speak. Empty lists yield an empty string.
    #[must_use]
    pub fn pick(&self, rng: &mut fastrand::Rng) -> &str {
        match self {
            Self::One(template) => template,
            Self::Many(templates) => {
                if templates.is_empty() {
                    ""
                } else {
                    &templates[rng.usize(..templates.len())]
                }
            }
        }
    }
}

impl From<&str> for DialogTemplate {
    fn from(template: &str) -> Self {
        Self::One(template.to_string())
    }
}

/// Build the anchored matcher for a dialog key, where each `*` matches a digit run.
fn key_pattern(key: &str) -> Option<Regex> {
    let body = key
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\d+");
    match Regex::new(&format!("^{body}$")) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(key = %key, error = %err, "dialog key does not form a valid pattern");
            None
        }
    }
}

/// All dialog keys matching `key`, in table order.
#[must_use]
pub fn matching_variants<'a>(table: &'a DialogTable, key: &str) -> Vec<&'a str> {
    let Some(pattern) = key_pattern(key) else {
        return Vec::new();
    };
    table
        .keys()
        .filter(|candidate| pattern.is_match(candidate))
        .map(String::as_str)
        .collect()
}

/// Choose one variant, excluding `last_used` whenever another is available.
///
/// Returns `None` only for an empty slice.
#[must_use]
pub fn choose_variant<'a>(
    variants: &[&'a str],
    last_used: Option<&str>,
    rng: &mut fastrand::Rng,
) -> Option<&'a str> {
    match variants {
        [] => None,
        [only] => Some(*only),
        _ => {
            let candidates: Vec<&'a str> = variants
                .iter()
                .copied()
                .filter(|variant| Some(*variant) != last_used)
                .collect();
            let pool = if candidates.is_empty() {
                variants.to_vec()
            } else {
                candidates
            };
            Some(pool[rng.usize(..pool.len())])
        }
    }
}

/// Render a parameter value the way it should be spoken.
#[must_use]
pub fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace the first `{name}` placeholder of each parameter in `template`.
#[must_use]
pub fn substitute(template: &str, params: &Value) -> String {
    let mut speech = template.to_string();
    if let Value::Object(params) = params {
        for (name, value) in params {
            speech = speech.replacen(&format!("{{{name}}}"), &param_to_string(value), 1);
        }
    }
    speech
}

/// Voice recording ids recorded for a dialog variant.
///
/// A voice key belongs to a variant when it starts with the variant name
/// followed by an optional `_` and an uppercase letter (`greeting_1_A`,
/// `greeting_1B`).
#[must_use]
pub fn matching_voices<'a>(voices: &'a VoiceTable, variant: &str) -> Vec<&'a str> {
    let Ok(pattern) = Regex::new(&format!("^{}_?[A-Z]", regex::escape(variant))) else {
        return Vec::new();
    };
    voices
        .iter()
        .filter(|(key, _)| pattern.is_match(key))
        .map(|(_, voice)| voice.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> DialogTable {
        let mut table = DialogTable::new();
        table.insert("greeting_1".into(), "Hi {name}!".into());
        table.insert("greeting_2".into(), "Hello {name}!".into());
        table.insert("greeting_10".into(), "Hey {name}!".into());
        table.insert("greeting_x".into(), "nope".into());
        table.insert("farewell".into(), "Bye.".into());
        table
    }

    #[test]
    fn test_wildcard_matches_digit_runs() {
        let table = table();
        assert_eq!(
            matching_variants(&table, "greeting_*"),
            vec!["greeting_1", "greeting_10", "greeting_2"]
        );
        assert_eq!(matching_variants(&table, "farewell"), vec!["farewell"]);
        assert!(matching_variants(&table, "greeting").is_empty());
    }

    #[test]
    fn test_pattern_characters_are_literal() {
        let mut table = DialogTable::new();
        table.insert("a.b".into(), "x".into());
        table.insert("aXb".into(), "y".into());
        assert_eq!(matching_variants(&table, "a.b"), vec!["a.b"]);
    }

    #[test]
    fn test_choose_never_repeats() {
        let variants = ["a", "b", "c"];
        let mut rng = fastrand::Rng::with_seed(7);
        let mut last = None;
        for _ in 0..1000 {
            let chosen = choose_variant(&variants, last, &mut rng).unwrap();
            assert_ne!(Some(chosen), last);
            last = Some(chosen);
        }
    }

    #[test]
    fn test_choose_single_and_empty() {
        let mut rng = fastrand::Rng::with_seed(1);
        assert_eq!(choose_variant(&["a"], Some("a"), &mut rng), Some("a"));
        assert_eq!(choose_variant(&[], None, &mut rng), None);
    }

    #[test]
    fn test_substitute_first_occurrence_only() {
        let out = substitute("{name} and {name} like {food}", &json!({"name": "Ada", "food": 3}));
        assert_eq!(out, "Ada and {name} like 3");
        assert_eq!(substitute("plain", &Value::Null), "plain");
    }

    #[test]
    fn test_matching_voices() {
        let mut voices = VoiceTable::new();
        voices.insert("greeting_1_A".into(), "g1-anna".into());
        voices.insert("greeting_1B".into(), "g1-ben".into());
        voices.insert("greeting_10_A".into(), "g10-anna".into());
        voices.insert("greeting_1_lower".into(), "nope".into());

        let mut found = matching_voices(&voices, "greeting_1");
        found.sort_unstable();
        assert_eq!(found, vec!["g1-anna", "g1-ben"]);
    }

    #[test]
    fn test_template_pick() {
        let mut rng = fastrand::Rng::with_seed(3);
        let many = DialogTemplate::Many(vec!["a".into(), "b".into()]);
        assert!(["a", "b"].contains(&many.pick(&mut rng)));
        assert_eq!(DialogTemplate::Many(Vec::new()).pick(&mut rng), "");
    }
}
