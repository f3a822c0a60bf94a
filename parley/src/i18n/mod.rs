//! Localization.
//!
//! Translations are JSON trees per locale, addressed by dotted paths
//! (`"quiz.correct"`, `"chips.0"` or `"chips[0]"`). A leaf holding a list of
//! strings is a set of alternatives; one is picked at random. The chosen
//! template is rendered by a [`TemplateRenderer`].

mod format;

pub use format::{MessageFormatRenderer, TemplateRenderer};

use serde_json::Value;

/// Resolve a dotted path inside a translation tree.
#[must_use]
pub fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .flat_map(|segment| segment.split(['[', ']']))
        .filter(|segment| !segment.is_empty())
        .try_fold(tree, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Pick the template text stored at a translation leaf.
///
/// Empty strings, empty lists and non-string leaves yield `None`.
#[must_use]
pub fn leaf_template<'a>(leaf: &'a Value, rng: &mut fastrand::Rng) -> Option<&'a str> {
    match leaf {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Array(items) if !items.is_empty() => {
            items[rng.usize(..items.len())].as_str().filter(|s| !s.is_empty())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_paths() {
        let tree = json!({
            "quiz": { "correct": "Right!", "options": ["A", "B"] },
            "yes": "Yes"
        });
        assert_eq!(lookup(&tree, "yes"), Some(&json!("Yes")));
        assert_eq!(lookup(&tree, "quiz.correct"), Some(&json!("Right!")));
        assert_eq!(lookup(&tree, "quiz.options.1"), Some(&json!("B")));
        assert_eq!(lookup(&tree, "quiz.options[0]"), Some(&json!("A")));
        assert_eq!(lookup(&tree, "quiz.missing"), None);
        assert_eq!(lookup(&tree, "yes.deeper"), None);
    }

    #[test]
    fn test_leaf_template() {
        let mut rng = fastrand::Rng::with_seed(11);
        assert_eq!(leaf_template(&json!("Hi"), &mut rng), Some("Hi"));
        assert_eq!(leaf_template(&json!(""), &mut rng), None);
        assert_eq!(leaf_template(&json!({"a": 1}), &mut rng), None);
        let options = json!(["x", "y"]);
        let picked = leaf_template(&options, &mut rng).unwrap();
        assert!(picked == "x" || picked == "y");
    }
}
