use crate::serialization::Value;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static TEMPLATE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("static placeholder regex"));

/// Relative edit distance under which a candidate counts as a likely typo.
const DID_YOU_MEAN_THRESHOLD: f64 = 0.4;

/// Substitutes `{name}` placeholders in `template` with values from `parameters`.
/// Array values are joined with `delimiter`; unknown names render empty.
pub fn format_str(template: &str, delimiter: &str, parameters: &BTreeMap<String, Value>) -> String {
    TEMPLATE_PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            parameters
                .get(&caps[1])
                .map(|v| v.to_template_string(delimiter))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Picks the option closest to `word` by case-insensitive Levenshtein distance, if any is
/// close enough to be a plausible typo. Never returns `word` itself.
pub fn did_you_mean<'a, I>(word: &str, options: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = word.to_lowercase();
    let mut best: Option<(usize, &str)> = None;
    for option in options {
        if option == word || option.is_empty() {
            continue;
        }
        let distance = strsim::levenshtein(&needle, &option.to_lowercase());
        let longest = needle.chars().count().max(option.chars().count());
        if distance as f64 > DID_YOU_MEAN_THRESHOLD * longest as f64 {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, option));
        }
    }
    best.map(|(_, option)| option.to_string())
}

/// "a, b, c and 4 more" style listing used in error messages.
pub fn list_to_english_text(items: &[&str], limit: usize) -> String {
    if items.len() <= limit {
        return items.join(", ");
    }
    format!(
        "{} and {} more",
        items[..limit].join(", "),
        items.len() - limit
    )
}

/// FNV-1a over the bytes of `s`. Stable across builds and platforms, unlike `DefaultHasher`.
pub fn stable_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_str() {
        let mut params = BTreeMap::new();
        params.insert("nameCell".to_string(), Value::String("x".into()));
        params.insert(
            "intCell".to_string(),
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
        );
        assert_eq!(
            format_str("let {nameCell} = [{intCell}]{missing}", ",", &params),
            "let x = [1,2]"
        );
    }

    #[test]
    fn test_did_you_mean() {
        assert_eq!(did_you_mean("ad", ["add", "subtract"]), Some("add".into()));
        assert_eq!(did_you_mean("appel", ["apple", "banana"]), Some("apple".into()));
        assert_eq!(did_you_mean("zzzzzz", ["add", "print"]), None);
        assert_eq!(did_you_mean("add", ["add"]), None);
    }

    #[test]
    fn test_list_to_english_text() {
        assert_eq!(list_to_english_text(&["a", "b"], 7), "a, b");
        assert_eq!(list_to_english_text(&["a", "b", "c"], 2), "a, b and 1 more");
    }

    #[test]
    fn test_stable_hash_is_stable() {
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_ne!(stable_hash("addParser"), stable_hash("subParser"));
    }
}
