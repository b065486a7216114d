use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::validity::{Validity, MAX_NAME_LENGTH};

pub const HASH_LENGTH: usize = 8;
pub const DEFAULT_MAX_LENGTH: usize = 32;
// "---" between the stripped name and the hash
const SEPARATOR: &str = "---";
pub const MIN_MAX_LENGTH: usize = HASH_LENGTH + SEPARATOR.len() + 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("cannot make safe names shorter than {min} characters (max length {0})", min = MIN_MAX_LENGTH)]
    MaxLengthTooSmall(usize),
    #[error("max length {0} exceeds the {limit} character name limit", limit = MAX_NAME_LENGTH)]
    MaxLengthTooLarge(usize),
}

/// How names are turned into slugs: which rules count as already safe and how
/// long a slug may be.
#[derive(Debug, Clone, Copy)]
pub struct SlugRules {
    validity: Validity,
    max_length: usize,
}

impl SlugRules {
    pub fn new(validity: Validity, max_length: usize) -> Result<Self, SlugError> {
        if max_length < MIN_MAX_LENGTH { return Err(SlugError::MaxLengthTooSmall(max_length)); }
        if max_length > MAX_NAME_LENGTH { return Err(SlugError::MaxLengthTooLarge(max_length)); }
        Ok(SlugRules { validity, max_length })
    }

    pub fn max_length(&self) -> usize { self.max_length }

    pub fn derive(&self, name: &str) -> String {
        if passes_through(name, |s| self.validity.check(s), self.max_length) {
            return name.to_string();
        }
        hashed(name, self.max_length - (HASH_LENGTH + SEPARATOR.len()))
    }
}

impl Default for SlugRules {
    fn default() -> Self {
        SlugRules { validity: Validity::Object, max_length: DEFAULT_MAX_LENGTH }
    }
}

/// Use `name` as is when it already passes `is_valid` and fits, otherwise fall
/// back to `strip_and_hash`.
///
/// Names containing `--` always take the fallback so they can never be
/// mistaken for a `{name}---{hash}` slug.
pub fn safe_slug(name: &str, is_valid: impl Fn(&str) -> bool, max_length: usize) -> Result<String, SlugError> {
    if passes_through(name, is_valid, max_length) {
        return Ok(name.to_string());
    }
    strip_and_hash(name, max_length)
}

fn passes_through(name: &str, is_valid: impl Fn(&str) -> bool, max_length: usize) -> bool {
    !name.contains("--") && is_valid(name) && name.chars().count() <= max_length
}

/// Always-valid, collision-resistant slug: `{stripped name}---{8 hex of sha256}`.
pub fn strip_and_hash(name: &str, max_length: usize) -> Result<String, SlugError> {
    if max_length < MIN_MAX_LENGTH { return Err(SlugError::MaxLengthTooSmall(max_length)); }
    Ok(hashed(name, max_length - (HASH_LENGTH + SEPARATOR.len())))
}

fn hashed(name: &str, name_budget: usize) -> String {
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let core = extract_safe_name(name, name_budget);
    format!("{}{}{}", core, SEPARATOR, &digest[..HASH_LENGTH])
}

// Lowercase, collapse every run of non [a-z0-9] into one '-', trim hyphens,
// truncate, and make sure it starts with a letter. Never empty.
fn extract_safe_name(name: &str, max_length: usize) -> String {
    let mut collapsed = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash { collapsed.push('-'); }
            collapsed.push(c);
            pending_dash = false;
        } else if !collapsed.is_empty() {
            pending_dash = true;
        }
    }
    let mut safe: String = collapsed.chars().take(max_length).collect();
    trim_trailing_dashes(&mut safe);
    if !safe.is_empty() && !safe.starts_with(|c: char| c.is_ascii_lowercase()) {
        let kept: String = safe.chars().take(max_length.saturating_sub(2)).collect();
        safe = format!("x-{}", kept);
        trim_trailing_dashes(&mut safe);
    }
    if safe.is_empty() {
        safe.push('x');
    }
    safe
}

fn trim_trailing_dashes(s: &mut String) {
    while s.ends_with('-') { s.pop(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validity::is_valid_object_name;

    fn slug(name: &str) -> String {
        SlugRules::default().derive(name)
    }

    fn assert_fallback_shape(s: &str) {
        assert_eq!(s.matches("---").count(), 1, "{s}");
        let (_, hash) = s.split_once("---").unwrap();
        assert_eq!(hash.len(), HASH_LENGTH, "{s}");
        assert!(hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)), "{s}");
        assert!(!s.contains("----"), "{s}");
    }

    #[test]
    fn valid_names_pass_through() {
        assert_eq!(slug("j-o-h-n"), "j-o-h-n");
        assert_eq!(slug("jdoe"), "jdoe");
        assert_eq!(slug(&"a".repeat(32)), "a".repeat(32));
    }

    #[test]
    fn double_hyphen_always_hashes() {
        let s = slug("john--doe");
        assert_ne!(s, "john--doe");
        assert!(s.starts_with("john-doe---"), "{s}");
        assert_fallback_shape(&s);
    }

    #[test]
    fn invalid_names_hash() {
        let s = slug("John Doe");
        assert!(s.starts_with("john-doe---"), "{s}");
        assert_fallback_shape(&s);
        assert_ne!(slug("John Doe"), slug("john doe"));
    }

    #[test]
    fn too_long_names_hash_and_fit() {
        let name = "a".repeat(40);
        let s = slug(&name);
        assert_eq!(s.len(), DEFAULT_MAX_LENGTH);
        assert!(s.starts_with(&"a".repeat(21)));
        assert_fallback_shape(&s);
    }

    #[test]
    fn fallback_known_hash() {
        // sha256("") = e3b0c442...
        assert_eq!(strip_and_hash("", 32).unwrap(), "x---e3b0c442");
    }

    #[test]
    fn leading_digits_get_prefixed() {
        let s = slug("123");
        assert!(s.starts_with("x-123---"), "{s}");
        let s = strip_and_hash("1-2-3-4-5-6", 13).unwrap();
        assert!(s.starts_with("x---"), "{s}");
        assert_fallback_shape(&s);
    }

    #[test]
    fn empty_core_uses_placeholder() {
        for name in ["", "!!!", "日本語", "--", "-_-"] {
            let s = slug(name);
            assert!(s.starts_with("x---"), "{name:?} -> {s}");
            assert_fallback_shape(&s);
        }
    }

    #[test]
    fn prefix_never_leaves_trailing_dash() {
        // budget 5: "99-ab" is prefixed to "x-99-", the trailing dash has to go
        let s = strip_and_hash("99-abc", 16).unwrap();
        assert!(s.starts_with("x-99---"), "{s}");
        assert_fallback_shape(&s);
    }

    #[test]
    fn every_slug_is_a_valid_object_name() {
        let names = [
            "", "a", "A", "-", "--", "---x", "John Doe", "émile", "x--", "a.b.c", "_leading",
            "trailing_", "0", "9lives", "ÆØÅ", "user@example.com", "🦀🦀🦀", "a b c d e f g h i j k l m n o p",
            "-4aohn-20-44oe",
        ];
        for rules in [SlugRules::default(), SlugRules::new(Validity::Object, 12).unwrap(), SlugRules::new(Validity::Object, 63).unwrap()] {
            for name in names {
                let s = rules.derive(name);
                assert!(is_valid_object_name(&s), "{name:?} -> {s:?}");
                assert!(s.len() <= rules.max_length(), "{name:?} -> {s:?}");
                assert_eq!(s, rules.derive(name));
            }
        }
    }

    #[test]
    fn label_rules_allow_label_values() {
        let rules = SlugRules::new(Validity::Label, 32).unwrap();
        assert_eq!(rules.derive("John.Doe"), "John.Doe");
        assert_fallback_shape(&rules.derive("John Doe"));
    }

    #[test]
    fn max_length_bounds() {
        assert_eq!(strip_and_hash("abc", 11), Err(SlugError::MaxLengthTooSmall(11)));
        assert!(strip_and_hash("abc", 12).is_ok());
        assert_eq!(SlugRules::new(Validity::Object, 5).unwrap_err(), SlugError::MaxLengthTooSmall(5));
        assert_eq!(SlugRules::new(Validity::Object, 64).unwrap_err(), SlugError::MaxLengthTooLarge(64));
    }
}
