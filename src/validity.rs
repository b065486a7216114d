//! Naming rules a slug can be checked against.

use serde::Deserialize;

pub const MAX_NAME_LENGTH: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    /// Object names: a DNS label valid under both RFC 1035 and RFC 1123.
    #[default]
    Object,
    /// Label values: looser, allows `.`, `_` and uppercase.
    Label,
}

impl Validity {
    pub fn check(self, s: &str) -> bool {
        match self {
            Validity::Object => is_valid_object_name(s),
            Validity::Label => is_valid_label(s),
        }
    }
}

/// 1 to 63 characters of `[a-z0-9-]`, starting with a letter and ending with a
/// letter or digit.
pub fn is_valid_object_name(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_NAME_LENGTH { return false; }
    if !s.starts_with(|c: char| c.is_ascii_lowercase()) { return false; }
    if !s.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) { return false; }
    s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// Empty label values are allowed.
pub fn is_valid_label(s: &str) -> bool {
    if s.is_empty() { return true; }
    if s.len() > MAX_NAME_LENGTH { return false; }
    if !s.starts_with(|c: char| c.is_ascii_alphanumeric()) { return false; }
    if !s.ends_with(|c: char| c.is_ascii_alphanumeric()) { return false; }
    s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
