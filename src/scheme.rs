//! Decide whether an on-disk name was produced by the legacy escaper.

use std::fmt;

use crate::escape::{escape_legacy, unescape, DecodeError, DEFAULT_MARKER};

#[derive(Debug)]
pub enum Scheme {
    /// The name round-trips through the legacy escaper; `username` is the
    /// decoded original.
    Legacy { username: String },
    Current(CurrentReason),
}

#[derive(Debug)]
pub enum CurrentReason {
    Undecodable(DecodeError),
    /// Decoded fine but re-escaping gives something else.
    NoRoundTrip { reencoded: String },
}

impl Scheme {
    pub fn is_legacy(&self) -> bool { matches!(self, Scheme::Legacy { .. }) }
}

impl fmt::Display for CurrentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentReason::Undecodable(e) => write!(f, "could not decode as a legacy name: {}", e),
            CurrentReason::NoRoundTrip { reencoded } => write!(f, "legacy encoding would be '{}'", reencoded),
        }
    }
}

/// Classify `name` by round trip: decode, re-escape with the legacy rules and
/// compare. Anything that does not reproduce exactly is treated as current,
/// so a name is never escaped twice.
pub fn classify(name: &str) -> Scheme {
    let username = match unescape(name, DEFAULT_MARKER) {
        Ok(u) => u,
        Err(e) => {
            log::debug!("'{}' is not a legacy name: {}", name, e);
            return Scheme::Current(CurrentReason::Undecodable(e));
        }
    };
    let reencoded = escape_legacy(&username);
    if reencoded == name {
        Scheme::Legacy { username }
    } else {
        Scheme::Current(CurrentReason::NoRoundTrip { reencoded })
    }
}

pub fn is_legacy_scheme(name: &str) -> bool {
    classify(name).is_legacy()
}
