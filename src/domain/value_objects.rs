//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable, opaque key for a feed author (the profile handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(String);

impl AuthorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extract the author from a profile link `href`.
    ///
    /// Only site-relative links identify an author. The first path segment
    /// is the handle, so `/alice` and `/alice/status/42` both yield `alice`.
    ///
    /// # Examples
    /// ```
    /// use feed_geoblock::AuthorId;
    ///
    /// assert_eq!(AuthorId::from_href("/alice").unwrap().as_str(), "alice");
    /// assert!(AuthorId::from_href("https://example.com/alice").is_none());
    /// ```
    pub fn from_href(href: &str) -> Option<Self> {
        let path = href.trim().strip_prefix('/')?;
        let handle = path
            .split(|c: char| c == '/' || c == '?' || c == '#')
            .next()
            .unwrap_or_default();

        if handle.is_empty() {
            None
        } else {
            Some(Self(handle.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AuthorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a node in the feed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Token attached to each dispatched lookup and echoed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(Uuid);

impl RequestToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Countries whose authors should be hidden.
///
/// Entries are either full country names or ISO 3166-1 alpha-2 codes.
/// The two kinds are kept apart: a code only ever matches a code and a
/// name only ever matches a name, both case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    /// Entries as supplied, trimmed, in first-seen order
    entries: Vec<String>,
    /// Lowercased two-letter codes
    codes: HashSet<String>,
    /// Lowercased full names
    names: HashSet<String>,
}

impl BlockList {
    /// Build a block list, dropping blank entries and case-insensitive duplicates.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();

        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }

            let key = entry.to_lowercase();
            let bucket = if is_country_code(entry) {
                &mut list.codes
            } else {
                &mut list.names
            };

            if bucket.insert(key) {
                list.entries.push(entry.to_string());
            }
        }

        list
    }

    /// Whether `location` matches an entry of the same kind.
    pub fn contains(&self, location: &str) -> bool {
        let location = location.trim();
        if location.is_empty() {
            return false;
        }

        let key = location.to_lowercase();
        if is_country_code(location) {
            self.codes.contains(&key)
        } else {
            self.names.contains(&key)
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// ISO 3166-1 alpha-2 shape: exactly two ASCII letters.
fn is_country_code(value: &str) -> bool {
    value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic())
}
