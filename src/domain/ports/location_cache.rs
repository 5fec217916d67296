//! Location Cache Port
//!
//! Defines the interface for the time-bounded author location cache.

use crate::domain::entities::LocationRecord;
use crate::domain::value_objects::AuthorId;

/// Cache of resolved author locations.
///
/// Records expire lazily: a record older than the TTL stays stored but
/// is reported as absent, which makes the caller look the author up again.
pub trait LocationCache: Send + Sync {
    /// Get the record for an author if it is still fresh.
    fn get(&self, author: &AuthorId) -> Option<LocationRecord>;

    /// Store a lookup result, overwriting any previous record.
    ///
    /// `None` is a negative result and is cached like any other.
    fn put(&self, author: AuthorId, location: Option<String>);

    /// Number of stored records, stale ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
