// src/version.rs

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::tree::MappingTree;

/// A released version: an opaque identifier plus its release time.
///
/// Versions order by release time first, so iterating a [`VersionedTrees`]
/// walks them oldest to newest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    id: Arc<str>,
    released: DateTime<Utc>,
}

impl Version {
    pub fn new(id: impl Into<Arc<str>>, released: DateTime<Utc>) -> Self {
        Self { id: id.into(), released }
    }

    /// Builds a version from a unix timestamp in seconds; `None` when the
    /// timestamp is out of range.
    pub fn try_from_timestamp(id: impl Into<Arc<str>>, seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(|released| Self::new(id, released))
    }

    /// Like [`Version::try_from_timestamp`], but out-of-range values clamp to
    /// the epoch with a warning, which moves the version to the front.
    pub fn from_timestamp(id: impl Into<Arc<str>>, seconds: i64) -> Self {
        let id = id.into();
        Self::try_from_timestamp(id.clone(), seconds).unwrap_or_else(|| {
            warn!(version = %id, seconds, "release timestamp out of range, using the epoch");
            Self::new(id, DateTime::<Utc>::default())
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn released(&self) -> DateTime<Utc> {
        self.released
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.released
            .cmp(&other.released)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One finalized tree per version, ordered by release time.
pub type VersionedTrees = BTreeMap<Version, MappingTree>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_release_time_before_id() {
        let old = Version::from_timestamp("b", 1);
        let new = Version::from_timestamp("a", 2);
        assert!(old < new);

        let mut versions = vec![new.clone(), old.clone()];
        versions.sort();
        assert_eq!(versions, vec![old, new]);
    }

    #[test]
    fn out_of_range_timestamps_are_detected() {
        assert!(Version::try_from_timestamp("far", i64::MAX).is_none());
        assert_eq!(Version::try_from_timestamp("1.0", 60).map(|v| v.released().timestamp()), Some(60));

        let clamped = Version::from_timestamp("far", i64::MAX);
        assert_eq!(clamped.released(), DateTime::<Utc>::default());
        assert!(clamped < Version::from_timestamp("early", 1));
    }

    #[test]
    fn same_release_time_falls_back_to_id() {
        let a = Version::from_timestamp("1.0", 5);
        let b = Version::from_timestamp("1.0-pre", 5);
        assert!(a < b);
    }
}
