//! Version stamps for snapshot identity.
//!
//! A [`VersionStamp`] is an opaque token identifying one snapshot of some
//! underlying content: raw text, a syntax tree, or project-wide semantic
//! state. Stamps are issued from a process-wide monotonic counter, so two
//! stamps compare equal iff they were issued for the same snapshot.
//!
//! The default stamp is a sentinel meaning "unversioned / always stale";
//! it never [`matches`](VersionStamp::matches) anything, including itself,
//! so cache checks against it always miss.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

/// Opaque, totally-ordered content snapshot token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct VersionStamp(u64);

impl VersionStamp {
    /// Sentinel stamp meaning "unversioned / always stale".
    pub const UNVERSIONED: VersionStamp = VersionStamp(0);

    /// Issue a fresh stamp, greater than every previously issued one.
    pub fn fresh() -> Self {
        VersionStamp(NEXT_STAMP.fetch_add(1, Ordering::Relaxed))
    }

    /// Check if this is the unversioned sentinel.
    pub const fn is_unversioned(&self) -> bool {
        self.0 == 0
    }

    /// Check if two stamps identify the same content snapshot.
    ///
    /// Unlike `==`, the unversioned sentinel never matches anything,
    /// including itself.
    pub fn matches(&self, other: VersionStamp) -> bool {
        *self == other && !self.is_unversioned()
    }

    /// Internal ordering key, used only for persistence.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Rebuild a stamp from its persisted ordering key.
    pub const fn from_raw(raw: u64) -> Self {
        VersionStamp(raw)
    }
}

impl fmt::Debug for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unversioned() {
            write!(f, "v?")
        } else {
            write!(f, "v{}", self.0)
        }
    }
}

/// The version triple that keys every cache lookup.
///
/// - `text` tracks raw character content.
/// - `data` tracks syntax-tree identity (syntax state) or dependent
///   semantic identity (document / project state).
/// - `project` tracks the transitive dependency version of the owning
///   project; only project-level caching consults it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct VersionArgument {
    pub text: VersionStamp,
    pub data: VersionStamp,
    pub project: VersionStamp,
}

impl VersionArgument {
    /// Version argument for document-scoped analysis, where the project
    /// dependency version does not participate.
    pub fn document(text: VersionStamp, data: VersionStamp) -> Self {
        VersionArgument {
            text,
            data,
            project: VersionStamp::UNVERSIONED,
        }
    }

    /// Version argument for project-scoped analysis.
    pub fn project(project: VersionStamp, data: VersionStamp) -> Self {
        VersionArgument {
            text: VersionStamp::UNVERSIONED,
            data,
            project,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_stamps_are_monotonic() {
        let a = VersionStamp::fresh();
        let b = VersionStamp::fresh();
        assert!(a < b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_unversioned_never_matches() {
        let sentinel = VersionStamp::UNVERSIONED;
        assert!(sentinel.is_unversioned());
        assert!(!sentinel.matches(sentinel));
        assert!(!sentinel.matches(VersionStamp::fresh()));
    }

    #[test]
    fn test_matches_requires_equality() {
        let a = VersionStamp::fresh();
        let b = VersionStamp::fresh();
        assert!(a.matches(a));
        assert!(!a.matches(b));
    }

    #[test]
    fn test_default_is_sentinel() {
        assert_eq!(VersionStamp::default(), VersionStamp::UNVERSIONED);
    }

    #[test]
    fn test_raw_roundtrip() {
        let a = VersionStamp::fresh();
        assert_eq!(VersionStamp::from_raw(a.raw()), a);
    }
}
