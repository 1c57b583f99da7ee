//! One cached or freshly computed diagnostic set.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use glint_core::VersionStamp;
use glint_diagnostic::DiagnosticData;

/// A diagnostic set together with the versions it was computed at.
///
/// Tracks where the set came from: a set loaded from cache carries no
/// `old_items` and never triggers notifications; a freshly computed set
/// remembers what it replaced so [`AnalysisData::changed`] can decide
/// whether consumers need to hear about it.
#[derive(Clone, Debug)]
pub struct AnalysisData {
    text_version: VersionStamp,
    data_version: VersionStamp,
    items: Arc<[DiagnosticData]>,
    old_items: Option<Arc<[DiagnosticData]>>,
}

impl AnalysisData {
    /// A set served from cache without recomputation.
    pub fn from_cache(
        text_version: VersionStamp,
        data_version: VersionStamp,
        items: Arc<[DiagnosticData]>,
    ) -> Self {
        AnalysisData {
            text_version,
            data_version,
            items,
            old_items: None,
        }
    }

    /// A freshly computed set replacing `old_items` (empty when nothing
    /// was stored before).
    pub fn computed(
        text_version: VersionStamp,
        data_version: VersionStamp,
        items: Arc<[DiagnosticData]>,
        old_items: Arc<[DiagnosticData]>,
    ) -> Self {
        AnalysisData {
            text_version,
            data_version,
            items,
            old_items: Some(old_items),
        }
    }

    pub fn text_version(&self) -> VersionStamp {
        self.text_version
    }

    pub fn data_version(&self) -> VersionStamp {
        self.data_version
    }

    pub fn items(&self) -> &Arc<[DiagnosticData]> {
        &self.items
    }

    /// Whether this set was served from cache.
    pub fn is_from_cache(&self) -> bool {
        self.old_items.is_none()
    }

    /// The set this computation replaced, empty for cache hits.
    pub fn old_items(&self) -> &[DiagnosticData] {
        self.old_items.as_deref().unwrap_or(&[])
    }

    /// Whether the new set differs from the old one as a multiset.
    /// Always `false` for cache hits.
    pub fn changed(&self) -> bool {
        let Some(old) = &self.old_items else {
            return false;
        };
        if old.len() != self.items.len() {
            return true;
        }
        let mut counts: FxHashMap<&DiagnosticData, i64> = FxHashMap::default();
        for item in old.iter() {
            *counts.entry(item).or_insert(0) += 1;
        }
        for item in self.items.iter() {
            let count = counts.entry(item).or_insert(0);
            *count -= 1;
            if *count < 0 {
                return true;
            }
        }
        counts.values().any(|count| *count != 0)
    }
}
