//! Saved member spans for partial reanalysis.
//!
//! When only one member body changes, document-level semantic analysis
//! can re-run over that member alone and splice the result into the
//! previous set. That needs the member layout the previous set was
//! computed against, per analyzer: each analyzer may lag at a different
//! text version. Span lists are refcounted by text version so analyzers
//! tracking the same version share one allocation.

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHashMap;

use glint_core::{DocumentId, Span, VersionStamp};

use crate::workspace::Document;

/// The member layout one analyzer last analyzed a document at.
#[derive(Clone, Debug)]
pub struct SavedMemberRange {
    pub version: VersionStamp,
    pub spans: Arc<[Span]>,
}

#[derive(Default)]
struct DocumentRanges {
    analyzer_versions: FxHashMap<Arc<str>, VersionStamp>,
    refcounts: FxHashMap<VersionStamp, usize>,
    ranges: FxHashMap<VersionStamp, Arc<[Span]>>,
}

impl DocumentRanges {
    fn set(&mut self, analyzer: Arc<str>, version: VersionStamp, spans: Arc<[Span]>) {
        if let Some(old) = self.analyzer_versions.insert(analyzer, version) {
            if old.matches(version) {
                return;
            }
            self.release(old);
        }
        *self.refcounts.entry(version).or_insert(0) += 1;
        self.ranges.entry(version).or_insert(spans);
    }

    fn release(&mut self, version: VersionStamp) {
        if let Some(count) = self.refcounts.get_mut(&version) {
            *count -= 1;
            if *count == 0 {
                self.refcounts.remove(&version);
                self.ranges.remove(&version);
            }
        }
    }
}

/// Per-document, per-analyzer saved member layouts.
#[derive(Default)]
pub struct MemberRangeMap {
    documents: DashMap<DocumentId, DocumentRanges>,
}

impl MemberRangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `analyzer` has analyzed the document's full text:
    /// its saved layout becomes the document's current one.
    pub fn touch(&self, analyzer: &Arc<str>, document: &Document) {
        self.documents.entry(document.id()).or_default().set(
            analyzer.clone(),
            document.text_version(),
            document.member_spans().clone(),
        );
    }

    /// The layout `analyzer` last saw for a document.
    pub fn saved_member_range(
        &self,
        id: DocumentId,
        analyzer: &Arc<str>,
    ) -> Option<SavedMemberRange> {
        let ranges = self.documents.get(&id)?;
        let version = *ranges.analyzer_versions.get(analyzer)?;
        let spans = ranges.ranges.get(&version)?.clone();
        Some(SavedMemberRange { version, spans })
    }

    /// Advance `analyzer`'s saved layout after reanalyzing only member
    /// `member_id`: spans before it are kept, the member takes its new
    /// length, spans after it shift by the length delta.
    ///
    /// The patched layout is stored under the document's current text
    /// version. Returns the patched layout, or `None` when `member_id`
    /// does not exist in both the saved and current layouts.
    pub fn update_member_range(
        &self,
        analyzer: &Arc<str>,
        document: &Document,
        member_id: usize,
        saved: &SavedMemberRange,
    ) -> Option<Arc<[Span]>> {
        let old_member = *saved.spans.get(member_id)?;
        let new_member_len = document.member_spans().get(member_id)?.len();
        let delta = i64::from(new_member_len) - i64::from(old_member.len());
        let bound = document.length();

        let patched: Arc<[Span]> = saved
            .spans
            .iter()
            .enumerate()
            .map(|(index, span)| {
                if index < member_id {
                    *span
                } else if index == member_id {
                    Span::new(span.start, span.start.saturating_add(new_member_len))
                } else {
                    span.shift(delta, bound)
                }
            })
            .collect();

        self.documents.entry(document.id()).or_default().set(
            analyzer.clone(),
            document.text_version(),
            patched.clone(),
        );
        Some(patched)
    }

    /// Forget a document entirely.
    pub fn remove(&self, id: DocumentId) {
        self.documents.remove(&id);
    }

    /// Forget one analyzer's layouts across every document.
    pub fn remove_analyzer(&self, analyzer: &Arc<str>) {
        for mut entry in self.documents.iter_mut() {
            if let Some(version) = entry.analyzer_versions.remove(analyzer) {
                entry.release(version);
            }
        }
        self.documents.retain(|_, ranges| !ranges.analyzer_versions.is_empty());
    }
}
