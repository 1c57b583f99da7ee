//! Version-checked analysis execution.
//!
//! The executor sits between the incremental analyzer and the driver.
//! For each request it decides, from version stamps alone, whether the
//! cached set is still valid, whether a member-scoped partial run can be
//! spliced into the previous set, or whether a full run is needed.
//! Identical concurrent requests share one computation.
//!
//! ```text
//! request ──► in-flight map ──► version check ──► cache hit
//!                                   │
//!                                   ├─► member splice (Document only)
//!                                   └─► full analyzer run
//! ```

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use glint_core::{AnalysisKey, VersionArgument};
use glint_diagnostic::DiagnosticData;

use crate::error::EngineError;
use crate::member_ranges::MemberRangeMap;
use crate::state::{AnalysisData, StateSet, StateType};
use crate::workspace::{Document, Project};

mod driver;

pub use driver::AnalyzerDriver;
pub(crate) use driver::span_touches;

#[derive(Clone, Eq, PartialEq, Hash)]
struct ExecKey {
    state_name: Arc<str>,
    key: AnalysisKey,
}

type Shared = Arc<OnceLock<Result<AnalysisData, EngineError>>>;

/// Executes analyzer runs with caching, splicing, and request sharing.
#[derive(Default)]
pub struct AnalyzerExecutor {
    member_ranges: MemberRangeMap,
    in_flight: DashMap<ExecKey, Shared>,
}

impl AnalyzerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_ranges(&self) -> &MemberRangeMap {
        &self.member_ranges
    }

    /// Share one computation among concurrent identical requests. The
    /// entry lives only while the computation runs; latecomers after
    /// completion recompute against the then-updated cache.
    fn memoized(
        &self,
        state_name: &Arc<str>,
        key: AnalysisKey,
        compute: impl FnOnce() -> Result<AnalysisData, EngineError>,
    ) -> Result<AnalysisData, EngineError> {
        let exec_key = ExecKey {
            state_name: state_name.clone(),
            key,
        };
        let cell: Shared = self.in_flight.entry(exec_key.clone()).or_default().clone();
        let result = cell.get_or_init(compute).clone();
        self.in_flight.remove(&exec_key);
        result
    }

    /// Syntax diagnostics for a document, keyed by (text version,
    /// syntax version).
    pub fn syntax_data(
        &self,
        set: &StateSet,
        document: &Document,
        driver: &AnalyzerDriver<'_>,
    ) -> Result<AnalysisData, EngineError> {
        let state = set.state(StateType::Syntax);
        let key = AnalysisKey::from(document.id());
        let versions = VersionArgument::document(document.text_version(), document.syntax_version());

        self.memoized(state.name(), key, || {
            let existing = state.try_get_existing_data(key);
            if let Some(existing) = &existing {
                if existing.text_version().matches(versions.text)
                    && existing.data_version().matches(versions.data)
                {
                    return Ok(existing.clone());
                }
            }
            let items = driver.syntax_diagnostics(set.analyzer().as_ref(), document)?;
            driver.token.check()?;
            Ok(AnalysisData::computed(
                versions.text,
                versions.data,
                items.into(),
                old_items(existing),
            ))
        })
    }

    /// Document-level semantic diagnostics, keyed by (text version,
    /// dependent semantic version). The project's reuse policy may keep
    /// the set alive across a trivia-only text change.
    pub fn document_data(
        &self,
        set: &StateSet,
        document: &Document,
        project: &Project,
        driver: &AnalyzerDriver<'_>,
    ) -> Result<AnalysisData, EngineError> {
        let state = set.state(StateType::Document);
        let key = AnalysisKey::from(document.id());
        let versions = VersionArgument::document(
            document.text_version(),
            project.dependent_semantic_version(),
        );

        self.memoized(state.name(), key, || {
            let existing = state.try_get_existing_data(key);
            if let Some(existing) = &existing {
                if Self::document_reusable(existing, versions, project) {
                    tracing::debug!(state = %state.name(), ?key, "cache hit");
                    return Ok(existing.clone());
                }
            }
            tracing::debug!(state = %state.name(), ?key, "cache miss, running analyzer");
            let items = driver.semantic_diagnostics(set.analyzer().as_ref(), document, None)?;
            driver.token.check()?;
            self.member_ranges.touch(set.analyzer_name(), document);
            Ok(AnalysisData::computed(
                versions.text,
                versions.data,
                items.into(),
                old_items(existing),
            ))
        })
    }

    /// Like [`document_data`](Self::document_data), but for an edit
    /// confined to one member body: when the saved member layout still
    /// lines up, only that member is reanalyzed and the fresh
    /// diagnostics are spliced into the previous set, shifting spans
    /// after the member by the length delta.
    pub fn document_body_data(
        &self,
        set: &StateSet,
        document: &Document,
        project: &Project,
        member_id: usize,
        driver: &AnalyzerDriver<'_>,
    ) -> Result<AnalysisData, EngineError> {
        let state = set.state(StateType::Document);
        let key = AnalysisKey::from(document.id());
        let versions = VersionArgument::document(
            document.text_version(),
            project.dependent_semantic_version(),
        );

        self.memoized(state.name(), key, || {
            let existing = state.try_get_existing_data(key);
            if let Some(existing) = &existing {
                if Self::document_reusable(existing, versions, project) {
                    return Ok(existing.clone());
                }
            }

            if let Some(spliced) =
                self.try_splice(set, document, member_id, existing.as_ref(), driver)?
            {
                tracing::debug!(state = %state.name(), ?key, member_id, "member splice");
                driver.token.check()?;
                let previous = old_items(existing);
                return Ok(AnalysisData::computed(versions.text, versions.data, spliced, previous));
            }

            let items = driver.semantic_diagnostics(set.analyzer().as_ref(), document, None)?;
            driver.token.check()?;
            self.member_ranges.touch(set.analyzer_name(), document);
            Ok(AnalysisData::computed(
                versions.text,
                versions.data,
                items.into(),
                old_items(existing),
            ))
        })
    }

    /// The member-scoped path. `None` means the preconditions failed and
    /// the caller must fall back to a full run: the analyzer does not
    /// support narrowing, no layout was saved, the member id is out of
    /// range, the member count changed, or the previous set was computed
    /// against a different layout than the one saved.
    fn try_splice(
        &self,
        set: &StateSet,
        document: &Document,
        member_id: usize,
        existing: Option<&AnalysisData>,
        driver: &AnalyzerDriver<'_>,
    ) -> Result<Option<Arc<[DiagnosticData]>>, EngineError> {
        if !set.analyzer().supports_span_analysis() {
            return Ok(None);
        }
        let Some(existing) = existing else {
            return Ok(None);
        };
        let Some(saved) = self
            .member_ranges
            .saved_member_range(document.id(), set.analyzer_name())
        else {
            return Ok(None);
        };
        if member_id >= saved.spans.len()
            || document.member_spans().len() != saved.spans.len()
            || !existing.text_version().matches(saved.version)
        {
            return Ok(None);
        }

        let old_span = saved.spans[member_id];
        let new_span = document.member_spans()[member_id];
        let fresh =
            driver.semantic_diagnostics(set.analyzer().as_ref(), document, Some(new_span))?;

        let delta = i64::from(new_span.len()) - i64::from(old_span.len());
        let bound = document.length();
        let mut items: Vec<DiagnosticData> = existing
            .items()
            .iter()
            .filter(|item| !span_touches(old_span, item.span))
            .map(|item| {
                if item.span.start >= old_span.end {
                    item.shifted(delta, bound)
                } else {
                    item.clone()
                }
            })
            .collect();
        items.extend(fresh);

        self.member_ranges
            .update_member_range(set.analyzer_name(), document, member_id, &saved);
        Ok(Some(items.into()))
    }

    /// Whole-project diagnostics, keyed by (project version, dependent
    /// semantic version). On a hit the returned items are the
    /// project-attributed slice; per-document slices are read from the
    /// project state under their own keys. On a miss the full set is
    /// returned for the caller to slice and persist.
    pub fn project_data(
        &self,
        set: &StateSet,
        project: &Project,
        driver: &AnalyzerDriver<'_>,
    ) -> Result<AnalysisData, EngineError> {
        let state = set.state(StateType::Project);
        let key = AnalysisKey::from(project.id());
        let versions =
            VersionArgument::project(project.version(), project.dependent_semantic_version());

        self.memoized(state.name(), key, || {
            let existing = state.try_get_existing_data(key);
            if let Some(existing) = &existing {
                if existing.text_version().matches(versions.project)
                    && existing.data_version().matches(versions.data)
                {
                    tracing::debug!(state = %state.name(), ?key, "cache hit");
                    return Ok(existing.clone());
                }
            }
            tracing::debug!(state = %state.name(), ?key, "cache miss, running analyzer");
            let items = driver.project_diagnostics(set.analyzer().as_ref(), project)?;
            driver.token.check()?;
            Ok(AnalysisData::computed(
                versions.project,
                versions.data,
                items.into(),
                old_items(existing),
            ))
        })
    }

    /// Document-state reuse: same dependent semantic version, and either
    /// the exact text version or a reuse policy that tolerates the text
    /// change.
    fn document_reusable(
        existing: &AnalysisData,
        versions: VersionArgument,
        project: &Project,
    ) -> bool {
        let reusable = existing.text_version().matches(versions.text)
            || project
                .reuse_policy()
                .can_reuse(existing.data_version(), versions.data);
        existing.data_version().matches(versions.data) && reusable
    }
}

fn old_items(existing: Option<AnalysisData>) -> Arc<[DiagnosticData]> {
    existing
        .map(|data| data.items().clone())
        .unwrap_or_else(|| Arc::from(Vec::new()))
}
