//! The incremental diagnostic analyzer.
//!
//! Entry point tying everything together: workspace events come in,
//! version-checked analysis runs through the executor, results land in
//! the per-analyzer states, and consumers hear about actual changes
//! through the event hub.
//!
//! ```text
//!              ┌────────────────────────────────────────────┐
//!              │            IncrementalAnalyzer             │
//! workspace ──►│ StateManager ─► AnalyzerExecutor ─► states │──► events
//!   events     │                      │                     │
//!              │               AnalyzerDriver               │
//!              └──────────────────────┼─────────────────────┘
//!                                 analyzers
//! ```
//!
//! All analysis is pull-based: nothing runs until a host calls one of
//! the `analyze_*` entry points or a query needs data.

use std::sync::Arc;

use crossbeam::channel::Receiver;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use glint_core::{AnalysisKey, DocumentId, ProjectId, Span};
use glint_diagnostic::DiagnosticData;

use crate::analyzer::AnalyzerRef;
use crate::cancellation::CancellationToken;
use crate::config::{ConcurrencyMode, EngineConfig};
use crate::error::EngineError;
use crate::events::{DiagnosticsEvent, DiagnosticsKey, EventHub};
use crate::executor::{span_touches, AnalyzerDriver, AnalyzerExecutor};
use crate::state::{AnalysisData, StateManager, StateSet, StateSetChange, StateType};
use crate::storage::StorageRef;
use crate::workspace::{Project, Solution};

mod build;
#[cfg(test)]
mod tests;

pub use build::BuildDiagnostic;

/// Incremental diagnostic analysis over a workspace.
pub struct IncrementalAnalyzer {
    config: EngineConfig,
    state_manager: StateManager,
    executor: AnalyzerExecutor,
    events: EventHub,
}

impl IncrementalAnalyzer {
    pub fn new(config: EngineConfig, storage: StorageRef) -> Self {
        IncrementalAnalyzer {
            config,
            state_manager: StateManager::new(storage),
            executor: AnalyzerExecutor::new(),
            events: EventHub::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an analyzer that applies to every project of a language.
    pub fn register_host_analyzer(&self, language: impl Into<Arc<str>>, analyzer: AnalyzerRef) {
        self.state_manager.register_host_analyzer(language, analyzer);
    }

    /// Subscribe to diagnostic change notifications.
    pub fn subscribe(&self) -> Receiver<DiagnosticsEvent> {
        self.events.subscribe()
    }

    // ---- analysis entry points ------------------------------------

    /// Re-run syntax analysis for one document where versions demand it.
    pub fn analyze_document_syntax(
        &self,
        solution: &Solution,
        id: DocumentId,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        let Some(document) = solution.document(id) else {
            return Ok(());
        };
        let Some(project) = solution.project(id.project) else {
            return Ok(());
        };
        let sets = self.updated_state_sets(solution, project)?;
        let driver = AnalyzerDriver::new(solution, &self.config, token);
        for set in &sets {
            if !set.analyzer().supports_syntax_analysis() {
                continue;
            }
            let data = self.executor.syntax_data(set, document, &driver)?;
            self.persist_and_publish(solution, set, StateType::Syntax, id.into(), data)?;
        }
        Ok(())
    }

    /// Re-run document-level semantic analysis for one document.
    pub fn analyze_document(
        &self,
        solution: &Solution,
        id: DocumentId,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.analyze_document_inner(solution, id, None, token)
    }

    /// Like [`analyze_document`](Self::analyze_document), but for an
    /// edit known to be confined to the body of member `member_id`.
    /// Falls back to full document analysis when the member layout no
    /// longer lines up.
    pub fn analyze_document_body(
        &self,
        solution: &Solution,
        id: DocumentId,
        member_id: usize,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.analyze_document_inner(solution, id, Some(member_id), token)
    }

    fn analyze_document_inner(
        &self,
        solution: &Solution,
        id: DocumentId,
        member_id: Option<usize>,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        let Some(document) = solution.document(id) else {
            return Ok(());
        };
        let Some(project) = solution.project(id.project) else {
            return Ok(());
        };
        let sets = self.updated_state_sets(solution, project)?;
        let driver = AnalyzerDriver::new(solution, &self.config, token);
        for set in &sets {
            if !set.analyzer().supports_semantic_analysis() {
                continue;
            }
            let data = match member_id {
                Some(member_id) => {
                    self.executor
                        .document_body_data(set, document, project, member_id, &driver)?
                }
                None => self.executor.document_data(set, document, project, &driver)?,
            };
            self.persist_and_publish(solution, set, StateType::Document, id.into(), data)?;
        }
        Ok(())
    }

    /// Re-run whole-project analysis where versions demand it.
    pub fn analyze_project(
        &self,
        solution: &Solution,
        id: ProjectId,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        let Some(project) = solution.project(id) else {
            return Ok(());
        };
        let sets = self.updated_state_sets(solution, project)?;
        let driver = AnalyzerDriver::new(solution, &self.config, token);
        for set in &sets {
            if !set.analyzer().supports_project_analysis() {
                continue;
            }
            let data = self.executor.project_data(set, project, &driver)?;
            if !data.is_from_cache() {
                self.persist_project_slices(solution, set, project, &data)?;
            }
        }
        Ok(())
    }

    // ---- document lifecycle ---------------------------------------

    /// A document was opened in an editor: its document-granularity
    /// results may be stale relative to the editor buffer, so they are
    /// dropped without notification.
    pub fn document_opened(&self, solution: &Solution, id: DocumentId) -> Result<(), EngineError> {
        self.clear_document_states(solution, id)
    }

    /// A document's buffer was reloaded from disk.
    pub fn document_reset(&self, solution: &Solution, id: DocumentId) -> Result<(), EngineError> {
        self.clear_document_states(solution, id)
    }

    /// A document was closed: drop its document-granularity results and
    /// its saved member layouts.
    pub fn document_closed(&self, solution: &Solution, id: DocumentId) -> Result<(), EngineError> {
        self.executor.member_ranges().remove(id);
        self.clear_document_states(solution, id)
    }

    /// Force the next analysis of these documents to recompute.
    pub fn request_reanalysis(
        &self,
        solution: &Solution,
        documents: &[DocumentId],
    ) -> Result<(), EngineError> {
        for id in documents {
            self.executor.member_ranges().remove(*id);
            self.clear_document_states(solution, *id)?;
        }
        Ok(())
    }

    /// Syntax and document states only; project-granularity results are
    /// keyed by project versions and stay valid.
    fn clear_document_states(&self, solution: &Solution, id: DocumentId) -> Result<(), EngineError> {
        let Some(project) = solution.project(id.project) else {
            return Ok(());
        };
        for set in self.state_manager.resolve_state_sets(project) {
            set.state(StateType::Syntax).remove(id.into())?;
            set.state(StateType::Document).remove(id.into())?;
        }
        Ok(())
    }

    /// A document left the workspace: clear everything cached for it
    /// and tell consumers.
    pub fn remove_document(&self, solution: &Solution, id: DocumentId) -> Result<(), EngineError> {
        let Some(project) = solution.project(id.project) else {
            return Ok(());
        };
        self.executor.member_ranges().remove(id);
        let mut events = Vec::new();
        for set in self.state_manager.resolve_state_sets(project) {
            self.clear_key(&set, id.into(), &mut events)?;
        }
        if !events.is_empty() {
            self.events.publish(DiagnosticsEvent::Batch(events));
        }
        Ok(())
    }

    /// A project left the workspace. Must be called while `solution`
    /// still contains the project.
    pub fn remove_project(&self, solution: &Solution, id: ProjectId) -> Result<(), EngineError> {
        let Some(project) = solution.project(id) else {
            return Ok(());
        };
        let mut sets = self
            .state_manager
            .host_state_sets(project.language())
            .as_ref()
            .clone();
        sets.extend(self.state_manager.remove_state_sets(id));

        let mut events = Vec::new();
        for set in &sets {
            for doc in project.document_ids() {
                self.executor.member_ranges().remove(*doc);
                self.clear_key(set, (*doc).into(), &mut events)?;
            }
            self.clear_key(set, id.into(), &mut events)?;
        }
        if !events.is_empty() {
            self.events.publish(DiagnosticsEvent::Batch(events));
        }
        Ok(())
    }

    // ---- queries ---------------------------------------------------

    /// All diagnostics for a document or project, computing anything
    /// stale or missing first. Suppressed instances are filtered out
    /// unless `include_suppressed` is set.
    pub fn get_diagnostics(
        &self,
        solution: &Solution,
        key: AnalysisKey,
        include_suppressed: bool,
        token: &CancellationToken,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        let Some(project) = solution.project(key.project()) else {
            return Ok(Vec::new());
        };
        let sets = self.updated_state_sets(solution, project)?;
        let driver = AnalyzerDriver::new(solution, &self.config, token);

        let collect =
            |set: &Arc<StateSet>| self.diagnostics_for_set(solution, set, project, key, &driver);
        let results: Result<Vec<Vec<DiagnosticData>>, EngineError> = match self.config.concurrency
        {
            ConcurrencyMode::Concurrent => sets.par_iter().map(collect).collect(),
            ConcurrencyMode::Sequential => sets.iter().map(collect).collect(),
        };
        let mut out: Vec<DiagnosticData> = results?.into_iter().flatten().collect();
        if !include_suppressed {
            out.retain(|item| !item.is_suppressed);
        }
        Ok(out)
    }

    /// Whatever is cached for a document or project, without running
    /// any analyzer. May be stale.
    pub fn get_cached_diagnostics(&self, solution: &Solution, key: AnalysisKey) -> Vec<DiagnosticData> {
        self.get_cached_diagnostics_filtered(solution, key, true)
    }

    /// Cache-only lookup with suppression filtering.
    pub fn get_cached_diagnostics_filtered(
        &self,
        solution: &Solution,
        key: AnalysisKey,
        include_suppressed: bool,
    ) -> Vec<DiagnosticData> {
        let Some(project) = solution.project(key.project()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for set in self.state_manager.resolve_state_sets(project) {
            for state_type in Self::states_for_key(key).iter().copied() {
                if let Some(data) = set.state(state_type).try_get_existing_data(key) {
                    out.extend(data.items().iter().cloned());
                }
            }
        }
        if !include_suppressed {
            out.retain(|item| !item.is_suppressed);
        }
        out
    }

    /// Whether anything is cached for a document or project.
    pub fn has_cached_diagnostics(&self, solution: &Solution, key: AnalysisKey) -> bool {
        let Some(project) = solution.project(key.project()) else {
            return false;
        };
        self.state_manager
            .resolve_state_sets(project)
            .iter()
            .any(|set| {
                Self::states_for_key(key)
                    .iter()
                    .any(|state_type| set.state(*state_type).has_data(key))
            })
    }

    /// Document diagnostics intersecting a span, computed directly
    /// without touching the caches.
    pub fn get_diagnostics_for_span(
        &self,
        solution: &Solution,
        id: DocumentId,
        span: Span,
        include_suppressed: bool,
        token: &CancellationToken,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        let Some(document) = solution.document(id) else {
            return Ok(Vec::new());
        };
        let Some(project) = solution.project(id.project) else {
            return Ok(Vec::new());
        };
        let driver = AnalyzerDriver::new(solution, &self.config, token);
        let mut out = Vec::new();
        for set in self.state_manager.resolve_state_sets(project) {
            let analyzer = set.analyzer().as_ref();
            out.extend(driver.syntax_diagnostics(analyzer, document)?);
            out.extend(driver.semantic_diagnostics(analyzer, document, Some(span))?);
        }
        out.retain(|item| span_touches(span, item.span));
        if !include_suppressed {
            out.retain(|item| !item.is_suppressed);
        }
        Ok(out)
    }

    /// Like [`get_diagnostics`](Self::get_diagnostics), but restricted
    /// to the given rule ids. Analyzers that cannot produce any of the
    /// ids are skipped entirely.
    pub fn get_diagnostics_for_ids(
        &self,
        solution: &Solution,
        key: AnalysisKey,
        ids: &[&str],
        include_suppressed: bool,
        token: &CancellationToken,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        let Some(project) = solution.project(key.project()) else {
            return Ok(Vec::new());
        };
        let wanted: FxHashSet<&str> = ids.iter().copied().collect();
        let sets = self.updated_state_sets(solution, project)?;
        let driver = AnalyzerDriver::new(solution, &self.config, token);

        let mut out = Vec::new();
        for set in &sets {
            let produces_wanted = set
                .analyzer()
                .descriptors()
                .iter()
                .any(|descriptor| wanted.contains(&*descriptor.id));
            if !produces_wanted {
                continue;
            }
            out.extend(self.diagnostics_for_set(solution, set, project, key, &driver)?);
        }
        out.retain(|item| wanted.contains(&*item.id));
        if !include_suppressed {
            out.retain(|item| !item.is_suppressed);
        }
        Ok(out)
    }

    // ---- internals -------------------------------------------------

    fn states_for_key(key: AnalysisKey) -> &'static [StateType] {
        match key {
            AnalysisKey::Document(_) => &StateType::ALL,
            AnalysisKey::Project(_) => &[StateType::Project],
        }
    }

    fn updated_state_sets(
        &self,
        solution: &Solution,
        project: &Project,
    ) -> Result<Vec<Arc<StateSet>>, EngineError> {
        let (sets, change) = self.state_manager.get_or_update_state_sets(project);
        if let Some(change) = change {
            self.process_state_set_change(solution, &change)?;
        }
        Ok(sets)
    }

    /// Every diagnostic one analyzer has for a key, computing stale
    /// granularities on the way.
    fn diagnostics_for_set(
        &self,
        solution: &Solution,
        set: &Arc<StateSet>,
        project: &Project,
        key: AnalysisKey,
        driver: &AnalyzerDriver<'_>,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        let analyzer = set.analyzer();
        let mut out = Vec::new();
        match key {
            AnalysisKey::Document(id) => {
                let Some(document) = solution.document(id) else {
                    return Ok(out);
                };
                if analyzer.supports_syntax_analysis() {
                    let data = self.executor.syntax_data(set, document, driver)?;
                    out.extend(data.items().iter().cloned());
                    self.persist_and_publish(solution, set, StateType::Syntax, key, data)?;
                }
                if analyzer.supports_semantic_analysis() {
                    let data = self.executor.document_data(set, document, project, driver)?;
                    out.extend(data.items().iter().cloned());
                    self.persist_and_publish(solution, set, StateType::Document, key, data)?;
                }
                if analyzer.supports_project_analysis() {
                    let data = self.executor.project_data(set, project, driver)?;
                    if data.is_from_cache() {
                        let state = set.state(StateType::Project);
                        match state.try_get_existing_data(key) {
                            Some(slice)
                                if slice.data_version().matches(data.data_version()) =>
                            {
                                out.extend(slice.items().iter().cloned());
                            }
                            Some(_) => {
                                // Slice and project record disagree on
                                // their data version; the cached merge
                                // is invalid. Recompute the project.
                                state.remove(AnalysisKey::from(project.id()))?;
                                let data =
                                    self.executor.project_data(set, project, driver)?;
                                if !data.is_from_cache() {
                                    out.extend(
                                        data.items()
                                            .iter()
                                            .filter(|item| item.document == Some(id))
                                            .cloned(),
                                    );
                                    self.persist_project_slices(solution, set, project, &data)?;
                                }
                            }
                            None => {}
                        }
                    } else {
                        out.extend(
                            data.items()
                                .iter()
                                .filter(|item| item.document == Some(id))
                                .cloned(),
                        );
                        self.persist_project_slices(solution, set, project, &data)?;
                    }
                }
            }
            AnalysisKey::Project(_) => {
                if analyzer.supports_project_analysis() {
                    let data = self.executor.project_data(set, project, driver)?;
                    if data.is_from_cache() {
                        out.extend(data.items().iter().cloned());
                    } else {
                        out.extend(
                            data.items()
                                .iter()
                                .filter(|item| item.is_project_only())
                                .cloned(),
                        );
                        self.persist_project_slices(solution, set, project, &data)?;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Split a full project analysis result into its per-key slices and
    /// persist each. Every document gets a slice, possibly empty, so
    /// stale results from the previous run are overwritten.
    fn persist_project_slices(
        &self,
        solution: &Solution,
        set: &StateSet,
        project: &Project,
        data: &AnalysisData,
    ) -> Result<(), EngineError> {
        let state = set.state(StateType::Project);
        let mut keys: Vec<AnalysisKey> = vec![project.id().into()];
        keys.extend(project.document_ids().iter().map(|id| AnalysisKey::from(*id)));

        for key in keys {
            let items: Vec<DiagnosticData> = data
                .items()
                .iter()
                .filter(|item| match key {
                    AnalysisKey::Project(_) => item.is_project_only(),
                    AnalysisKey::Document(id) => item.document == Some(id),
                })
                .cloned()
                .collect();
            let old = state
                .try_get_existing_data(key)
                .map(|existing| existing.items().clone())
                .unwrap_or_else(|| Arc::from(Vec::new()));
            let slice =
                AnalysisData::computed(data.text_version(), data.data_version(), items.into(), old);
            let retain = (self.config.retention)(solution, key);
            state.persist(key, slice.clone(), retain)?;
            self.publish(set, StateType::Project, key, &slice);
        }
        Ok(())
    }

    fn persist_and_publish(
        &self,
        solution: &Solution,
        set: &StateSet,
        state_type: StateType,
        key: AnalysisKey,
        data: AnalysisData,
    ) -> Result<(), EngineError> {
        if data.is_from_cache() {
            return Ok(());
        }
        let retain = (self.config.retention)(solution, key);
        set.state(state_type).persist(key, data.clone(), retain)?;
        self.publish(set, state_type, key, &data);
        Ok(())
    }

    /// Notify consumers, but only about actual changes: cache hits and
    /// recomputations that produced the same multiset stay silent.
    fn publish(&self, set: &StateSet, state_type: StateType, key: AnalysisKey, data: &AnalysisData) {
        if data.is_from_cache() || !data.changed() {
            return;
        }
        let diagnostics_key = DiagnosticsKey {
            analyzer: set.analyzer_name().clone(),
            state_type,
            key,
        };
        let event = if data.items().is_empty() {
            DiagnosticsEvent::Removed {
                key: diagnostics_key,
            }
        } else {
            DiagnosticsEvent::Updated {
                key: diagnostics_key,
                items: data.items().clone(),
            }
        };
        self.events.publish(event);
    }

    /// Remove one key from every granularity of one set, recording a
    /// removal event per granularity that actually held data.
    fn clear_key(
        &self,
        set: &Arc<StateSet>,
        key: AnalysisKey,
        events: &mut Vec<DiagnosticsEvent>,
    ) -> Result<(), EngineError> {
        for (state_type, state) in set.states() {
            if state.has_data(key) {
                events.push(DiagnosticsEvent::Removed {
                    key: DiagnosticsKey {
                        analyzer: set.analyzer_name().clone(),
                        state_type,
                        key,
                    },
                });
            }
            state.remove(key)?;
        }
        Ok(())
    }

    /// A project's analyzer set changed between two observations: clear
    /// everything cached by analyzers that disappeared, as one batch.
    fn process_state_set_change(
        &self,
        solution: &Solution,
        change: &StateSetChange,
    ) -> Result<(), EngineError> {
        tracing::debug!(
            project = ?change.project,
            added = change.added.len(),
            removed = change.removed.len(),
            "project analyzer set changed"
        );
        let mut events = Vec::new();
        for set in &change.removed {
            tracing::debug!(
                analyzer = %set.analyzer_name(),
                host = set.is_host(),
                "clearing diagnostics of removed analyzer"
            );
            if let Some(project) = solution.project(change.project) {
                for doc in project.document_ids() {
                    self.clear_key(set, (*doc).into(), &mut events)?;
                }
            }
            self.clear_key(set, change.project.into(), &mut events)?;
            self.executor.member_ranges().remove_analyzer(set.analyzer_name());
        }
        if !events.is_empty() {
            self.events.publish(DiagnosticsEvent::Batch(events));
        }
        Ok(())
    }
}

impl std::fmt::Debug for IncrementalAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalAnalyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
