//! Merging build results into the live diagnostic states.
//!
//! A completed build reports an authoritative snapshot of a project's
//! diagnostics, but only the ones builds emit: hidden-severity live
//! findings survive the merge. Build diagnostics whose rule id no
//! analyzer recognizes are dropped, since no state could own them.

use rustc_hash::{FxHashMap, FxHashSet};

use glint_core::{AnalysisKey, DocumentId, ProjectId, Span};
use glint_diagnostic::{DiagnosticData, DiagnosticDescriptor, FileLine, Severity};

use crate::error::EngineError;
use crate::state::{AnalysisData, StateType};
use crate::workspace::Solution;

use super::IncrementalAnalyzer;

/// One diagnostic as reported by a build, before reshaping.
#[derive(Clone, Debug)]
pub struct BuildDiagnostic {
    pub rule_id: String,
    pub message: String,
    /// Attributed document, when the build could resolve one.
    pub document: Option<DocumentId>,
    pub span: Option<Span>,
    pub position: Option<FileLine>,
    /// Effective severity the build applied; the descriptor's default
    /// when absent.
    pub severity: Option<Severity>,
}

impl BuildDiagnostic {
    /// Reshape into live form using the owning rule's descriptor, so
    /// merged build diagnostics carry the same metadata live ones do.
    fn reshape(&self, descriptor: &DiagnosticDescriptor, project: ProjectId) -> DiagnosticData {
        let mut data = DiagnosticData::from_descriptor(descriptor, project, self.message.clone());
        if let (Some(document), Some(span)) = (self.document, self.span) {
            data = data.in_document(document, span, self.position.clone().unwrap_or_default());
        }
        if let Some(severity) = self.severity {
            data = data.with_severity(severity);
        }
        data
    }
}

impl IncrementalAnalyzer {
    /// Replace live diagnostics for a project with a build's snapshot.
    ///
    /// Hidden-severity live items are preserved: builds never report
    /// them, so their absence from the snapshot is not evidence they
    /// went away. Returns the open documents whose build results were
    /// discarded in favor of live re-analysis, when
    /// `prefer_live_diagnostics_on_open_files` is set; the host should
    /// schedule analysis for them.
    pub fn synchronize_build_diagnostics(
        &self,
        solution: &Solution,
        project_id: ProjectId,
        build: &[BuildDiagnostic],
    ) -> Result<Vec<DocumentId>, EngineError> {
        let Some(project) = solution.project(project_id) else {
            return Ok(Vec::new());
        };
        let mut keys: Vec<AnalysisKey> = vec![project_id.into()];
        keys.extend(project.document_ids().iter().map(|id| AnalysisKey::from(*id)));
        self.merge_build_snapshot(solution, project_id, &keys, build)
    }

    /// Per-document variant: merge a build's snapshot for one document
    /// only, leaving every other key untouched.
    pub fn synchronize_build_diagnostics_for_document(
        &self,
        solution: &Solution,
        id: DocumentId,
        build: &[BuildDiagnostic],
    ) -> Result<Vec<DocumentId>, EngineError> {
        if solution.document(id).is_none() {
            return Ok(Vec::new());
        }
        let scoped: Vec<BuildDiagnostic> = build
            .iter()
            .filter(|item| item.document == Some(id))
            .cloned()
            .collect();
        self.merge_build_snapshot(solution, id.project, &[id.into()], &scoped)
    }

    fn merge_build_snapshot(
        &self,
        solution: &Solution,
        project_id: ProjectId,
        keys: &[AnalysisKey],
        build: &[BuildDiagnostic],
    ) -> Result<Vec<DocumentId>, EngineError> {
        let Some(project) = solution.project(project_id) else {
            return Ok(Vec::new());
        };
        let sets = self.updated_state_sets(solution, project)?;

        let mut needs_live: Vec<DocumentId> = Vec::new();
        let mut seen_open: FxHashSet<DocumentId> = FxHashSet::default();
        let accepted: Vec<&BuildDiagnostic> = build
            .iter()
            .filter(|item| {
                let Some(document) = item.document else {
                    return true;
                };
                if self.config.prefer_live_diagnostics_on_open_files && solution.is_open(document) {
                    if seen_open.insert(document) {
                        needs_live.push(document);
                    }
                    return false;
                }
                true
            })
            .collect();

        for set in &sets {
            let descriptors = set.analyzer().descriptors();
            let by_id: FxHashMap<&str, &DiagnosticDescriptor> = descriptors
                .iter()
                .map(|descriptor| (&*descriptor.id, descriptor))
                .collect();

            let converted: Vec<DiagnosticData> = accepted
                .iter()
                .filter_map(|item| {
                    by_id
                        .get(item.rule_id.as_str())
                        .map(|descriptor| item.reshape(descriptor, project_id))
                })
                .collect();

            for key in keys.iter().copied() {
                let (state_type, text, data_version) = match key {
                    AnalysisKey::Project(_) => (
                        StateType::Project,
                        project.version(),
                        project.dependent_semantic_version(),
                    ),
                    AnalysisKey::Document(id) => {
                        let Some(document) = solution.document(id) else {
                            continue;
                        };
                        (
                            StateType::Document,
                            document.text_version(),
                            project.dependent_semantic_version(),
                        )
                    }
                };
                let state = set.state(state_type);

                let old = state
                    .try_get_existing_data(key)
                    .map(|existing| existing.items().clone())
                    .unwrap_or_else(|| std::sync::Arc::from(Vec::new()));

                // Hidden live findings survive; everything else is
                // replaced by the snapshot.
                let mut merged: Vec<DiagnosticData> = old
                    .iter()
                    .filter(|item| item.severity == Severity::Hidden)
                    .cloned()
                    .collect();
                for item in converted.iter().filter(|item| key_of(item, project_id) == key) {
                    if !merged.contains(item) {
                        merged.push(item.clone());
                    }
                }

                let slice = AnalysisData::computed(text, data_version, merged.into(), old);
                let retain = (self.config.retention)(solution, key);
                state.persist(key, slice.clone(), retain)?;
                self.publish(set, state_type, key, &slice);
            }
        }

        // Force live recomputation where the snapshot was discarded.
        self.request_reanalysis(solution, &needs_live)?;
        Ok(needs_live)
    }
}

fn key_of(item: &DiagnosticData, project: ProjectId) -> AnalysisKey {
    item.document
        .map_or_else(|| AnalysisKey::from(project), AnalysisKey::from)
}
