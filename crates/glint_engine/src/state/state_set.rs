//! One analyzer's three caches.

use std::sync::Arc;

use crate::analyzer::AnalyzerRef;
use crate::storage::StorageRef;

use super::{DiagnosticState, StateType};

/// Bundles an analyzer with its syntax, document, and project caches
/// for one language.
pub struct StateSet {
    analyzer: AnalyzerRef,
    analyzer_name: Arc<str>,
    language: Arc<str>,
    from_host: bool,
    syntax: DiagnosticState,
    document: DiagnosticState,
    project: DiagnosticState,
}

impl StateSet {
    pub fn new(analyzer: AnalyzerRef, language: Arc<str>, from_host: bool, storage: StorageRef) -> Self {
        let analyzer_name: Arc<str> = Arc::from(analyzer.name());
        let version = analyzer.cache_version();
        let state = |state_type: StateType| {
            DiagnosticState::new(
                Arc::from(format!("{language}/{analyzer_name}/{}", state_type.as_str())),
                version,
                storage.clone(),
            )
        };
        StateSet {
            syntax: state(StateType::Syntax),
            document: state(StateType::Document),
            project: state(StateType::Project),
            analyzer,
            analyzer_name,
            language,
            from_host,
        }
    }

    pub fn analyzer(&self) -> &AnalyzerRef {
        &self.analyzer
    }

    pub fn analyzer_name(&self) -> &Arc<str> {
        &self.analyzer_name
    }

    /// Whether the analyzer came from the host rather than a project
    /// reference.
    pub fn is_host(&self) -> bool {
        self.from_host
    }

    pub fn state(&self, state_type: StateType) -> &DiagnosticState {
        match state_type {
            StateType::Syntax => &self.syntax,
            StateType::Document => &self.document,
            StateType::Project => &self.project,
        }
    }

    /// The three states with their granularities.
    pub fn states(&self) -> impl Iterator<Item = (StateType, &DiagnosticState)> {
        StateType::ALL
            .into_iter()
            .map(move |state_type| (state_type, self.state(state_type)))
    }
}

impl std::fmt::Debug for StateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSet")
            .field("analyzer", &self.analyzer_name)
            .field("language", &self.language)
            .field("from_host", &self.from_host)
            .finish_non_exhaustive()
    }
}
