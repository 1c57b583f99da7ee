//! Mapping from projects to their analyzer state sets.
//!
//! Host analyzers apply to every project of their language; project
//! analyzers ride along on the project itself. When a project's analyzer
//! set changes between two observations, the manager reports exactly
//! which state sets appeared and disappeared so stale diagnostics can be
//! cleared.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use glint_core::ProjectId;

use crate::analyzer::AnalyzerRef;
use crate::storage::StorageRef;
use crate::workspace::Project;

use super::StateSet;

/// The difference between two observations of a project's analyzers.
#[derive(Debug)]
pub struct StateSetChange {
    pub project: ProjectId,
    pub added: Vec<Arc<StateSet>>,
    pub removed: Vec<Arc<StateSet>>,
}

struct ProjectEntry {
    analyzer_names: Vec<Arc<str>>,
    state_sets: Vec<Arc<StateSet>>,
}

/// Owns every state set and the host analyzer registry.
pub struct StateManager {
    storage: StorageRef,
    host_analyzers: RwLock<FxHashMap<Arc<str>, Vec<AnalyzerRef>>>,
    host_states: RwLock<FxHashMap<Arc<str>, Arc<Vec<Arc<StateSet>>>>>,
    project_states: RwLock<FxHashMap<ProjectId, ProjectEntry>>,
}

impl StateManager {
    pub fn new(storage: StorageRef) -> Self {
        StateManager {
            storage,
            host_analyzers: RwLock::new(FxHashMap::default()),
            host_states: RwLock::new(FxHashMap::default()),
            project_states: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a host analyzer for a language. First registration of a
    /// name wins; duplicates are ignored.
    pub fn register_host_analyzer(&self, language: impl Into<Arc<str>>, analyzer: AnalyzerRef) {
        let language = language.into();
        let mut registry = self.host_analyzers.write();
        let analyzers = registry.entry(language.clone()).or_default();
        if analyzers.iter().any(|existing| existing.name() == analyzer.name()) {
            return;
        }
        analyzers.push(analyzer);
        // Lazily rebuilt on next use.
        self.host_states.write().remove(&language);
    }

    /// Host state sets for a language, built on first use.
    pub fn host_state_sets(&self, language: &Arc<str>) -> Arc<Vec<Arc<StateSet>>> {
        if let Some(sets) = self.host_states.read().get(language) {
            return sets.clone();
        }
        let analyzers = self
            .host_analyzers
            .read()
            .get(language)
            .cloned()
            .unwrap_or_default();
        let sets: Arc<Vec<Arc<StateSet>>> = Arc::new(
            analyzers
                .into_iter()
                .map(|analyzer| {
                    Arc::new(StateSet::new(
                        analyzer,
                        language.clone(),
                        true,
                        self.storage.clone(),
                    ))
                })
                .collect(),
        );
        self.host_states
            .write()
            .entry(language.clone())
            .or_insert(sets)
            .clone()
    }

    /// All state sets applying to a project, updating the stored
    /// project entry. Returns the change when the project-side analyzer
    /// set differs from the previous observation.
    pub fn get_or_update_state_sets(
        &self,
        project: &Project,
    ) -> (Vec<Arc<StateSet>>, Option<StateSetChange>) {
        let host_sets = self.host_state_sets(project.language());
        let host_names: FxHashSet<&str> = host_sets
            .iter()
            .map(|set| set.analyzer_name().as_ref())
            .collect();

        // Host analyzers shadow same-named project analyzers.
        let project_analyzers: Vec<AnalyzerRef> = project
            .analyzer_references()
            .iter()
            .filter(|analyzer| !host_names.contains(analyzer.name()))
            .cloned()
            .collect();
        let current_names: Vec<Arc<str>> = project_analyzers
            .iter()
            .map(|analyzer| Arc::from(analyzer.name()))
            .collect();

        let mut entries = self.project_states.write();
        let previous = entries.get(&project.id());
        let change = match previous {
            Some(entry) if entry.analyzer_names == current_names => None,
            Some(entry) => {
                let current: FxHashSet<&str> =
                    current_names.iter().map(AsRef::as_ref).collect();
                let removed = entry
                    .state_sets
                    .iter()
                    .filter(|set| !current.contains(set.analyzer_name().as_ref()))
                    .cloned()
                    .collect();
                Some(StateSetChange {
                    project: project.id(),
                    // Filled in below once the new sets exist.
                    added: Vec::new(),
                    removed,
                })
            }
            None => None,
        };

        let kept: FxHashMap<Arc<str>, Arc<StateSet>> = previous
            .map(|entry| {
                entry
                    .state_sets
                    .iter()
                    .map(|set| (set.analyzer_name().clone(), set.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut added = Vec::new();
        let state_sets: Vec<Arc<StateSet>> = project_analyzers
            .into_iter()
            .map(|analyzer| {
                if let Some(existing) = kept.get(analyzer.name()) {
                    existing.clone()
                } else {
                    let set = Arc::new(StateSet::new(
                        analyzer,
                        project.language().clone(),
                        false,
                        self.storage.clone(),
                    ));
                    added.push(set.clone());
                    set
                }
            })
            .collect();

        entries.insert(
            project.id(),
            ProjectEntry {
                analyzer_names: current_names,
                state_sets: state_sets.clone(),
            },
        );

        let change = change.map(|mut change| {
            change.added = added;
            change
        });

        let mut all = host_sets.as_ref().clone();
        all.extend(state_sets);
        (all, change)
    }

    /// All state sets applying to a project without updating the stored
    /// entry. Used by read-only queries.
    pub fn resolve_state_sets(&self, project: &Project) -> Vec<Arc<StateSet>> {
        let mut all = self.host_state_sets(project.language()).as_ref().clone();
        if let Some(entry) = self.project_states.read().get(&project.id()) {
            all.extend(entry.state_sets.iter().cloned());
        }
        all
    }

    /// Forget a removed project's state sets, returning them so callers
    /// can clear their cached diagnostics.
    pub fn remove_state_sets(&self, project: ProjectId) -> Vec<Arc<StateSet>> {
        self.project_states
            .write()
            .remove(&project)
            .map(|entry| entry.state_sets)
            .unwrap_or_default()
    }
}
