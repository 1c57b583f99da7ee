//! Versioned diagnostic caches.
//!
//! Results are cached per (analyzer, granularity, key) under a version
//! pair. The three granularities differ only in which workspace version
//! axes key them:
//!
//! ```text
//! state      outer (text) key            data key
//! Syntax     document text version       document syntax version
//! Document   document text version       project dependent semantic
//! Project    project version             project dependent semantic
//! ```
//!
//! [`DiagnosticState`] owns one cache; [`StateSet`] bundles one
//! analyzer's three caches; [`StateManager`] maps projects to their
//! state sets and notices analyzer-set changes.

mod analysis;
mod diagnostic_state;
mod state_manager;
mod state_set;

pub use analysis::AnalysisData;
pub use diagnostic_state::DiagnosticState;
pub use state_manager::{StateManager, StateSetChange};
pub use state_set::StateSet;

/// The three cache granularities.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StateType {
    /// Per-document, syntax-only analysis.
    Syntax,
    /// Per-document semantic analysis.
    Document,
    /// Whole-project analysis, including its per-document slices.
    Project,
}

impl StateType {
    pub const ALL: [StateType; 3] = [StateType::Syntax, StateType::Document, StateType::Project];

    pub fn as_str(self) -> &'static str {
        match self {
            StateType::Syntax => "Syntax",
            StateType::Document => "Document",
            StateType::Project => "Project",
        }
    }
}
