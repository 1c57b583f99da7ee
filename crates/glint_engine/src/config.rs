//! Engine configuration.
//!
//! Plain data with builder-style setters. The retention predicate is the
//! one policy knob that is a function rather than a flag: whether a
//! computed result stays in memory or is flushed to storage depends on
//! host-specific notions of "has an active consumer" that the engine
//! cannot know itself.

use std::fmt;
use std::sync::Arc;

use glint_core::AnalysisKey;

use crate::workspace::Solution;

/// How analyzers are scheduled within one analysis pass.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum ConcurrencyMode {
    /// One analyzer at a time. The default for background incremental
    /// analysis, bounding worst-case latency spikes.
    #[default]
    Sequential,
    /// Analyzers run in parallel. Used by on-demand queries to minimize
    /// user-perceived latency.
    Concurrent,
}

/// Decides whether a computed result is retained in memory (`true`) or
/// flushed to storage and evicted (`false`).
pub type RetentionPredicate = Arc<dyn Fn(&Solution, AnalysisKey) -> bool + Send + Sync>;

/// Configuration for the incremental analysis engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Scheduling mode for on-demand queries.
    pub concurrency: ConcurrencyMode,
    /// Crash the process on analyzer failure instead of reporting a
    /// synthetic diagnostic. For crash-dump collection during analyzer
    /// development only.
    pub crash_on_analyzer_failure: bool,
    /// Discard incoming build diagnostics for open documents and force
    /// live re-analysis instead of merging.
    pub prefer_live_diagnostics_on_open_files: bool,
    /// In-memory retention policy.
    pub retention: RetentionPredicate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            concurrency: ConcurrencyMode::Sequential,
            crash_on_analyzer_failure: false,
            prefer_live_diagnostics_on_open_files: false,
            retention: default_retention(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scheduling mode for on-demand queries.
    #[must_use]
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    /// Crash the process on analyzer failure.
    #[must_use]
    pub fn with_crash_on_analyzer_failure(mut self) -> Self {
        self.crash_on_analyzer_failure = true;
        self
    }

    /// Prefer live diagnostics over build results on open files.
    #[must_use]
    pub fn with_prefer_live_diagnostics_on_open_files(mut self) -> Self {
        self.prefer_live_diagnostics_on_open_files = true;
        self
    }

    /// Replace the in-memory retention predicate.
    #[must_use]
    pub fn with_retention(mut self, retention: RetentionPredicate) -> Self {
        self.retention = retention;
        self
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("concurrency", &self.concurrency)
            .field("crash_on_analyzer_failure", &self.crash_on_analyzer_failure)
            .field(
                "prefer_live_diagnostics_on_open_files",
                &self.prefer_live_diagnostics_on_open_files,
            )
            .finish_non_exhaustive()
    }
}

/// Default retention: keep a document's results in memory while it is
/// open, and a project's while any of its documents is open.
pub fn default_retention() -> RetentionPredicate {
    Arc::new(|solution: &Solution, key: AnalysisKey| match key {
        AnalysisKey::Document(doc) => solution.is_open(doc),
        AnalysisKey::Project(project) => solution.has_open_documents(project),
    })
}
