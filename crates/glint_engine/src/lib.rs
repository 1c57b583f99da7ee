//! Incremental diagnostic analysis engine.
//!
//! Runs pluggable [`Analyzer`]s over a workspace of projects and
//! documents, caches their results keyed by content version stamps, and
//! recomputes only what an edit actually invalidated. Hosts drive it
//! with workspace events and read it through queries and a change
//! notification channel.
//!
//! # Design
//!
//! ```text
//!  workspace events        queries
//!        │                    │
//!        ▼                    ▼
//!  ┌────────────────────────────────────┐
//!  │         IncrementalAnalyzer        │
//!  │                                    │
//!  │  StateManager: project ─► StateSet │
//!  │  StateSet: analyzer + 3 caches     │
//!  │    Syntax / Document / Project     │
//!  │                                    │
//!  │  AnalyzerExecutor                  │
//!  │    version check ─► cache hit      │
//!  │    member splice ─► partial rerun  │
//!  │    AnalyzerDriver ─► full rerun    │
//!  └───────────────┬────────────────────┘
//!                  │                │
//!            DiagnosticsEvent   PersistentStorage
//! ```
//!
//! Three invariants carry the design:
//!
//! - Results are immutable once computed; an edit produces new version
//!   stamps and therefore new cache entries, never in-place mutation.
//! - Consumers only hear about actual changes. Cache hits and
//!   recomputations yielding the same multiset are silent.
//! - A broken analyzer degrades to a synthetic diagnostic; it never
//!   takes down analysis for its siblings.

pub mod analyzer;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod incremental;
pub mod member_ranges;
pub mod state;
pub mod storage;
pub mod testing;
pub mod workspace;

pub use analyzer::{Analyzer, AnalyzerFailure, AnalyzerRef, AnalyzerResult, ANALYZER_FAILURE_ID};
pub use cancellation::CancellationToken;
pub use config::{ConcurrencyMode, EngineConfig, RetentionPredicate};
pub use error::EngineError;
pub use events::{DiagnosticsEvent, DiagnosticsKey};
pub use incremental::{BuildDiagnostic, IncrementalAnalyzer};
pub use state::StateType;
pub use storage::{DiskStorage, MemoryStorage, PersistentStorage, StorageRef};
pub use workspace::{Document, Project, ReusePolicy, Solution};

pub use glint_core::{AnalysisKey, DocumentId, ProjectId, Span, VersionStamp};
pub use glint_diagnostic::{DiagnosticData, DiagnosticDescriptor, Severity};
