//! The analyzer plugin contract.
//!
//! An analyzer is an arbitrary pluggable unit that inspects a document
//! or a whole project and produces diagnostics. The engine only ever
//! talks to analyzers through this trait: it asks which granularities
//! the analyzer supports, invokes the matching entry points zero or more
//! times, and requires every entry point to be safe to call concurrently
//! across distinct documents.
//!
//! Analyzers report failure by returning [`AnalyzerFailure`]; the engine
//! converts non-cancellation failures into a single synthetic diagnostic
//! at the crash site rather than dropping the analyzer's results
//! silently.

use std::sync::Arc;

use glint_core::{ProjectId, Span, VersionStamp};
use glint_diagnostic::{DiagnosticData, DiagnosticDescriptor, Severity};

use crate::cancellation::CancellationToken;
use crate::workspace::{Document, Project, Solution};

/// Rule id of the synthetic diagnostic reported when an analyzer fails.
pub const ANALYZER_FAILURE_ID: &str = "GL9001";

/// Why an analyzer invocation produced no result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyzerFailure {
    /// The analyzer observed the engine's cancellation token.
    Cancelled,
    /// The analyzer crashed.
    Failed(String),
}

/// Result of one analyzer invocation.
pub type AnalyzerResult = Result<Vec<DiagnosticData>, AnalyzerFailure>;

/// A pluggable static analyzer.
pub trait Analyzer: Send + Sync {
    /// Stable analyzer identity, used for cache partitioning. Two
    /// analyzers with the same name are treated as the same analyzer.
    fn name(&self) -> &str;

    /// The diagnostic rules this analyzer can produce.
    fn descriptors(&self) -> Vec<DiagnosticDescriptor>;

    /// Content version of the analyzer itself. Persisted cache records
    /// carrying a different stamp are treated as absent, so bumping this
    /// invalidates everything the analyzer ever cached.
    fn cache_version(&self) -> VersionStamp {
        VersionStamp::from_raw(1)
    }

    /// Whether the analyzer can run from a syntax tree alone.
    fn supports_syntax_analysis(&self) -> bool {
        false
    }

    /// Whether the analyzer needs document-local semantic information.
    fn supports_semantic_analysis(&self) -> bool {
        false
    }

    /// Whether semantic analysis can be narrowed to a member span.
    fn supports_span_analysis(&self) -> bool {
        false
    }

    /// Whether the analyzer produces whole-compilation diagnostics.
    fn supports_project_analysis(&self) -> bool {
        false
    }

    /// Analyze one document's syntax.
    fn analyze_syntax(&self, _document: &Document, _token: &CancellationToken) -> AnalyzerResult {
        Ok(Vec::new())
    }

    /// Analyze one document semantically, optionally narrowed to a span.
    fn analyze_semantics(
        &self,
        _document: &Document,
        _span: Option<Span>,
        _token: &CancellationToken,
    ) -> AnalyzerResult {
        Ok(Vec::new())
    }

    /// Analyze a whole project.
    fn analyze_project(
        &self,
        _project: &Project,
        _solution: &Solution,
        _token: &CancellationToken,
    ) -> AnalyzerResult {
        Ok(Vec::new())
    }
}

/// Build the single synthetic diagnostic describing an analyzer crash.
///
/// Attributed to the project only: the crash has no meaningful source
/// location.
pub fn analyzer_failure_diagnostic(
    analyzer_name: &str,
    message: &str,
    project: ProjectId,
) -> DiagnosticData {
    let descriptor = DiagnosticDescriptor::new(ANALYZER_FAILURE_ID, Severity::Info)
        .with_title("analyzer failure")
        .with_category("engine")
        .with_message_format("analyzer `{0}` threw an exception: {1}");
    DiagnosticData::from_descriptor(
        &descriptor,
        project,
        format!("analyzer `{analyzer_name}` threw an exception: {message}"),
    )
    .with_property("analyzer", analyzer_name)
}

/// Shared handle to an analyzer.
pub type AnalyzerRef = Arc<dyn Analyzer>;
