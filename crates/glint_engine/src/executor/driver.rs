//! Analyzer invocation with failure isolation.
//!
//! The driver is the only code that calls into analyzer entry points.
//! It consults capability flags, scopes results to the requested
//! document or span, and converts analyzer crashes into a synthetic
//! diagnostic so one broken analyzer cannot take down the engine.

use glint_core::{ProjectId, Span};
use glint_diagnostic::DiagnosticData;

use crate::analyzer::{analyzer_failure_diagnostic, Analyzer, AnalyzerFailure};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::workspace::{Document, Project, Solution};

/// Whether a diagnostic at `inner` belongs to the region `outer`.
///
/// Zero-length diagnostic spans (a caret at a position) count when the
/// position falls inside the region; nonempty spans count on overlap.
pub(crate) fn span_touches(outer: Span, inner: Span) -> bool {
    if inner.is_empty() {
        outer.contains(inner.start)
    } else {
        outer.intersects(inner)
    }
}

/// Borrowed context for one batch of analyzer invocations.
pub struct AnalyzerDriver<'a> {
    pub solution: &'a Solution,
    pub config: &'a EngineConfig,
    pub token: &'a CancellationToken,
}

impl<'a> AnalyzerDriver<'a> {
    pub fn new(
        solution: &'a Solution,
        config: &'a EngineConfig,
        token: &'a CancellationToken,
    ) -> Self {
        AnalyzerDriver {
            solution,
            config,
            token,
        }
    }

    /// Run syntax analysis over one document.
    pub fn syntax_diagnostics(
        &self,
        analyzer: &dyn Analyzer,
        document: &Document,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        if !analyzer.supports_syntax_analysis() {
            return Ok(Vec::new());
        }
        self.token.check()?;
        match analyzer.analyze_syntax(document, self.token) {
            Ok(items) => Ok(Self::scope_to_document(items, document, None)),
            Err(failure) => self.handle_failure(analyzer, failure, document.id().project),
        }
    }

    /// Run semantic analysis over one document, optionally narrowed to
    /// a member span.
    pub fn semantic_diagnostics(
        &self,
        analyzer: &dyn Analyzer,
        document: &Document,
        span: Option<Span>,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        if !analyzer.supports_semantic_analysis() {
            return Ok(Vec::new());
        }
        self.token.check()?;
        // Narrowing is only sound when the analyzer opted in.
        let span = span.filter(|_| analyzer.supports_span_analysis());
        match analyzer.analyze_semantics(document, span, self.token) {
            Ok(items) => Ok(Self::scope_to_document(items, document, span)),
            Err(failure) => self.handle_failure(analyzer, failure, document.id().project),
        }
    }

    /// Run whole-project analysis.
    pub fn project_diagnostics(
        &self,
        analyzer: &dyn Analyzer,
        project: &Project,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        if !analyzer.supports_project_analysis() {
            return Ok(Vec::new());
        }
        self.token.check()?;
        match analyzer.analyze_project(project, self.solution, self.token) {
            Ok(items) => Ok(items
                .into_iter()
                .filter(|item| item.project == project.id())
                .collect()),
            Err(failure) => self.handle_failure(analyzer, failure, project.id()),
        }
    }

    fn scope_to_document(
        items: Vec<DiagnosticData>,
        document: &Document,
        span: Option<Span>,
    ) -> Vec<DiagnosticData> {
        items
            .into_iter()
            .filter(|item| item.document == Some(document.id()))
            .filter(|item| span.is_none_or(|outer| span_touches(outer, item.span)))
            .collect()
    }

    fn handle_failure(
        &self,
        analyzer: &dyn Analyzer,
        failure: AnalyzerFailure,
        project: ProjectId,
    ) -> Result<Vec<DiagnosticData>, EngineError> {
        match failure {
            AnalyzerFailure::Cancelled => {
                // An analyzer observing our token is ordinary
                // cancellation; claiming cancellation unprompted is a
                // bug in the analyzer.
                if self.token.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                let message = "analyzer reported cancellation without a cancellation request";
                if self.config.crash_on_analyzer_failure {
                    return Err(crate::error::invariant_violation(message));
                }
                tracing::warn!(analyzer = analyzer.name(), message);
                Ok(vec![analyzer_failure_diagnostic(
                    analyzer.name(),
                    message,
                    project,
                )])
            }
            AnalyzerFailure::Failed(message) => {
                if self.config.crash_on_analyzer_failure {
                    return Err(crate::error::invariant_violation(format!(
                        "analyzer `{}` failed: {message}",
                        analyzer.name()
                    )));
                }
                tracing::warn!(analyzer = analyzer.name(), %message, "analyzer failed");
                Ok(vec![analyzer_failure_diagnostic(
                    analyzer.name(),
                    &message,
                    project,
                )])
            }
        }
    }
}
