//! Analyzer fixtures for tests.
//!
//! [`TestAnalyzer`] flags every occurrence of a marker word in the
//! analyzed text, which makes its output a pure function of the text:
//! a member-scoped run spliced into a previous set must equal a full
//! rerun, and invocation counters expose which path actually executed.

use std::sync::atomic::{AtomicUsize, Ordering};

use glint_core::{Span, VersionStamp};
use glint_diagnostic::{DiagnosticData, DiagnosticDescriptor, Severity};

use crate::analyzer::{Analyzer, AnalyzerFailure, AnalyzerResult};
use crate::cancellation::CancellationToken;
use crate::workspace::{Document, Project, Solution};

/// The word [`TestAnalyzer`] reports diagnostics on.
pub const MARKER: &str = "flag";

/// Rule id for syntax-level marker diagnostics.
pub const SYNTAX_RULE: &str = "GLT01";
/// Rule id for semantic marker diagnostics.
pub const SEMANTIC_RULE: &str = "GLT02";
/// Rule id for the project-level marker summary.
pub const PROJECT_RULE: &str = "GLT03";

/// Deterministic analyzer for engine tests.
pub struct TestAnalyzer {
    name: String,
    cache_version: VersionStamp,
    severity: Severity,
    suppressed: bool,
    syntax: bool,
    semantic: bool,
    span: bool,
    project: bool,
    fail_with: Option<String>,
    /// Number of syntax runs.
    pub syntax_runs: AtomicUsize,
    /// Number of full-document semantic runs.
    pub semantic_runs: AtomicUsize,
    /// Number of member-scoped semantic runs.
    pub span_runs: AtomicUsize,
    /// Number of project runs.
    pub project_runs: AtomicUsize,
}

impl TestAnalyzer {
    pub fn new(name: impl Into<String>) -> Self {
        TestAnalyzer {
            name: name.into(),
            cache_version: VersionStamp::from_raw(1),
            severity: Severity::Warning,
            suppressed: false,
            syntax: false,
            semantic: false,
            span: false,
            project: false,
            fail_with: None,
            syntax_runs: AtomicUsize::new(0),
            semantic_runs: AtomicUsize::new(0),
            span_runs: AtomicUsize::new(0),
            project_runs: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_syntax(mut self) -> Self {
        self.syntax = true;
        self
    }

    #[must_use]
    pub fn with_semantics(mut self) -> Self {
        self.semantic = true;
        self
    }

    #[must_use]
    pub fn with_span_support(mut self) -> Self {
        self.semantic = true;
        self.span = true;
        self
    }

    #[must_use]
    pub fn with_project(mut self) -> Self {
        self.project = true;
        self
    }

    #[must_use]
    pub fn with_cache_version(mut self, raw: u64) -> Self {
        self.cache_version = VersionStamp::from_raw(raw);
        self
    }

    /// Severity of the marker diagnostics, `Warning` by default.
    #[must_use]
    pub fn with_marker_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Mark every reported marker as suppressed.
    #[must_use]
    pub fn with_suppressed_markers(mut self) -> Self {
        self.suppressed = true;
        self
    }

    /// Make every entry point fail with the given message.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    fn check_failure(&self) -> Result<(), AnalyzerFailure> {
        match &self.fail_with {
            Some(message) => Err(AnalyzerFailure::Failed(message.clone())),
            None => Ok(()),
        }
    }

    /// Marker occurrences in `region` of the document, reported at
    /// absolute offsets.
    fn markers(&self, document: &Document, region: Option<Span>, rule: &str) -> Vec<DiagnosticData> {
        let text = document.text();
        let (base, slice) = match region {
            Some(span) => {
                let range: std::ops::Range<usize> = span.into();
                (span.start, text.get(range).unwrap_or(""))
            }
            None => (0, text),
        };
        let descriptor = DiagnosticDescriptor::new(rule, self.severity)
            .with_category("test")
            .with_message_format("marker found");
        slice
            .match_indices(MARKER)
            .map(|(offset, word)| {
                let start = base + u32::try_from(offset).unwrap_or(u32::MAX);
                let span = Span::new(start, start + u32::try_from(word.len()).unwrap_or(0));
                let (line, column) = document.line_col(start);
                let position = glint_diagnostic::FileLine {
                    path: document.path().to_string(),
                    start_line: line,
                    start_column: column,
                    end_line: line,
                    end_column: column + span.len(),
                };
                let data = DiagnosticData::from_descriptor(
                    &descriptor,
                    document.id().project,
                    "marker found",
                )
                .in_document(document.id(), span, position);
                if self.suppressed {
                    data.suppressed()
                } else {
                    data
                }
            })
            .collect()
    }
}

impl Analyzer for TestAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptors(&self) -> Vec<DiagnosticDescriptor> {
        [
            (self.syntax, SYNTAX_RULE),
            (self.semantic, SEMANTIC_RULE),
            (self.project, PROJECT_RULE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, rule)| {
            DiagnosticDescriptor::new(rule, self.severity)
                .with_category("test")
                .with_message_format("marker found")
        })
        .collect()
    }

    fn cache_version(&self) -> VersionStamp {
        self.cache_version
    }

    fn supports_syntax_analysis(&self) -> bool {
        self.syntax
    }

    fn supports_semantic_analysis(&self) -> bool {
        self.semantic
    }

    fn supports_span_analysis(&self) -> bool {
        self.span
    }

    fn supports_project_analysis(&self) -> bool {
        self.project
    }

    fn analyze_syntax(&self, document: &Document, _token: &CancellationToken) -> AnalyzerResult {
        self.check_failure()?;
        self.syntax_runs.fetch_add(1, Ordering::SeqCst);
        Ok(self.markers(document, None, SYNTAX_RULE))
    }

    fn analyze_semantics(
        &self,
        document: &Document,
        span: Option<Span>,
        _token: &CancellationToken,
    ) -> AnalyzerResult {
        self.check_failure()?;
        if span.is_some() {
            self.span_runs.fetch_add(1, Ordering::SeqCst);
        } else {
            self.semantic_runs.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self.markers(document, span, SEMANTIC_RULE))
    }

    fn analyze_project(
        &self,
        project: &Project,
        solution: &Solution,
        _token: &CancellationToken,
    ) -> AnalyzerResult {
        self.check_failure()?;
        self.project_runs.fetch_add(1, Ordering::SeqCst);

        let mut items = Vec::new();
        let mut total = 0usize;
        for id in project.document_ids() {
            if let Some(document) = solution.document(*id) {
                let markers = self.markers(document, None, PROJECT_RULE);
                total += markers.len();
                items.extend(markers);
            }
        }
        if total > 0 {
            let descriptor = DiagnosticDescriptor::new(PROJECT_RULE, Severity::Warning)
                .with_category("test")
                .with_message_format("{0} markers in project");
            items.push(DiagnosticData::from_descriptor(
                &descriptor,
                project.id(),
                format!("{total} markers in project"),
            ));
        }
        Ok(items)
    }
}
