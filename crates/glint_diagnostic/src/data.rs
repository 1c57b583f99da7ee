//! Diagnostic instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use glint_core::{DocumentId, ProjectId, Span};

use crate::descriptor::{DiagnosticDescriptor, Severity};

/// A file position block: path plus start/end line and column.
///
/// Stored twice per location — once for the original coordinates and
/// once for the mapped ones (line directives may redirect a diagnostic
/// to a different file and line than where it physically occurred).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct FileLine {
    pub path: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl FileLine {
    /// Create a position block.
    pub fn new(
        path: impl Into<String>,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        FileLine {
            path: path.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

/// One source location of a diagnostic.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct DiagnosticLocation {
    /// Byte span within the document, when known.
    pub span: Option<Span>,
    /// Physical coordinates.
    pub original: FileLine,
    /// Coordinates after `#line`-style mapping; equal to `original`
    /// when no mapping applies.
    pub mapped: FileLine,
}

impl DiagnosticLocation {
    /// Location with a span and identical original/mapped coordinates.
    pub fn at(span: Span, position: FileLine) -> Self {
        DiagnosticLocation {
            span: Some(span),
            mapped: position.clone(),
            original: position,
        }
    }
}

/// One reported finding.
///
/// A diagnostic without a [`location`](DiagnosticData::location) has no
/// document either: it is attributed to the project as a whole.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or cached, not silently dropped"]
pub struct DiagnosticData {
    /// Rule id, e.g. `"GL0042"`.
    pub id: Arc<str>,
    /// Rule category.
    pub category: String,
    /// Rendered message.
    pub message: String,
    /// Message template, kept for search.
    pub message_format: String,
    /// Rule title.
    pub title: String,
    /// Rule description.
    pub description: String,
    /// Rule documentation link.
    pub help_link: String,
    /// Effective severity.
    pub severity: Severity,
    /// Severity the rule would have without configuration.
    pub default_severity: Severity,
    /// Whether the rule runs without explicit opt-in.
    pub enabled_by_default: bool,
    /// Whether a suppression applies to this instance.
    pub is_suppressed: bool,
    /// Warning level; zero for errors.
    pub warning_level: u32,
    /// Ordered tags; may repeat.
    pub custom_tags: Vec<String>,
    /// Free-form properties, ordered by key.
    pub properties: BTreeMap<String, String>,
    /// Owning project.
    pub project: ProjectId,
    /// Owning document; `None` for project-only diagnostics.
    pub document: Option<DocumentId>,
    /// Primary byte span.
    pub span: Span,
    /// Primary location; `None` for project-only diagnostics.
    pub location: Option<DiagnosticLocation>,
    /// Further locations of the same shape.
    pub additional_locations: Vec<DiagnosticLocation>,
}

impl DiagnosticData {
    /// Create a project-attributed diagnostic from a rule descriptor.
    pub fn from_descriptor(
        descriptor: &DiagnosticDescriptor,
        project: ProjectId,
        message: impl Into<String>,
    ) -> Self {
        DiagnosticData {
            id: Arc::clone(&descriptor.id),
            category: descriptor.category.clone(),
            message: message.into(),
            message_format: descriptor.message_format.clone(),
            title: descriptor.title.clone(),
            description: descriptor.description.clone(),
            help_link: descriptor.help_link.clone(),
            severity: descriptor.default_severity,
            default_severity: descriptor.default_severity,
            enabled_by_default: descriptor.enabled_by_default,
            is_suppressed: false,
            warning_level: match descriptor.default_severity {
                Severity::Error => 0,
                _ => 1,
            },
            custom_tags: descriptor.custom_tags.clone(),
            properties: BTreeMap::new(),
            project,
            document: None,
            span: Span::DUMMY,
            location: None,
            additional_locations: Vec::new(),
        }
    }

    /// Attribute the diagnostic to a document at a span.
    #[must_use]
    pub fn in_document(mut self, document: DocumentId, span: Span, position: FileLine) -> Self {
        self.document = Some(document);
        self.project = document.project;
        self.span = span;
        self.location = Some(DiagnosticLocation::at(span, position));
        self
    }

    /// Override the effective severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Mark the instance as suppressed.
    #[must_use]
    pub fn suppressed(mut self) -> Self {
        self.is_suppressed = true;
        self
    }

    /// Attach a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Check the project-only attribution invariant.
    pub fn is_project_only(&self) -> bool {
        self.location.is_none() && self.document.is_none()
    }

    /// Copy of this diagnostic with every span shifted by `delta`,
    /// clamped to `bound`. Used when splicing member-level results into
    /// a cached document set.
    #[must_use]
    pub fn shifted(&self, delta: i64, bound: u32) -> Self {
        let mut shifted = self.clone();
        shifted.span = shifted.span.shift(delta, bound);
        if let Some(location) = &mut shifted.location {
            location.span = location.span.map(|span| span.shift(delta, bound));
        }
        for location in &mut shifted.additional_locations {
            location.span = location.span.map(|span| span.shift(delta, bound));
        }
        shifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn descriptor() -> DiagnosticDescriptor {
        DiagnosticDescriptor::new("GL0001", Severity::Warning)
            .with_title("unused variable")
            .with_category("correctness")
    }

    #[test]
    fn test_project_only_attribution() {
        let diagnostic = DiagnosticData::from_descriptor(&descriptor(), ProjectId(1), "message");

        assert!(diagnostic.is_project_only());
        assert_eq!(diagnostic.project, ProjectId(1));
        assert_eq!(diagnostic.document, None);
    }

    #[test]
    fn test_document_attribution() {
        let doc = DocumentId::new(ProjectId(2), 0);
        let diagnostic = DiagnosticData::from_descriptor(&descriptor(), ProjectId(1), "message")
            .in_document(doc, Span::new(5, 9), FileLine::new("a.gl", 1, 5, 1, 9));

        assert!(!diagnostic.is_project_only());
        assert_eq!(diagnostic.document, Some(doc));
        // Attribution follows the document's project.
        assert_eq!(diagnostic.project, ProjectId(2));
        assert_eq!(diagnostic.span, Span::new(5, 9));
    }

    #[test]
    fn test_shifted_moves_all_spans() {
        let doc = DocumentId::new(ProjectId(1), 0);
        let diagnostic = DiagnosticData::from_descriptor(&descriptor(), ProjectId(1), "message")
            .in_document(doc, Span::new(70, 75), FileLine::new("a.gl", 3, 1, 3, 6));

        let shifted = diagnostic.shifted(5, 200);
        assert_eq!(shifted.span, Span::new(75, 80));
        let location = shifted.location.as_ref().map(|l| l.span);
        assert_eq!(location, Some(Some(Span::new(75, 80))));
        // Everything else is untouched.
        assert_eq!(shifted.message, diagnostic.message);
    }
}
