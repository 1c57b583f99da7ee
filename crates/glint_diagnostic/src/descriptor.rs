//! Diagnostic rule metadata.

use std::fmt;
use std::sync::Arc;

/// Severity level for diagnostics.
///
/// `Hidden` findings are computed by live analysis only; build runs never
/// produce them, which is why the build/live merge preserves them.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    Hidden,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Encode for the persisted cache record.
    pub const fn as_u8(self) -> u8 {
        match self {
            Severity::Hidden => 0,
            Severity::Info => 1,
            Severity::Warning => 2,
            Severity::Error => 3,
        }
    }

    /// Decode from a persisted cache record.
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Severity::Hidden),
            1 => Some(Severity::Info),
            2 => Some(Severity::Warning),
            3 => Some(Severity::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Hidden => write!(f, "hidden"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Metadata for one diagnostic rule an analyzer can produce.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DiagnosticDescriptor {
    /// Stable rule id, e.g. `"GL0042"`.
    pub id: Arc<str>,
    /// Short human-readable title.
    pub title: String,
    /// Rule category, e.g. `"style"` or `"correctness"`.
    pub category: String,
    /// Message template with placeholders, used for search.
    pub message_format: String,
    /// Longer description of the rule.
    pub description: String,
    /// Link to rule documentation.
    pub help_link: String,
    /// Severity when the rule is not configured otherwise.
    pub default_severity: Severity,
    /// Whether the rule runs without explicit opt-in.
    pub enabled_by_default: bool,
    /// Ordered tags; may repeat.
    pub custom_tags: Vec<String>,
}

impl DiagnosticDescriptor {
    /// Create a descriptor with the given id and severity.
    pub fn new(id: impl Into<Arc<str>>, default_severity: Severity) -> Self {
        DiagnosticDescriptor {
            id: id.into(),
            title: String::new(),
            category: String::new(),
            message_format: String::new(),
            description: String::new(),
            help_link: String::new(),
            default_severity,
            enabled_by_default: true,
            custom_tags: Vec::new(),
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the message template.
    #[must_use]
    pub fn with_message_format(mut self, format: impl Into<String>) -> Self {
        self.message_format = format.into();
        self
    }

    /// Set the long description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the documentation link.
    #[must_use]
    pub fn with_help_link(mut self, link: impl Into<String>) -> Self {
        self.help_link = link.into();
        self
    }

    /// Mark the rule as requiring explicit opt-in.
    #[must_use]
    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    /// Append a custom tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.custom_tags.push(tag.into());
        self
    }
}
