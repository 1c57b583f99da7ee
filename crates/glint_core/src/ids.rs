//! Workspace identities.
//!
//! Documents are identified within their owning project, so a
//! [`DocumentId`] alone is enough to attribute a diagnostic to both a
//! document and a project. [`AnalysisKey`] is the sum type used to key
//! analysis state: one cache record always belongs to exactly one
//! document or to a project as a whole, never both.

use std::fmt;

/// Identity of one project in the workspace.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ProjectId(pub u32);

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Identity of one document, scoped by its owning project.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DocumentId {
    pub project: ProjectId,
    pub local: u32,
}

impl DocumentId {
    /// Create a document id within a project.
    pub const fn new(project: ProjectId, local: u32) -> Self {
        DocumentId { project, local }
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:D{}", self.project, self.local)
    }
}

/// Key of one analysis state record: a document or a whole project.
///
/// Replaces runtime "is this a document or a project?" type tests with
/// an explicit two-variant sum carrying a shared project accessor.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AnalysisKey {
    Document(DocumentId),
    Project(ProjectId),
}

impl AnalysisKey {
    /// The project this key belongs to.
    pub fn project(&self) -> ProjectId {
        match self {
            AnalysisKey::Document(doc) => doc.project,
            AnalysisKey::Project(project) => *project,
        }
    }

    /// The document this key names, if it names one.
    pub fn document(&self) -> Option<DocumentId> {
        match self {
            AnalysisKey::Document(doc) => Some(*doc),
            AnalysisKey::Project(_) => None,
        }
    }
}

impl fmt::Debug for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKey::Document(doc) => write!(f, "{doc:?}"),
            AnalysisKey::Project(project) => write!(f, "{project:?}"),
        }
    }
}

impl From<DocumentId> for AnalysisKey {
    fn from(doc: DocumentId) -> Self {
        AnalysisKey::Document(doc)
    }
}

impl From<ProjectId> for AnalysisKey {
    fn from(project: ProjectId) -> Self {
        AnalysisKey::Project(project)
    }
}
