//! In-memory workspace model.
//!
//! The engine consumes the workspace as an external, independently
//! versioned data source. This module is that source's reference shape:
//! a [`Solution`] of projects and documents whose version stamps advance
//! exactly when the corresponding content axis changes.
//!
//! Version axes per document / project:
//!
//! ```text
//! Document.text_version      any character change
//! Document.syntax_version    any change that reparses differently
//! Project.semantic_version   any semantic change inside the project
//! Project.dependent_semantic_version
//!                            semantic change here or in a dependency
//! Project.version            any change at all, text included
//! ```
//!
//! A whitespace-only edit therefore bumps the text axis without touching
//! the semantic axes, which is what lets document-level caches survive
//! trivia edits.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use glint_core::{DocumentId, ProjectId, Span, VersionStamp};

use crate::analyzer::Analyzer;


/// Policy for reusing a persisted data version at document granularity.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum ReusePolicy {
    /// Reuse when the dependent data version is unchanged, even if raw
    /// text moved (trivia edits).
    #[default]
    SameDataVersion,
    /// Never reuse across a text change.
    Never,
}

impl ReusePolicy {
    /// Decide whether a record persisted at `old` is still valid at `new`.
    pub fn can_reuse(self, old: VersionStamp, new: VersionStamp) -> bool {
        match self {
            ReusePolicy::SameDataVersion => old.matches(new),
            ReusePolicy::Never => false,
        }
    }
}

/// One text document.
#[derive(Clone, Debug)]
pub struct Document {
    id: DocumentId,
    path: String,
    text: Arc<str>,
    text_version: VersionStamp,
    syntax_version: VersionStamp,
    members: Arc<[Span]>,
}

impl Document {
    fn new(id: DocumentId, path: String, text: &str) -> Self {
        Document {
            id,
            path,
            text: Arc::from(text),
            text_version: VersionStamp::fresh(),
            syntax_version: VersionStamp::fresh(),
            members: extract_members(text).into(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Document length in bytes; the clamp bound for span shifting.
    pub fn length(&self) -> u32 {
        u32::try_from(self.text.len()).unwrap_or(u32::MAX)
    }

    pub fn text_version(&self) -> VersionStamp {
        self.text_version
    }

    pub fn syntax_version(&self) -> VersionStamp {
        self.syntax_version
    }

    /// Spans of the document's method-level members, in source order,
    /// non-overlapping. The unit of partial reanalysis.
    pub fn member_spans(&self) -> &Arc<[Span]> {
        &self.members
    }

    /// 1-based line/column of a byte offset, for location blocks.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let mut line = 1u32;
        let mut col = 1u32;
        for (index, byte) in self.text.bytes().enumerate() {
            if index as u32 >= offset {
                break;
            }
            if byte == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }
}

/// One project: a set of documents plus analyzer references.
#[derive(Clone)]
pub struct Project {
    id: ProjectId,
    name: String,
    language: Arc<str>,
    documents: Vec<DocumentId>,
    analyzer_references: Vec<Arc<dyn Analyzer>>,
    references: Vec<ProjectId>,
    semantic_version: VersionStamp,
    dependent_semantic_version: VersionStamp,
    version: VersionStamp,
    reuse_policy: ReusePolicy,
    next_document: u32,
}

impl Project {
    fn new(id: ProjectId, name: String, language: Arc<str>) -> Self {
        Project {
            id,
            name,
            language,
            documents: Vec::new(),
            analyzer_references: Vec::new(),
            references: Vec::new(),
            semantic_version: VersionStamp::fresh(),
            dependent_semantic_version: VersionStamp::fresh(),
            version: VersionStamp::fresh(),
            reuse_policy: ReusePolicy::default(),
            next_document: 0,
        }
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &Arc<str> {
        &self.language
    }

    /// Document ids in this project, in insertion order.
    pub fn document_ids(&self) -> &[DocumentId] {
        &self.documents
    }

    /// Project-local analyzer references.
    pub fn analyzer_references(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzer_references
    }

    /// Projects this project depends on.
    pub fn project_references(&self) -> &[ProjectId] {
        &self.references
    }

    /// Version of the project's own semantic state.
    pub fn semantic_version(&self) -> VersionStamp {
        self.semantic_version
    }

    /// Version of the project's semantic state including dependencies.
    /// The data version for document- and project-level analysis.
    pub fn dependent_semantic_version(&self) -> VersionStamp {
        self.dependent_semantic_version
    }

    /// Version of everything about the project, text changes included.
    /// The outer key for project-level analysis.
    pub fn version(&self) -> VersionStamp {
        self.version
    }

    pub fn reuse_policy(&self) -> ReusePolicy {
        self.reuse_policy
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("language", &self.language)
            .field("documents", &self.documents)
            .field(
                "analyzer_references",
                &self
                    .analyzer_references
                    .iter()
                    .map(|analyzer| analyzer.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// The whole workspace: projects, documents, and the open-document set.
#[derive(Clone, Debug, Default)]
pub struct Solution {
    projects: FxHashMap<ProjectId, Project>,
    project_order: Vec<ProjectId>,
    documents: FxHashMap<DocumentId, Document>,
    open_documents: FxHashSet<DocumentId>,
    next_project: u32,
}

impl Solution {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project for a language.
    pub fn add_project(&mut self, name: impl Into<String>, language: impl Into<Arc<str>>) -> ProjectId {
        let id = ProjectId(self.next_project);
        self.next_project += 1;
        self.projects
            .insert(id, Project::new(id, name.into(), language.into()));
        self.project_order.push(id);
        id
    }

    /// Declare that `from` depends on `to`.
    pub fn add_project_reference(&mut self, from: ProjectId, to: ProjectId) {
        if let Some(project) = self.projects.get_mut(&from) {
            if !project.references.contains(&to) {
                project.references.push(to);
            }
        }
        self.bump_dependents_of(to, true);
    }

    /// Add a document with initial text. Counts as a semantic change.
    pub fn add_document(
        &mut self,
        project_id: ProjectId,
        path: impl Into<String>,
        text: &str,
    ) -> Option<DocumentId> {
        let project = self.projects.get_mut(&project_id)?;
        let id = DocumentId::new(project_id, project.next_document);
        project.next_document += 1;
        project.documents.push(id);
        self.documents.insert(id, Document::new(id, path.into(), text));
        self.bump_semantic(project_id);
        Some(id)
    }

    /// Remove a document and forget its open status.
    pub fn remove_document(&mut self, id: DocumentId) {
        if self.documents.remove(&id).is_some() {
            if let Some(project) = self.projects.get_mut(&id.project) {
                project.documents.retain(|doc| *doc != id);
            }
            self.open_documents.remove(&id);
            self.bump_semantic(id.project);
        }
    }

    /// Remove a project and all its documents.
    pub fn remove_project(&mut self, id: ProjectId) {
        if let Some(project) = self.projects.remove(&id) {
            self.project_order.retain(|p| *p != id);
            for doc in project.documents {
                self.documents.remove(&doc);
                self.open_documents.remove(&doc);
            }
            self.bump_dependents_of(id, true);
        }
    }

    /// Replace a document's text. Bumps every version axis: text,
    /// syntax, and the owning project's semantic state.
    pub fn edit_document(&mut self, id: DocumentId, text: &str) {
        if let Some(document) = self.documents.get_mut(&id) {
            document.text = Arc::from(text);
            document.text_version = VersionStamp::fresh();
            document.syntax_version = VersionStamp::fresh();
            document.members = extract_members(text).into();
            self.bump_semantic(id.project);
        }
    }

    /// Replace a document's text with a trivia-only change: the text
    /// version advances, syntax and semantic versions do not.
    pub fn edit_document_whitespace(&mut self, id: DocumentId, text: &str) {
        if let Some(document) = self.documents.get_mut(&id) {
            document.text = Arc::from(text);
            document.text_version = VersionStamp::fresh();
            document.members = extract_members(text).into();
            self.bump_text_only(id.project);
        }
    }

    /// Override a document's member spans, for hosts whose front-end
    /// extracts members itself.
    pub fn set_member_spans(&mut self, id: DocumentId, members: Vec<Span>) {
        if let Some(document) = self.documents.get_mut(&id) {
            document.members = members.into();
        }
    }

    /// Attach a project-local analyzer reference.
    pub fn add_analyzer_reference(&mut self, project_id: ProjectId, analyzer: Arc<dyn Analyzer>) {
        if let Some(project) = self.projects.get_mut(&project_id) {
            let name = analyzer.name().to_string();
            if project
                .analyzer_references
                .iter()
                .all(|existing| existing.name() != name)
            {
                project.analyzer_references.push(analyzer);
            }
        }
    }

    /// Detach a project-local analyzer reference by name.
    pub fn remove_analyzer_reference(&mut self, project_id: ProjectId, name: &str) {
        if let Some(project) = self.projects.get_mut(&project_id) {
            project
                .analyzer_references
                .retain(|analyzer| analyzer.name() != name);
        }
    }

    /// Set the document-granularity version reuse policy.
    pub fn set_reuse_policy(&mut self, project_id: ProjectId, policy: ReusePolicy) {
        if let Some(project) = self.projects.get_mut(&project_id) {
            project.reuse_policy = policy;
        }
    }

    /// Mark a document open in an editor.
    pub fn open_document(&mut self, id: DocumentId) {
        if self.documents.contains_key(&id) {
            self.open_documents.insert(id);
        }
    }

    /// Mark a document closed.
    pub fn close_document(&mut self, id: DocumentId) {
        self.open_documents.remove(&id);
    }

    /// Check whether a document is open.
    pub fn is_open(&self, id: DocumentId) -> bool {
        self.open_documents.contains(&id)
    }

    /// Check whether a project has at least one open document.
    pub fn has_open_documents(&self, project_id: ProjectId) -> bool {
        self.open_documents.iter().any(|doc| doc.project == project_id)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    /// Projects in insertion order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.project_order
            .iter()
            .filter_map(|id| self.projects.get(id))
    }

    /// Semantic change in `project_id`: bump its semantic axes and the
    /// dependent axes of everything that transitively references it.
    fn bump_semantic(&mut self, project_id: ProjectId) {
        if let Some(project) = self.projects.get_mut(&project_id) {
            project.semantic_version = VersionStamp::fresh();
        }
        self.bump_dependents_of(project_id, true);
    }

    /// Text-only change: the dependent semantic axes stay put.
    fn bump_text_only(&mut self, project_id: ProjectId) {
        self.bump_dependents_of(project_id, false);
    }

    fn bump_dependents_of(&mut self, changed: ProjectId, semantic: bool) {
        let affected = self.transitive_dependents(changed);
        for id in affected {
            if let Some(project) = self.projects.get_mut(&id) {
                project.version = VersionStamp::fresh();
                if semantic {
                    project.dependent_semantic_version = VersionStamp::fresh();
                }
            }
        }
    }

    /// The changed project plus everything that transitively depends
    /// on it.
    fn transitive_dependents(&self, changed: ProjectId) -> Vec<ProjectId> {
        let mut affected = vec![changed];
        let mut seen: FxHashSet<ProjectId> = affected.iter().copied().collect();
        loop {
            let mut grew = false;
            for project in self.projects.values() {
                if seen.contains(&project.id) {
                    continue;
                }
                if project.references.iter().any(|dep| seen.contains(dep)) {
                    seen.insert(project.id);
                    affected.push(project.id);
                    grew = true;
                }
            }
            if !grew {
                return affected;
            }
        }
    }
}

/// Default member extraction: maximal runs of non-blank lines.
///
/// Each run becomes one member span covering the run's text, trailing
/// newline excluded. Guaranteed non-overlapping and in source order,
/// which the span-patching path relies on.
pub fn extract_members(text: &str) -> Vec<Span> {
    let mut members = Vec::new();
    let mut offset = 0usize;
    let mut run_start: Option<usize> = None;
    let mut run_end = 0usize;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if content.trim().is_empty() {
            if let Some(start) = run_start.take() {
                members.push(Span::new(start as u32, run_end as u32));
            }
        } else {
            if run_start.is_none() {
                run_start = Some(offset);
            }
            run_end = offset + content.len();
        }
        offset += line.len();
    }
    if let Some(start) = run_start {
        members.push(Span::new(start as u32, run_end as u32));
    }
    members
}
