//! Core value types shared by the Glint diagnostic analysis engine.
//!
//! Everything here is a small, cheap-to-copy value type with full
//! `Clone + Eq + Hash + Debug` coverage so it can flow through caches
//! and event payloads without ceremony:
//!
//! - [`Span`] — byte-offset source ranges with the shifting arithmetic
//!   needed for partial reanalysis.
//! - [`VersionStamp`] — opaque, totally-ordered content snapshot tokens.
//! - [`VersionArgument`] — the (text, data, project) version triple that
//!   keys every cache lookup.
//! - [`ProjectId`] / [`DocumentId`] / [`AnalysisKey`] — workspace
//!   identities; `AnalysisKey` is the document-or-project sum type used
//!   to key analysis state.

pub mod ids;
pub mod span;
pub mod version;

pub use ids::{AnalysisKey, DocumentId, ProjectId};
pub use span::Span;
pub use version::{VersionArgument, VersionStamp};
