//! Diagnostic data model for the Glint analysis engine.
//!
//! A diagnostic is one reported finding: rule id, severity, message,
//! location, and rule metadata. Analyzers declare the rules they can
//! produce as [`DiagnosticDescriptor`]s and report findings as
//! [`DiagnosticData`] records attributed to a document or to a project.
//!
//! The [`serialize`] module pins the bit-level cache record layout used
//! to persist diagnostic sets between runs.

pub mod data;
pub mod descriptor;
pub mod serialize;

pub use data::{DiagnosticData, DiagnosticLocation, FileLine};
pub use descriptor::{DiagnosticDescriptor, Severity};
