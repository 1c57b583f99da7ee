//! Engine errors.
//!
//! Three kinds of failure leave the engine:
//!
//! - [`EngineError::Cancelled`] — the caller's cancellation token fired;
//!   always propagated untouched and never converted into a diagnostic.
//! - [`EngineError::Storage`] — the persistent cache refused a write.
//!   Reads never produce this: a failed read is a cache miss.
//! - [`EngineError::Internal`] — an invariant violation. This is a
//!   defect, not a recoverable condition; it is reported once through
//!   the error log and then surfaced so callers do not silently retry.
//!
//! Analyzer failures are not in this taxonomy: they are converted into a
//! synthetic diagnostic at the crash site so sibling analyzers keep
//! running.

use thiserror::Error;

/// Errors surfaced by the analysis engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The persistent cache failed a write.
    #[error("cache storage failure: {0}")]
    Storage(String),

    /// An internal invariant was violated.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

/// Report an invariant violation once and build the sentinel error.
///
/// The caller is expected to return this error, not swallow it.
#[track_caller]
pub(crate) fn invariant_violation(message: impl Into<String>) -> EngineError {
    let message = message.into();
    tracing::error!(target: "glint::fatal", location = %std::panic::Location::caller(), "{message}");
    EngineError::Internal(message)
}
