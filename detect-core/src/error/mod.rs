//! Error taxonomy for the detection pipeline.
//!
//! Every fallible operation in this crate returns [`Error`], classified into
//! one of five tiers. The tier determines whether a caller should retry
//! (via [`crate::retry`]), surface the failure immediately, or treat it as
//! a bug.

/// Result type alias used throughout detect-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the detection pipeline.
///
/// - `Validation` and `DataInconsistency` are never recoverable: retrying
///   the same input will fail the same way.
/// - `Transient` and `Timeout` are recoverable: a retry with backoff may
///   succeed.
/// - `Fatal` covers conditions that should stop the coordinator loop rather
///   than be retried silently (e.g. pattern registry exhaustion).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range input supplied by a caller; never
    /// recoverable by retrying.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A transient failure talking to storage, the cluster API, or a node
    /// agent; safe to retry with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Stored state is internally inconsistent (e.g. a coverage row
    /// referencing a workload that no longer exists). Not recoverable by
    /// retrying; requires operator or reconciliation intervention.
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    /// An operation exceeded its allotted time budget; safe to retry.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// An unrecoverable condition that should halt the affected workload's
    /// processing rather than be retried (e.g. pattern registry has no
    /// usable patterns).
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Failed to serialize or deserialize a value crossing a storage or
    /// wire boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The circuit breaker guarding a storage or client call is open.
    #[error("circuit breaker open")]
    CircuitBreakerOpen,
}

impl Error {
    /// Construct a [`Error::Validation`] from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Construct a [`Error::Transient`] from any displayable message.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Construct a [`Error::DataInconsistency`] from any displayable message.
    pub fn data_inconsistency(msg: impl Into<String>) -> Self {
        Self::DataInconsistency(msg.into())
    }

    /// Construct a [`Error::Timeout`] from any displayable message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Construct a [`Error::Fatal`] from any displayable message.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Construct a [`Error::NotFound`] from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error is safe to retry with backoff.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Transient(_) | Error::Timeout(_) | Error::CircuitBreakerOpen | Error::Io(_) => {
                true
            }
            Error::Validation(_)
            | Error::DataInconsistency(_)
            | Error::Fatal(_)
            | Error::NotFound(_)
            | Error::Serialization(_) => false,
        }
    }

    /// Whether this error should halt processing for the affected workload
    /// rather than simply be surfaced to the caller.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}
