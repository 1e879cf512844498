//! Binding error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Everything except `Cancelled` is a
//! composition-time or first-resolution failure: a successfully bound service
//! never raises these mid-call.

use thiserror::Error;

/// Binding result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the wirebind engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Method shape matches no dispatch-table entry. Raised when the contract
    /// is composed; fatal for that method.
    #[error("unsupported signature for method '{method}': {reason}")]
    UnsupportedSignature { method: String, reason: String },

    /// No configured factory accepts a payload type. Raised on first
    /// resolution attempt.
    #[error("no marshaller available for {type_name}")]
    NoMarshaller { type_name: &'static str },

    /// A packing/unpacking transform found fewer logical slots than the
    /// contract declares. A contract-definition bug, not a transient fault.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A method name was registered twice on one contract.
    #[error("duplicate method: {0}")]
    DuplicateMethod(String),

    /// Call aborted via its cancellation token. Not a fault: stream
    /// transforms complete promptly with this outcome.
    #[error("call cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors from the bundled JSON codec.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors (adapter invariant violations, user method failures).
    #[error("internal error: {0}")]
    Internal(String),
}

// Convenience constructors
impl Error {
    pub fn unsupported_signature(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedSignature {
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub fn no_marshaller(type_name: &'static str) -> Self {
        Self::NoMarshaller { type_name }
    }

    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn duplicate_method(msg: impl Into<String>) -> Self {
        Self::DuplicateMethod(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors resolved at contract composition or first resolution,
    /// i.e. everything a deployed service can no longer hit mid-call.
    pub fn is_composition_error(&self) -> bool {
        !matches!(self, Error::Cancelled(_))
    }
}
