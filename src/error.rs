//! Error types for the streaming protocol adapter.

use thiserror::Error;

/// Errors that can occur while translating upstream events into UI chunks.
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    /// An upstream item could not be classified into a recognized shape.
    #[error("malformed upstream event: {message}")]
    MalformedInput { message: String },

    /// A user-supplied callback hook raised while handling a chunk.
    #[error("callback hook failed: {message}")]
    HookException { message: String },

    /// An internal bookkeeping invariant was violated (e.g. a delta for an
    /// unopened text segment). Always fatal to the current stream.
    #[error("translator invariant violated: {message}")]
    InvariantViolation { message: String },

    /// The upstream source itself raised an error.
    #[error("upstream error: {message}")]
    UpstreamException { message: String },

    /// The stream was cancelled by its consumer. Not a failure.
    #[error("stream cancelled")]
    Cancelled,
}

impl AdapterError {
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn hook_exception(message: impl Into<String>) -> Self {
        Self::HookException {
            message: message.into(),
        }
    }

    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn upstream_exception(message: impl Into<String>) -> Self {
        Self::UpstreamException {
            message: message.into(),
        }
    }

    /// Text suitable for an `error` chunk's `errorText` field.
    ///
    /// `MalformedInput` and `HookException` are logged and swallowed by the
    /// engine rather than surfaced to the client, so they have no rendering
    /// here.
    pub fn as_error_text(&self) -> Option<String> {
        match self {
            Self::InvariantViolation { message } => Some(message.clone()),
            Self::UpstreamException { message } => Some(message.clone()),
            Self::MalformedInput { .. } | Self::HookException { .. } | Self::Cancelled => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violation_surfaces_as_error_text() {
        let err = AdapterError::invariant_violation("text-delta for unopened segment");
        assert_eq!(
            err.as_error_text().as_deref(),
            Some("text-delta for unopened segment")
        );
    }

    #[test]
    fn malformed_input_does_not_surface() {
        let err = AdapterError::malformed_input("unrecognized shape");
        assert_eq!(err.as_error_text(), None);
    }

    #[test]
    fn cancelled_does_not_surface() {
        assert_eq!(AdapterError::Cancelled.as_error_text(), None);
    }

    #[test]
    fn display_messages_are_human_readable() {
        let err = AdapterError::upstream_exception("boom");
        assert_eq!(err.to_string(), "upstream error: boom");
    }
}
