use thiserror::Error;

/// Message shown when the service cannot be reached at all.
pub const CONNECTION_FAILED: &str = "Unable to connect to server. Please check your connection.";

/// Message shown when the very first conversation cannot be created.
pub const INIT_FAILED: &str = "Failed to initialize chat. Please refresh the page.";

/// Local rejections. None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("A message is already being sent")]
    SendInFlight,

    #[error("The conversation is still loading")]
    NotReady,

    #[error("No conversation is open")]
    NoActiveConversation,

    #[error("No messages to analyze yet.")]
    NothingToSummarize,

    #[error("No messages to export")]
    NothingToExport,

    #[error("Nothing to retry")]
    NothingToRetry,

    #[error("'{mime}' is not an image type")]
    NotAnImage { mime: String },
}

/// Top-level client error. Every variant carries a human-readable message
/// that can be shown as-is.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Transport ────────────────────────────────────────────────────────────
    #[error("{message}")]
    TransientNetwork { message: String },

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ── Local ────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Initialization { message: String },

    #[error("Settings file '{path}' could not be used: {message}")]
    Settings { path: String, message: String },

    #[error("Failed to encode {what}: {message}")]
    Encode { what: &'static str, message: String },

    #[error("Request did not complete: {message}")]
    Task { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn network(message: impl Into<String>) -> Self {
        ClientError::TransientNetwork { message: message.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Failures of a request against the remote service; retrying may help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::TransientNetwork { .. }
                | ClientError::Server { .. }
                | ClientError::Decode { .. }
        )
    }

    pub fn is_initialization(&self) -> bool {
        matches!(self, ClientError::Initialization { .. })
    }
}

/// Failure of a best-effort output/input channel. Logged, never surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SideEffectError {
    #[error("{channel} is not supported here")]
    Unsupported { channel: &'static str },

    #[error("{channel} failed: {message}")]
    Failed { channel: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(ClientError::network("down").is_transient());
        assert!(ClientError::Server { status: 503, message: "x".into() }.is_transient());
        assert!(ClientError::from(ValidationError::EmptyMessage).is_validation());
        assert!(!ClientError::from(ValidationError::EmptyMessage).is_transient());
        assert!(ClientError::Initialization { message: INIT_FAILED.into() }.is_initialization());
    }

    #[test]
    fn test_validation_message_is_displayed_verbatim() {
        let err = ClientError::from(ValidationError::NothingToSummarize);
        assert_eq!(err.to_string(), "No messages to analyze yet.");
    }
}
