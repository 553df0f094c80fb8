//! Error types for the bridge.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the bridge.
///
/// `Config` and `Connection` are fatal at startup. `Payload` discards one
/// inbound message, `TemplateNotFound` and `Render` skip one device, and
/// `Publish` drops one outbound message; none of them stop the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// MQTT connection error.
    #[error("MQTT connection error: {0}")]
    Connection(String),

    /// Malformed device-list payload.
    #[error("Malformed device list: {0}")]
    Payload(String),

    /// No template in the store for this firmware.
    #[error("Template '{firmware}.yaml' not found")]
    TemplateNotFound { firmware: String },

    /// The template exists but rendering failed.
    #[error("Failed to render template '{firmware}.yaml': {message}")]
    Render { firmware: String, message: String },

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a payload error.
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload(err.to_string())
    }
}
