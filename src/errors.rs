//! Error types for the Powervault-MQTT bridge
//!
//! Uses thiserror for ergonomic error definitions.
//! These errors can be converted to anyhow::Error in the main application.

/// Powervault cloud API errors
#[derive(Debug, thiserror::Error)]
pub enum PowervaultError {
    #[error("Request to Powervault API `{path}` failed: {reason}")]
    RequestFailed { path: String, reason: String },

    #[error("Failed to parse Powervault response: {0}")]
    ParseError(String),

    #[error("Invalid battery mode: {0}")]
    InvalidMode(String),
}

/// Failure of one refresh cycle
///
/// Either variant aborts the cycle; the previous snapshot stays published.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error(transparent)]
    Transport(#[from] PowervaultError),

    #[error("Incomplete data from Powervault API: {0}")]
    DataIncomplete(String),
}

/// MQTT connection and publishing errors
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Failed to publish message to topic '{topic}': {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Failed to serialize data: {error:?}")]
    SerializationError { error: serde_json::Error },

    #[error("MQTT client error: {0}")]
    ClientError(String),
}
