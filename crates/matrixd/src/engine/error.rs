use crate::client::ClientError;
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("Matrix is powered off")]
    DeviceUnavailable,

    #[error("Unknown input '{input}' for output {output}")]
    UnknownInput { output: u8, input: String },

    #[error("Unknown output {0}")]
    UnknownOutput(u8),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Invalid id {0}: ids start at 1")]
    InvalidId(u8),

    #[error("Command failed: {0}")]
    CommandFailed(#[source] ClientError),

    #[error("Poll failed: {0}")]
    PollFailed(#[source] ClientError),

    #[error("Failed to persist configuration: {0}")]
    Persist(#[from] ConfigError),

    #[error("Configuration reload in progress")]
    Reloading,
}
