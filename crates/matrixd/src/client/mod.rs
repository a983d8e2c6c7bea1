mod tcp;

use async_trait::async_trait;
pub use tcp::TcpMatrixClient;

use crate::engine::MatrixState;

/// Transport-level failure talking to the matrix
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for reply to '{0}'")]
    Timeout(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Trait for matrix device operations
///
/// This trait allows for mocking the device for testing purposes
#[async_trait]
pub trait MatrixClient: Send + Sync {
    /// Route `input` (1-based) to `output` (1-based)
    async fn set_output_source(&self, input: u8, output: u8) -> Result<(), ClientError>;

    /// Read power, model and routing from the device
    async fn query_state(&self) -> Result<MatrixState, ClientError>;
}
