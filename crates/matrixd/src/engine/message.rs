//! Messages handled by the engine's event loop.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::MatrixConfig;

/// Versioned, immutable matrix configuration.
///
/// Controllers and registries are built from one snapshot and never see a
/// later one; a rename produces a new snapshot instead of editing this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub matrix: MatrixConfig,
}

impl ConfigSnapshot {
    pub fn new(matrix: MatrixConfig) -> Self {
        Self { version: 0, matrix }
    }

    /// Successor snapshot carrying `matrix`
    pub fn next(&self, matrix: MatrixConfig) -> Self {
        Self {
            version: self.version + 1,
            matrix,
        }
    }
}

/// Messages TO the engine
#[derive(Debug, Clone)]
pub enum EngineMessage {
    /// Rebuild the controller and registry from a new configuration
    Reconfigure(Arc<ConfigSnapshot>),

    /// Stop the event loop
    Shutdown,
}

/// Unbounded so renames never wait on the engine
pub type EngineSender = mpsc::UnboundedSender<EngineMessage>;
pub type EngineReceiver = mpsc::UnboundedReceiver<EngineMessage>;
