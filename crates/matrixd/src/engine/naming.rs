use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::error;
use tracing::info;
use tracing::warn;

use super::error::MatrixError;
use super::message::ConfigSnapshot;
use super::message::EngineMessage;
use super::message::EngineSender;
use crate::config::ConfigStore;

pub const NAME_MAX_LEN: usize = 50;

/// Check a display name: 1 to 50 characters of letters, digits, whitespace, `-` or `_`
pub fn validate_name(name: &str) -> Result<(), MatrixError> {
    let invalid = |reason| MatrixError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let len = name.chars().count();
    if len == 0 {
        return Err(invalid("name is empty"));
    }
    if len > NAME_MAX_LEN {
        return Err(invalid("name is longer than 50 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || c == '-' || c == '_')
    {
        return Err(invalid(
            "only letters, digits, spaces, '-' and '_' are allowed",
        ));
    }

    Ok(())
}

/// Set `names[id - 1]`, padding with `"<prefix> k"` placeholders first
fn set_name(names: &mut Vec<String>, prefix: &str, id: u8, name: &str) {
    let index = usize::from(id) - 1;
    while names.len() <= index {
        names.push(format!("{} {}", prefix, names.len() + 1));
    }
    names[index] = name.to_string();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Port {
    Input,
    Output,
}

impl Port {
    fn prefix(self) -> &'static str {
        match self {
            Port::Input => "Input",
            Port::Output => "Output",
        }
    }
}

/// Display names for inputs and outputs of one configuration snapshot.
///
/// A successful rename persists the new lists and asks the engine to rebuild
/// from the resulting snapshot. That retires this registry: it would otherwise
/// keep editing a configuration that is no longer current.
pub struct NamingRegistry {
    snapshot: Arc<ConfigSnapshot>,
    config_store: Arc<dyn ConfigStore>,
    engine_tx: EngineSender,
    retired: AtomicBool,
}

impl NamingRegistry {
    pub fn new(
        snapshot: Arc<ConfigSnapshot>,
        config_store: Arc<dyn ConfigStore>,
        engine_tx: EngineSender,
    ) -> Self {
        Self {
            snapshot,
            config_store,
            engine_tx,
            retired: AtomicBool::new(false),
        }
    }

    pub fn input_names(&self) -> Vec<String> {
        self.snapshot.matrix.input_names()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.snapshot.matrix.output_names()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub async fn rename_input(
        &self,
        input_id: u8,
        name: &str,
    ) -> Result<Arc<ConfigSnapshot>, MatrixError> {
        self.rename(Port::Input, input_id, name).await
    }

    pub async fn rename_output(
        &self,
        output_id: u8,
        name: &str,
    ) -> Result<Arc<ConfigSnapshot>, MatrixError> {
        self.rename(Port::Output, output_id, name).await
    }

    async fn rename(
        &self,
        port: Port,
        id: u8,
        name: &str,
    ) -> Result<Arc<ConfigSnapshot>, MatrixError> {
        validate_name(name)?;
        if id == 0 {
            return Err(MatrixError::InvalidId(id));
        }
        if self.retired.swap(true, Ordering::SeqCst) {
            return Err(MatrixError::Reloading);
        }

        info!("Updating {} {} name to: {}", port.prefix().to_lowercase(), id, name);

        // Start from the effective list so unconfigured placeholders are kept
        let mut matrix = self.snapshot.matrix.clone();
        match port {
            Port::Input => {
                matrix.sources = matrix.input_names();
                set_name(&mut matrix.sources, port.prefix(), id, name);
            }
            Port::Output => {
                matrix.zones = matrix.output_names();
                set_name(&mut matrix.zones, port.prefix(), id, name);
            }
        }

        if let Err(e) = self.config_store.save(&matrix).await {
            error!("Failed to persist {} {} name: {}", port.prefix().to_lowercase(), id, e);
            self.retired.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        let snapshot = Arc::new(self.snapshot.next(matrix));
        if self
            .engine_tx
            .send(EngineMessage::Reconfigure(snapshot.clone()))
            .is_err()
        {
            warn!("Engine is not running; configuration version {} will apply on restart", snapshot.version);
        }

        Ok(snapshot)
    }
}
