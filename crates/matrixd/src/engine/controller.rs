use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Serialize;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::error::MatrixError;
use super::message::ConfigSnapshot;
use super::state::MatrixState;
use super::store::MatrixStateStore;
use crate::client::MatrixClient;

/// A labeled matrix output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    pub id: u8,
    pub name: String,
}

/// Read-only summary of one output for callers outside the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputView {
    pub id: u8,
    pub name: String,
    pub options: Vec<String>,
    pub current_source: Option<String>,
    pub available: bool,
}

/// A route we sent but the device has not confirmed yet
#[derive(Debug, Clone)]
struct PendingRoute {
    input_name: String,
    /// Last poll started before the command was acknowledged
    after_poll: u64,
}

/// Validates and executes route changes for one configuration snapshot.
///
/// The current source of an output is derived from the store on every read.
/// After a successful command the chosen input is reported until the store
/// publishes a state from a poll that started after the command, at which
/// point the polled state wins.
pub struct RoutingController {
    snapshot: Arc<ConfigSnapshot>,
    inputs: Vec<String>,
    outputs: Vec<Output>,
    store: Arc<MatrixStateStore>,
    client: Arc<dyn MatrixClient>,
    pending: Mutex<HashMap<u8, PendingRoute>>,
}

impl RoutingController {
    pub fn new(
        snapshot: Arc<ConfigSnapshot>,
        store: Arc<MatrixStateStore>,
        client: Arc<dyn MatrixClient>,
    ) -> Self {
        // Ids are u8 on the wire; a matrix never has more ports than that
        let mut inputs = snapshot.matrix.input_names();
        inputs.truncate(usize::from(u8::MAX));

        let outputs = (1..=u8::MAX)
            .zip(snapshot.matrix.output_names())
            .map(|(id, name)| Output { id, name })
            .collect();

        Self {
            snapshot,
            inputs,
            outputs,
            store,
            client,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn snapshot(&self) -> &Arc<ConfigSnapshot> {
        &self.snapshot
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn output(&self, output_id: u8) -> Result<&Output, MatrixError> {
        self.outputs
            .iter()
            .find(|o| o.id == output_id)
            .ok_or(MatrixError::UnknownOutput(output_id))
    }

    /// Selectable inputs for `output_id`, in input order
    pub fn list_inputs(&self, output_id: u8) -> Result<&[String], MatrixError> {
        self.output(output_id)?;
        Ok(&self.inputs)
    }

    /// Availability follows the latest polled power state
    pub fn is_available(&self) -> bool {
        self.store.current().power
    }

    /// Name of the input driving `output_id`, if known
    pub fn current_source(&self, output_id: u8) -> Option<String> {
        self.source_from(&self.store.current(), output_id)
    }

    fn source_from(&self, state: &MatrixState, output_id: u8) -> Option<String> {
        if !state.power {
            return None;
        }

        if let Some(name) = self.pending_route(output_id, state.poll_seq) {
            return Some(name);
        }

        state
            .source_of(output_id, self.inputs.len())
            .map(|input_id| self.inputs[usize::from(input_id) - 1].clone())
    }

    /// A pending route holds until a poll started after it is published
    fn pending_route(&self, output_id: u8, poll_seq: u64) -> Option<String> {
        let pending = self.pending.lock().ok()?;
        pending
            .get(&output_id)
            .filter(|route| poll_seq <= route.after_poll)
            .map(|route| route.input_name.clone())
    }

    fn record_pending(&self, output_id: u8, input_name: &str) {
        let after_poll = self.store.polls_started();
        let poll_seq = self.store.current().poll_seq;
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|_, route| poll_seq <= route.after_poll);
            pending.insert(
                output_id,
                PendingRoute {
                    input_name: input_name.to_string(),
                    after_poll,
                },
            );
        }
    }

    /// Route the input called `input_name` to `output_id`.
    ///
    /// Always sends the command, even if the input is already routed there.
    pub async fn select_source(&self, output_id: u8, input_name: &str) -> Result<(), MatrixError> {
        let output = self.output(output_id)?;

        if !self.is_available() {
            warn!("Matrix is off; cannot change input for {}", output.name);
            return Err(MatrixError::DeviceUnavailable);
        }

        let Some(index) = self.inputs.iter().position(|name| name == input_name) else {
            warn!("Unknown input {} for {}", input_name, output.name);
            return Err(MatrixError::UnknownInput {
                output: output_id,
                input: input_name.to_string(),
            });
        };
        // inputs is capped at u8::MAX entries
        let input_id = (index + 1) as u8;

        info!(
            "Setting output {} to input {} ({})",
            output_id, input_id, input_name
        );

        if let Err(e) = self.client.set_output_source(input_id, output_id).await {
            error!(
                "Failed to route input {} to output {}: {}",
                input_id, output_id, e
            );
            return Err(MatrixError::CommandFailed(e));
        }

        self.record_pending(output_id, input_name);
        self.store.request_refresh().await;

        Ok(())
    }

    /// Views of every output, all taken from one store snapshot
    pub fn output_views(&self) -> Vec<OutputView> {
        let state = self.store.current();
        self.outputs
            .iter()
            .map(|output| OutputView {
                id: output.id,
                name: output.name.clone(),
                options: self.inputs.clone(),
                current_source: self.source_from(&state, output.id),
                available: state.power,
            })
            .collect()
    }
}
