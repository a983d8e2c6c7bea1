use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// Authoritative snapshot of the matrix as last reported by the device.
///
/// Never mutated once published; a poll builds a new one and the store
/// swaps it in whole.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixState {
    /// Whether the matrix is powered on (not in standby).
    pub power: bool,

    /// Model reported by the device, e.g. "HDP-MXB88". Empty if unknown.
    #[serde(rename = "type")]
    pub model_name: String,

    /// Output id -> input id currently driving it (both 1-based).
    #[serde(rename = "outputs")]
    pub routing: BTreeMap<u8, u8>,

    /// Assigned by the store; increments on every successful poll.
    #[serde(skip)]
    pub generation: u64,

    /// Assigned by the store; sequence number of the poll that produced this
    /// state, counted when the poll started.
    #[serde(skip)]
    pub poll_seq: u64,
}

impl MatrixState {
    /// Input routed to `output_id`, if it is within `1..=input_count`
    pub fn source_of(&self, output_id: u8, input_count: usize) -> Option<u8> {
        self.routing
            .get(&output_id)
            .copied()
            .filter(|&input| input >= 1 && usize::from(input) <= input_count)
    }
}
