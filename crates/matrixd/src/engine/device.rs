use serde::Serialize;

use super::state::MatrixState;
use crate::config::MatrixConfig;

/// Domain prefix for every unique identifier this daemon exposes
pub const DOMAIN: &str = "orei_matrix";

pub const MANUFACTURER: &str = "Orei";

/// Which matrix a set of entities belongs to.
///
/// `host` keys the unique identifiers, so they stay stable across restarts
/// for the same host and port id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub host: String,
    pub entry_id: String,
}

impl DeviceIdentity {
    pub fn new(host: impl Into<String>, entry_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            entry_id: entry_id.into(),
        }
    }

    pub fn from_config(config: &MatrixConfig) -> Self {
        let entry_id = config.entry_id.clone().unwrap_or_else(|| config.host.clone());
        Self::new(config.host.clone(), entry_id)
    }

    pub fn output_select_id(&self, output_id: u8) -> String {
        format!("{}_{}_output_{}_select", DOMAIN, self.host, output_id)
    }

    pub fn input_name_id(&self, input_id: u8) -> String {
        format!("{}_{}_input_{}_name", DOMAIN, self.host, input_id)
    }

    pub fn output_name_id(&self, output_id: u8) -> String {
        format!("{}_{}_output_{}_name", DOMAIN, self.host, output_id)
    }
}

/// Grouping information shared by all entities of one matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub configuration_url: String,
}

impl DeviceInfo {
    pub fn new(identity: &DeviceIdentity, state: &MatrixState) -> Self {
        let model = if state.model_name.is_empty() {
            "Unknown".to_string()
        } else {
            state.model_name.clone()
        };

        let name = if model == "Unknown" {
            format!("{} HDMI Matrix", MANUFACTURER)
        } else {
            format!("{} {}", MANUFACTURER, model)
        };

        Self {
            identifiers: vec![(DOMAIN.to_string(), identity.entry_id.clone())],
            name,
            manufacturer: MANUFACTURER.to_string(),
            model,
            configuration_url: format!("http://{}", identity.host),
        }
    }
}
