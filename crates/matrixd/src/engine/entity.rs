//! Entity descriptors for the matrix
//!
//! These describe what a home-automation host would register for one matrix:
//! one select per output and one text per configured input/output name.

use serde::Serialize;

use super::device::DeviceIdentity;
use super::message::ConfigSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Select,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDescriptor {
    pub unique_id: String,
    pub name: String,
    pub platform: Platform,
    pub icon: &'static str,
}

/// All entities for `snapshot`, in registration order.
///
/// Name texts exist only for names present in the configuration; placeholder
/// inputs and outputs get none.
pub fn describe(identity: &DeviceIdentity, snapshot: &ConfigSnapshot) -> Vec<EntityDescriptor> {
    let matrix = &snapshot.matrix;
    let mut entities = Vec::new();

    for (id, zone) in (1..=u8::MAX).zip(matrix.output_names()) {
        entities.push(EntityDescriptor {
            unique_id: identity.output_select_id(id),
            name: format!("{} Input", zone),
            platform: Platform::Select,
            icon: "mdi:hdmi-port",
        });
    }

    for (id, _) in (1..=u8::MAX).zip(&matrix.sources) {
        entities.push(EntityDescriptor {
            unique_id: identity.input_name_id(id),
            name: format!("Input {} Name", id),
            platform: Platform::Text,
            icon: "mdi:video-input-hdmi",
        });
    }

    for (id, _) in (1..=u8::MAX).zip(&matrix.zones) {
        entities.push(EntityDescriptor {
            unique_id: identity.output_name_id(id),
            name: format!("Output {} Name", id),
            platform: Platform::Text,
            icon: "mdi:television",
        });
    }

    entities
}
