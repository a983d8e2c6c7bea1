mod controller;
mod device;
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod error;
mod message;
mod naming;
pub mod state;
mod store;

pub use controller::Output;
pub use controller::OutputView;
pub use controller::RoutingController;
pub use device::DOMAIN;
pub use device::DeviceIdentity;
pub use device::DeviceInfo;
pub use engine::Engine;
pub use entity::EntityDescriptor;
pub use entity::Platform;
pub use error::MatrixError;
pub use message::ConfigSnapshot;
pub use message::EngineMessage;
pub use message::EngineSender;
pub use naming::NamingRegistry;
pub use naming::validate_name;
pub use state::MatrixState;
pub use store::MatrixStateStore;
