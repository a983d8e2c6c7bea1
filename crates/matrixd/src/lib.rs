pub mod api;
pub mod client;
pub mod config;
pub mod engine;

pub use config::Config;
pub use config::LogLevel;
pub use engine::Engine;
pub use engine::MatrixError;
pub use engine::MatrixState;
