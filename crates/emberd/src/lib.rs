pub mod api;
pub mod config;
mod engine;
pub mod integrations;
pub mod poll;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::DeviceInfo;
pub use engine::Engine;
pub use engine::EngineError;
pub use engine::Entity;
pub use engine::EntityState;
pub use engine::FromIntegrationMessage;
pub use engine::FromIntegrationSender;
pub use engine::Integration;
pub use engine::IntegrationContext;
pub use engine::State;
pub use engine::ToIntegrationMessage;
