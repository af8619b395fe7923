pub mod config;
pub mod error;
pub mod model;
pub mod security;
pub mod store;

pub use config::{ConfigManager, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig, Settings};
pub use error::*;
pub use model::*;
pub use security::{PasswordManager, SecurityError, SecurityEvent, SecurityLogger};
pub use store::{wait_for_configured_store, wait_for_store, Store};
