//! Configuration management.

mod store;
mod xdg;

pub use store::{keys, ConfigError, ConfigStore, PersistedConfig, ServiceType};
pub use xdg::XdgDirs;
