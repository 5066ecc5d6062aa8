//! Settings store and configuration resolution for the Pascal bridge.

pub mod resolver;
pub mod store;

pub use resolver::resolve;
pub use store::{ConfigError, NAMESPACE, SettingsStore, affects_bridge, config_path, keys};
