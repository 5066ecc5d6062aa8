//! Core domain types for the Pascal language-server bridge - no IO, no async.

pub mod error;
pub mod history;
pub mod settings;

pub use error::ActivationError;
pub use history::QueryHistory;
pub use settings::{
    ChannelLog, ConnectionMode, InitOptions, LogChannel, LogSettings, ServerSettings,
};
