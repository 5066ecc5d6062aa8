//! Activation lifecycle, commands, and persistent state for the Pascal
//! bridge.

pub mod storage;
pub mod watch;

mod bridge;

pub use bridge::Bridge;
pub use storage::{BridgeState, state_path};
pub use watch::{DOCUMENT_LANGUAGES, SourceWatch, WATCH_GLOBS};
