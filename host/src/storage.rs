//! Persistent bridge state.
//!
//! One small JSON file under `~/.pasbridge`, written with the temp-file +
//! rename pattern so a crash mid-write never leaves a torn state file.
//! Loading is lenient: a missing or unreadable file degrades to the
//! default state with a logged warning, never an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pasbridge_types::QueryHistory;

/// State that survives across activations.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeState {
    #[serde(default)]
    pub query_history: QueryHistory,
}

/// Default state file location: `~/.pasbridge/state.json`.
#[must_use]
pub fn state_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pasbridge").join("state.json"))
}

/// Load state from `path`, falling back to the default on any failure.
#[must_use]
pub fn load(path: &Path) -> BridgeState {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BridgeState::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read bridge state: {e}");
            return BridgeState::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Bridge state is corrupt, starting fresh: {e}");
            BridgeState::default()
        }
    }
}

/// Write state to `path` atomically.
pub fn save(path: &Path, state: &BridgeState) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let bytes = serde_json::to_vec_pretty(state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::Write::write_all(&mut tmp, &bytes)?;

    match tmp.persist(path) {
        Ok(_) => Ok(()),
        Err(err) => {
            // Rename-over-existing fails on Windows; replace explicitly.
            let _ = std::fs::remove_file(path);
            err.file.persist(path).map(|_| ()).map_err(|e| e.error)
        }
    }
}
