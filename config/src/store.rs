//! The settings store consumed by the resolver.
//!
//! The host editor hands the bridge a bag of loosely-typed values scoped to
//! the `pascal` namespace. [`SettingsStore`] models that surface: JSON
//! values keyed by setting name, read through get-with-default accessors.
//! When the bridge runs headless it loads the same keys from a `[pascal]`
//! table in `~/.pasbridge/config.toml`.

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Settings namespace owned by the bridge.
pub const NAMESPACE: &str = "pascal";

/// Setting keys within [`NAMESPACE`].
pub mod keys {
    pub const SERVER_PATH: &str = "serverPath";
    pub const SEARCH_FOLDERS: &str = "searchFolders";
    pub const UNIT_SCOPE_NAMES: &str = "unitScopeNames";
    pub const PREFETCH_UNITS: &str = "prefetchUnits";
    pub const CONNECTION_MODE: &str = "connectionMode";
    pub const TCP_HOST: &str = "tcpHost";
    pub const TCP_PORT: &str = "tcpPort";
}

/// Whether a configuration-change notification for `section` touches this
/// bridge's settings. Changes to other namespaces are ignored without a
/// re-read.
#[must_use]
pub fn affects_bridge(section: &str) -> bool {
    section == NAMESPACE || section.starts_with(&format!("{NAMESPACE}."))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Duck-typed settings scoped to the bridge namespace.
///
/// Absent keys and type mismatches resolve to the caller-supplied default,
/// matching the host editor's get-with-default semantics. The one
/// deliberate exception is [`SettingsStore::get_bool_coerced`], which
/// applies truthiness coercion instead (see the resolver).
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    values: serde_json::Map<String, Value>,
}

impl SettingsStore {
    /// Build a store from an in-memory JSON object (the namespace section
    /// as the host editor delivers it). Non-object values yield an empty
    /// store.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            other => {
                tracing::warn!("Settings section is not an object (got {other}); using defaults");
                Self::default()
            }
        }
    }

    /// Load the `[pascal]` table from the default config file.
    ///
    /// A missing file is not an error: it resolves to an empty store and
    /// the defaults table applies.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the `[pascal]` table from `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|err| {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            }
        })?;

        let document: toml::Value = toml::from_str(&content).map_err(|err| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })?;

        let section = document
            .get(NAMESPACE)
            .map(toml_to_json)
            .unwrap_or(Value::Null);
        match section {
            Value::Null => Ok(Self::default()),
            other => Ok(Self::from_json(other)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The namespace section as a JSON object, e.g. for a
    /// `didChangeConfiguration` push.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// String setting with a default. Non-string values fall back to the
    /// default, they are not stringified.
    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    /// String-sequence setting, default empty. Non-string elements are
    /// skipped.
    #[must_use]
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Port-sized integer setting with a default. Out-of-range and
    /// non-numeric values fall back to the default.
    #[must_use]
    pub fn get_u16(&self, key: &str, default: u16) -> u16 {
        self.values
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u16::try_from(n).ok())
            .unwrap_or(default)
    }

    /// Boolean setting accepted from either a JSON-native boolean or a
    /// legacy string form.
    ///
    /// Strings compare case-insensitively to `"true"`; any other value
    /// coerces to its truthiness. The dual path exists because the settings
    /// store may deliver either representation and both must resolve
    /// identically.
    #[must_use]
    pub fn get_bool_coerced(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(value) => truthy(value),
            None => false,
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Number((*i).into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Array(arr) => Value::Array(arr.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let mut map = serde_json::Map::new();
            for (k, v) in table {
                map.insert(k.clone(), toml_to_json(v));
            }
            Value::Object(map)
        }
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
    }
}

/// Default config file location: `~/.pasbridge/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pasbridge").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::{SettingsStore, affects_bridge, keys};
    use serde_json::json;
    use std::io::Write;

    fn store(value: serde_json::Value) -> SettingsStore {
        SettingsStore::from_json(value)
    }

    #[test]
    fn from_json_rejects_non_objects() {
        let s = store(json!("not an object"));
        assert_eq!(s.get_string(keys::SERVER_PATH, "fallback"), "fallback");
    }

    #[test]
    fn get_string_returns_default_for_absent_key() {
        let s = store(json!({}));
        assert_eq!(s.get_string(keys::TCP_HOST, "localhost"), "localhost");
    }

    #[test]
    fn get_string_returns_default_for_type_mismatch() {
        let s = store(json!({ "tcpHost": 42 }));
        assert_eq!(s.get_string(keys::TCP_HOST, "localhost"), "localhost");
    }

    #[test]
    fn get_string_list_skips_non_strings() {
        let s = store(json!({ "searchFolders": ["/a", 7, "/b", null] }));
        assert_eq!(s.get_string_list(keys::SEARCH_FOLDERS), ["/a", "/b"]);
    }

    #[test]
    fn get_u16_falls_back_on_out_of_range() {
        let s = store(json!({ "tcpPort": 123456 }));
        assert_eq!(s.get_u16(keys::TCP_PORT, 8080), 8080);
    }

    #[test]
    fn get_u16_reads_in_range_port() {
        let s = store(json!({ "tcpPort": 9001 }));
        assert_eq!(s.get_u16(keys::TCP_PORT, 8080), 9001);
    }

    #[test]
    fn bool_coercion_string_true_any_case() {
        for raw in ["true", "TRUE", "True"] {
            let s = store(json!({ "prefetchUnits": raw }));
            assert!(s.get_bool_coerced(keys::PREFETCH_UNITS), "{raw}");
        }
    }

    #[test]
    fn bool_coercion_string_false_and_other_strings() {
        let s = store(json!({ "prefetchUnits": "false" }));
        assert!(!s.get_bool_coerced(keys::PREFETCH_UNITS));
        // A non-"true" string is false even though it would be truthy in
        // the generic path: the string comparison wins for strings.
        let s = store(json!({ "prefetchUnits": "yes" }));
        assert!(!s.get_bool_coerced(keys::PREFETCH_UNITS));
    }

    #[test]
    fn bool_coercion_native_booleans() {
        let s = store(json!({ "prefetchUnits": true }));
        assert!(s.get_bool_coerced(keys::PREFETCH_UNITS));
        let s = store(json!({ "prefetchUnits": false }));
        assert!(!s.get_bool_coerced(keys::PREFETCH_UNITS));
    }

    #[test]
    fn bool_coercion_truthiness_for_other_types() {
        let s = store(json!({ "prefetchUnits": 0 }));
        assert!(!s.get_bool_coerced(keys::PREFETCH_UNITS));
        let s = store(json!({ "prefetchUnits": 1 }));
        assert!(s.get_bool_coerced(keys::PREFETCH_UNITS));
        let s = store(json!({}));
        assert!(!s.get_bool_coerced(keys::PREFETCH_UNITS));
    }

    #[test]
    fn affects_bridge_matches_namespace_and_keys() {
        assert!(affects_bridge("pascal"));
        assert!(affects_bridge("pascal.serverPath"));
        assert!(!affects_bridge("pascals"));
        assert!(!affects_bridge("editor"));
    }

    #[test]
    fn load_from_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let s = SettingsStore::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(s.get_string(keys::SERVER_PATH, ""), "");
    }

    #[test]
    fn load_from_reads_namespace_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[pascal]\nserverPath = \"/opt/pasls\"\ntcpPort = 9001\nsearchFolders = [\"/src\"]"
        )
        .unwrap();

        let s = SettingsStore::load_from(&path).unwrap();
        assert_eq!(s.get_string(keys::SERVER_PATH, ""), "/opt/pasls");
        assert_eq!(s.get_u16(keys::TCP_PORT, 8080), 9001);
        assert_eq!(s.get_string_list(keys::SEARCH_FOLDERS), ["/src"]);
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pascal\nserverPath = ").unwrap();
        assert!(SettingsStore::load_from(&path).is_err());
    }
}
