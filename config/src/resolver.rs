//! Configuration Resolver: settings store -> [`ServerSettings`].
//!
//! One synchronous pass over the namespace, one typed default per key.
//! The only validation is the non-blank server path; everything else is
//! accepted as-is and handed to the launch layer untouched.

use pasbridge_types::{
    ActivationError, ChannelLog, ConnectionMode, LogChannel, LogSettings, ServerSettings,
};

use crate::store::{SettingsStore, keys};

const DEFAULT_TCP_HOST: &str = "localhost";
const DEFAULT_TCP_PORT: u16 = 8080;

/// Resolve the full settings namespace into an immutable [`ServerSettings`].
///
/// Invoked once per activation and once per relevant configuration-change
/// notification; partial re-reads do not exist.
pub fn resolve(store: &SettingsStore) -> Result<ServerSettings, ActivationError> {
    let server_path = store.get_string(keys::SERVER_PATH, "");
    let search_folders = store.get_string_list(keys::SEARCH_FOLDERS);
    let unit_scope_names = store.get_string_list(keys::UNIT_SCOPE_NAMES);
    let prefetch_units = store.get_bool_coerced(keys::PREFETCH_UNITS);
    let connection_mode = resolve_connection_mode(store);
    let tcp_host = store.get_string(keys::TCP_HOST, DEFAULT_TCP_HOST);
    let tcp_port = store.get_u16(keys::TCP_PORT, DEFAULT_TCP_PORT);

    let mut log = LogSettings::default();
    for channel in LogChannel::ALL {
        log.set(
            channel,
            ChannelLog {
                level: store.get_string(channel.level_key(), ""),
                file: store.get_string(channel.file_key(), ""),
            },
        );
    }

    ServerSettings::new(
        server_path,
        search_folders,
        unit_scope_names,
        prefetch_units,
        connection_mode,
        tcp_host,
        tcp_port,
        log,
    )
}

fn resolve_connection_mode(store: &SettingsStore) -> ConnectionMode {
    let raw = store.get_string(keys::CONNECTION_MODE, ConnectionMode::Stdio.as_str());
    ConnectionMode::parse(&raw).unwrap_or_else(|| {
        tracing::warn!("Unknown connectionMode {raw:?}; falling back to stdio");
        ConnectionMode::default()
    })
}

#[cfg(test)]
mod tests {
    use super::resolve;
    use crate::store::SettingsStore;
    use pasbridge_types::{ActivationError, ConnectionMode, LogChannel, ServerSettings};
    use serde_json::json;

    fn resolve_json(value: serde_json::Value) -> Result<ServerSettings, ActivationError> {
        resolve(&SettingsStore::from_json(value))
    }

    #[test]
    fn missing_server_path_fails_resolution() {
        assert!(matches!(
            resolve_json(json!({})),
            Err(ActivationError::MissingServerPath)
        ));
    }

    #[test]
    fn whitespace_server_path_fails_resolution() {
        assert!(matches!(
            resolve_json(json!({ "serverPath": "  " })),
            Err(ActivationError::MissingServerPath)
        ));
    }

    #[test]
    fn defaults_apply_when_only_server_path_is_set() {
        let settings = resolve_json(json!({ "serverPath": "pasls" })).unwrap();
        assert!(settings.search_folders().is_empty());
        assert!(settings.unit_scope_names().is_empty());
        assert!(!settings.prefetch_units());
        assert_eq!(settings.connection_mode(), ConnectionMode::Stdio);
        assert_eq!(settings.tcp_host(), "localhost");
        assert_eq!(settings.tcp_port(), 8080);
        for channel in LogChannel::ALL {
            assert_eq!(settings.log().channel(channel).level, "");
            assert_eq!(settings.log().channel(channel).file, "");
        }
    }

    #[test]
    fn full_namespace_resolves() {
        let settings = resolve_json(json!({
            "serverPath": "/opt/pasls",
            "searchFolders": ["/src", "/lib"],
            "unitScopeNames": ["System", "SysUtils"],
            "prefetchUnits": "True",
            "connectionMode": "tcp",
            "tcpHost": "10.0.0.5",
            "tcpPort": 9001,
            "logLevelMain": "info",
            "logFileMain": "/tmp/main.log",
            "logLevelStructure": "none"
        }))
        .unwrap();

        assert_eq!(settings.server_path(), "/opt/pasls");
        assert_eq!(settings.search_folders(), ["/src", "/lib"]);
        assert_eq!(settings.unit_scope_names(), ["System", "SysUtils"]);
        assert!(settings.prefetch_units());
        assert_eq!(settings.connection_mode(), ConnectionMode::Tcp);
        assert_eq!(settings.tcp_host(), "10.0.0.5");
        assert_eq!(settings.tcp_port(), 9001);
        assert_eq!(settings.log().channel(LogChannel::Main).level, "info");
        assert_eq!(settings.log().channel(LogChannel::Main).file, "/tmp/main.log");
        assert_eq!(settings.log().channel(LogChannel::Structure).level, "none");
    }

    #[test]
    fn unknown_connection_mode_falls_back_to_stdio() {
        let settings = resolve_json(json!({
            "serverPath": "pasls",
            "connectionMode": "ipc"
        }))
        .unwrap();
        assert_eq!(settings.connection_mode(), ConnectionMode::Stdio);
    }

    #[test]
    fn resolution_is_deterministic() {
        let store = SettingsStore::from_json(json!({
            "serverPath": "pasls",
            "logLevelAntlrError": "warn"
        }));
        assert_eq!(resolve(&store).unwrap(), resolve(&store).unwrap());
    }
}
