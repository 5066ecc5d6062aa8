//! Resolved server settings shared across crates.
//!
//! These types represent fully-resolved, validated configuration state.
//! The raw settings store (duck-typed JSON values with per-key defaults)
//! stays in `pasbridge-config`; the resolver constructs these types at the
//! read boundary and they are immutable afterwards. A configuration-change
//! event produces a fresh `ServerSettings`, never a partial mutation.

use serde::Serialize;

use crate::error::ActivationError;

/// How the bridge reaches the external analysis server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Spawn the server executable and speak over its stdin/stdout.
    #[default]
    Stdio,
    /// Connect to an already-running server over TCP.
    Tcp,
}

impl ConnectionMode {
    /// Parse a settings-store value. Returns `None` for unrecognized
    /// strings; the resolver decides the fallback (default + warning).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Tcp => "tcp",
        }
    }
}

/// Log channels of the external server, in the order their flags are
/// emitted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannel {
    Main,
    AntlrError,
    AntlrTrace,
    Structure,
}

impl LogChannel {
    /// Flag-emission order. The argument builder iterates this and nothing
    /// else, so the produced argument list is stable across calls.
    pub const ALL: [LogChannel; 4] = [
        Self::Main,
        Self::AntlrError,
        Self::AntlrTrace,
        Self::Structure,
    ];

    /// The channel name as it appears in `-log-level-<name>` /
    /// `-log-file-<name>` flags.
    #[must_use]
    pub const fn flag_name(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::AntlrError => "antlr-error",
            Self::AntlrTrace => "antlr-trace",
            Self::Structure => "structure",
        }
    }

    /// Settings-store key for this channel's log level.
    #[must_use]
    pub const fn level_key(self) -> &'static str {
        match self {
            Self::Main => "logLevelMain",
            Self::AntlrError => "logLevelAntlrError",
            Self::AntlrTrace => "logLevelAntlrTrace",
            Self::Structure => "logLevelStructure",
        }
    }

    /// Settings-store key for this channel's log file.
    #[must_use]
    pub const fn file_key(self) -> &'static str {
        match self {
            Self::Main => "logFileMain",
            Self::AntlrError => "logFileAntlrError",
            Self::AntlrTrace => "logFileAntlrTrace",
            Self::Structure => "logFileStructure",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::AntlrError => 1,
            Self::AntlrTrace => 2,
            Self::Structure => 3,
        }
    }
}

/// Level/file pair for one log channel. Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelLog {
    pub level: String,
    pub file: String,
}

/// Per-channel log settings, indexed by [`LogChannel`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    channels: [ChannelLog; 4],
}

impl LogSettings {
    #[must_use]
    pub fn channel(&self, channel: LogChannel) -> &ChannelLog {
        &self.channels[channel.index()]
    }

    pub fn set(&mut self, channel: LogChannel, log: ChannelLog) {
        self.channels[channel.index()] = log;
    }
}

/// Initialization payload handed to the external server, mirroring the
/// field names its own configuration layer expects.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InitOptions {
    #[serde(rename = "SearchFolders")]
    pub search_folders: Vec<String>,
    #[serde(rename = "unitScopeNames")]
    pub unit_scope_names: Vec<String>,
    #[serde(rename = "prefetchUnits")]
    pub prefetch_units: bool,
}

/// Fully-resolved bridge settings.
///
/// Invariant: `server_path` is non-blank (enforced by [`ServerSettings::new`],
/// the single construction path). Everything else carries a typed default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    server_path: String,
    search_folders: Vec<String>,
    unit_scope_names: Vec<String>,
    prefetch_units: bool,
    connection_mode: ConnectionMode,
    tcp_host: String,
    tcp_port: u16,
    log: LogSettings,
}

impl ServerSettings {
    /// Construct validated settings.
    ///
    /// Fails with [`ActivationError::MissingServerPath`] when `server_path`
    /// is empty after trimming. No other field is validated here: port
    /// ranges, path existence and folder existence are the server's
    /// problem, not the bridge's.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server_path: String,
        search_folders: Vec<String>,
        unit_scope_names: Vec<String>,
        prefetch_units: bool,
        connection_mode: ConnectionMode,
        tcp_host: String,
        tcp_port: u16,
        log: LogSettings,
    ) -> Result<Self, ActivationError> {
        if server_path.trim().is_empty() {
            return Err(ActivationError::MissingServerPath);
        }
        Ok(Self {
            server_path,
            search_folders,
            unit_scope_names,
            prefetch_units,
            connection_mode,
            tcp_host,
            tcp_port,
            log,
        })
    }

    #[must_use]
    pub fn server_path(&self) -> &str {
        &self.server_path
    }

    #[must_use]
    pub fn search_folders(&self) -> &[String] {
        &self.search_folders
    }

    #[must_use]
    pub fn unit_scope_names(&self) -> &[String] {
        &self.unit_scope_names
    }

    #[must_use]
    pub fn prefetch_units(&self) -> bool {
        self.prefetch_units
    }

    #[must_use]
    pub fn connection_mode(&self) -> ConnectionMode {
        self.connection_mode
    }

    #[must_use]
    pub fn tcp_host(&self) -> &str {
        &self.tcp_host
    }

    #[must_use]
    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    #[must_use]
    pub fn log(&self) -> &LogSettings {
        &self.log
    }

    /// The `initializationOptions` payload for the initialize handshake.
    #[must_use]
    pub fn init_options(&self) -> InitOptions {
        InitOptions {
            search_folders: self.search_folders.clone(),
            unit_scope_names: self.unit_scope_names.clone(),
            prefetch_units: self.prefetch_units,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(server_path: &str) -> Result<ServerSettings, ActivationError> {
        ServerSettings::new(
            server_path.to_string(),
            Vec::new(),
            Vec::new(),
            false,
            ConnectionMode::default(),
            "localhost".to_string(),
            8080,
            LogSettings::default(),
        )
    }

    #[test]
    fn new_rejects_empty_server_path() {
        assert!(matches!(
            minimal(""),
            Err(ActivationError::MissingServerPath)
        ));
    }

    #[test]
    fn new_rejects_whitespace_server_path() {
        assert!(matches!(
            minimal("   \t"),
            Err(ActivationError::MissingServerPath)
        ));
    }

    #[test]
    fn new_accepts_non_blank_server_path() {
        let settings = minimal("/usr/local/bin/pasls").unwrap();
        assert_eq!(settings.server_path(), "/usr/local/bin/pasls");
        assert_eq!(settings.connection_mode(), ConnectionMode::Stdio);
        assert_eq!(settings.tcp_host(), "localhost");
        assert_eq!(settings.tcp_port(), 8080);
    }

    #[test]
    fn connection_mode_parse_known_values() {
        assert_eq!(ConnectionMode::parse("stdio"), Some(ConnectionMode::Stdio));
        assert_eq!(ConnectionMode::parse("tcp"), Some(ConnectionMode::Tcp));
        assert_eq!(ConnectionMode::parse(" TCP "), Some(ConnectionMode::Tcp));
    }

    #[test]
    fn connection_mode_parse_unknown_returns_none() {
        assert_eq!(ConnectionMode::parse("ipc"), None);
        assert_eq!(ConnectionMode::parse(""), None);
    }

    #[test]
    fn channel_order_is_fixed() {
        let names: Vec<&str> = LogChannel::ALL.iter().map(|c| c.flag_name()).collect();
        assert_eq!(names, ["main", "antlr-error", "antlr-trace", "structure"]);
    }

    #[test]
    fn log_settings_roundtrip_per_channel() {
        let mut log = LogSettings::default();
        log.set(
            LogChannel::AntlrTrace,
            ChannelLog {
                level: "debug".to_string(),
                file: "/tmp/trace.log".to_string(),
            },
        );
        assert_eq!(log.channel(LogChannel::AntlrTrace).level, "debug");
        assert_eq!(log.channel(LogChannel::Main), &ChannelLog::default());
    }

    #[test]
    fn init_options_serialize_with_server_side_names() {
        let settings = ServerSettings::new(
            "pasls".to_string(),
            vec!["/src/units".to_string()],
            vec!["System".to_string()],
            true,
            ConnectionMode::Stdio,
            "localhost".to_string(),
            8080,
            LogSettings::default(),
        )
        .unwrap();

        let json = serde_json::to_value(settings.init_options()).unwrap();
        assert_eq!(json["SearchFolders"][0], "/src/units");
        assert_eq!(json["unitScopeNames"][0], "System");
        assert_eq!(json["prefetchUnits"], true);
    }
}
