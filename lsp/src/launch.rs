//! Argument assembly and transport selection.
//!
//! The two pure steps between resolved settings and an open connection:
//! [`log_args`] turns the per-channel log settings into command-line flags,
//! and [`select_transport`] decides how the server is reached. Neither
//! performs I/O; opening the transport is `transport::ServerIo`'s job.

use pasbridge_types::{ConnectionMode, LogChannel, ServerSettings};

/// Level value that suppresses the flag, same as an empty level.
const LEVEL_NONE: &str = "none";

/// Build the server's logging flags from the resolved settings.
///
/// Pure function of the log-channel pairs; ignores the connection mode.
/// Channels are visited in [`LogChannel::ALL`] order, so repeated calls
/// over the same settings produce byte-identical argument lists. A
/// channel's level and file flags are independent: either may be present
/// without the other.
///
/// Values are passed through verbatim. Quoting is the process-launch
/// boundary's concern, not ours.
#[must_use]
pub fn log_args(settings: &ServerSettings) -> Vec<String> {
    let mut args = Vec::new();
    for channel in LogChannel::ALL {
        let log = settings.log().channel(channel);
        if !log.level.is_empty() && log.level != LEVEL_NONE {
            args.push(format!("-log-level-{}={}", channel.flag_name(), log.level));
        }
        if !log.file.is_empty() {
            args.push(format!("-log-file-{}={}", channel.flag_name(), log.file));
        }
    }
    args
}

/// How the protocol client reaches the analysis server.
///
/// Selection only describes the transport; no process is spawned and no
/// socket is opened here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportDescriptor {
    /// Launch the server executable and talk over its standard streams.
    /// The same argument list serves both the run and debug launch
    /// variants; no static debug flag is appended.
    Stdio { command: String, args: Vec<String> },
    /// Connect to a server that is already listening.
    Socket { host: String, port: u16 },
}

impl std::fmt::Display for TransportDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio { command, args } => {
                write!(f, "stdio: {command}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Self::Socket { host, port } => write!(f, "tcp: {host}:{port}"),
        }
    }
}

/// Select the transport for the given settings.
///
/// `args` is the flag list from [`log_args`]; it is only meaningful for
/// the stdio variant (a TCP server was started by someone else, with its
/// own flags).
#[must_use]
pub fn select_transport(settings: &ServerSettings, args: Vec<String>) -> TransportDescriptor {
    match settings.connection_mode() {
        ConnectionMode::Tcp => TransportDescriptor::Socket {
            host: settings.tcp_host().to_string(),
            port: settings.tcp_port(),
        },
        ConnectionMode::Stdio => TransportDescriptor::Stdio {
            command: settings.server_path().to_string(),
            args,
        },
    }
}
