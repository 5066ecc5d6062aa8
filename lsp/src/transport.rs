//! Opening the selected transport.
//!
//! A [`TransportDescriptor`] is only a description; [`ServerIo::open`]
//! turns it into a live byte stream. For stdio that means spawning the
//! server executable; for TCP it means connecting to a server someone else
//! started. A failed connection is final: the bridge never retries and
//! never falls back to spawning a process in TCP mode.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::launch::TransportDescriptor;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to launch analysis server {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to analysis server at {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// An open duplex connection to the analysis server.
///
/// For a spawned server the child handle rides along so the client can
/// reap it at shutdown; the process dies with the handle regardless
/// (`kill_on_drop`).
pub struct ServerIo {
    pub(crate) reader: BoxedReader,
    pub(crate) writer: BoxedWriter,
    pub(crate) child: Option<Child>,
}

impl ServerIo {
    /// Open the transport the descriptor names.
    pub async fn open(descriptor: &TransportDescriptor) -> Result<Self, TransportError> {
        match descriptor {
            TransportDescriptor::Stdio { command, args } => Self::spawn(command, args),
            TransportDescriptor::Socket { host, port } => Self::connect(host, *port).await,
        }
    }

    /// Whether this connection owns a spawned server process.
    #[must_use]
    pub fn has_child(&self) -> bool {
        self.child.is_some()
    }

    fn spawn(command: &str, args: &[String]) -> Result<Self, TransportError> {
        let spawn_err = |source: std::io::Error| TransportError::Spawn {
            command: command.to_string(),
            source,
        };

        let resolved = which::which(command)
            .map_err(|e| spawn_err(std::io::Error::new(std::io::ErrorKind::NotFound, e)))?;

        let mut child = Command::new(&resolved)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        tracing::info!(
            command = %resolved.display(),
            args = ?args,
            "Launched analysis server"
        );

        let stdout = child.stdout.take().ok_or_else(|| {
            spawn_err(std::io::Error::other("spawned server has no stdout pipe"))
        })?;
        let stdin = child.stdin.take().ok_or_else(|| {
            spawn_err(std::io::Error::other("spawned server has no stdin pipe"))
        })?;

        Ok(Self {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }

    async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        match TcpStream::connect((host, port)).await {
            Ok(stream) => {
                tracing::info!("Connected to analysis server at {host}:{port}");
                let (read_half, write_half) = stream.into_split();
                Ok(Self {
                    reader: Box::new(read_half),
                    writer: Box::new(write_half),
                    child: None,
                })
            }
            Err(e) => {
                // No retry and no fallback spawn: in TCP mode the server's
                // lifecycle belongs to whoever started it.
                tracing::warn!("Socket connection to {host}:{port} failed: {e}");
                Err(TransportError::Connect {
                    host: host.to_string(),
                    port,
                    source: e,
                })
            }
        }
    }
}
