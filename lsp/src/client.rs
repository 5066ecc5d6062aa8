//! Client handle - owns the server connection and the protocol lifecycle.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, oneshot};

use pasbridge_types::InitOptions;

use crate::codec::{MessageReader, MessageWriter};
use crate::protocol::{self, FileChange, Notification, Request};
use crate::transport::ServerIo;

const REQUEST_TIMEOUT_SECS: u64 = 30;

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Language id reported for synchronized documents.
const LANGUAGE_ID: &str = "pascal";

enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

enum Incoming {
    Response {
        id: u64,
        body: serde_json::Value,
    },
    ServerRequest {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<serde_json::Value>,
    },
}

fn classify(frame: &serde_json::Value) -> Option<Incoming> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(|m| m.as_str())
        .map(String::from);
    let has_outcome = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_outcome) {
        (Some(id_val), None, true) => Some(Incoming::Response {
            id: id_val.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id_val), Some(method), _) => Some(Incoming::ServerRequest {
            id: id_val.clone(),
            method,
        }),
        (None, Some(method), _) => Some(Incoming::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// Handle to a running analysis-server session.
///
/// Holding a `BridgeClient` is proof that the transport opened and the
/// initialize handshake completed. The handle is the only owner of the
/// connection; dropping it tears the session down (a spawned child has
/// `kill_on_drop`).
pub struct BridgeClient {
    child: Option<Child>,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: u64,
    pending: PendingMap,
    /// URIs we've sent didOpen for (didOpen vs didChange selection).
    opened_docs: HashSet<String>,
    doc_versions: HashMap<String, i32>,
    #[allow(dead_code)]
    reader_handle: tokio::task::JoinHandle<()>,
    #[allow(dead_code)]
    writer_handle: tokio::task::JoinHandle<()>,
}

impl BridgeClient {
    /// Run the initialize handshake over an open connection.
    pub async fn start(io: ServerIo, workspace_root: &Path, options: InitOptions) -> Result<Self> {
        let ServerIo {
            reader,
            writer,
            child,
        } = io;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(async move {
            let mut writer = MessageWriter::new(writer);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_message(&frame).await {
                            tracing::warn!("Write to analysis server failed: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = MessageReader::new(reader);
            loop {
                match reader.read_message().await {
                    Ok(Some(frame)) => {
                        Self::dispatch(&frame, &reader_pending, &reader_writer_tx).await;
                    }
                    Ok(None) => {
                        tracing::info!("Analysis server closed the connection");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Read from analysis server failed: {e}");
                        break;
                    }
                }
            }
        });

        let mut client = Self {
            child,
            writer_tx,
            next_id: 1,
            pending,
            opened_docs: HashSet::new(),
            doc_versions: HashMap::new(),
            reader_handle,
            writer_handle,
        };

        client.initialize(workspace_root, &options).await?;

        Ok(client)
    }

    async fn dispatch(
        frame: &serde_json::Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
        writer_tx: &mpsc::Sender<WriterCommand>,
    ) {
        let Some(incoming) = classify(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame from server");
            return;
        };

        match incoming {
            Incoming::Response { id, body } => {
                let sender = pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(body);
                }
            }
            Incoming::ServerRequest { id, method } => {
                // The server may probe for client capabilities we don't
                // implement; it must get an answer or it may block.
                tracing::debug!("Server request {method} - replying method not found");
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("Method not found: {method}")
                    }
                });
                let _ = writer_tx.send(WriterCommand::Send(response)).await;
            }
            Incoming::Notification { method, params } => match method.as_str() {
                "window/logMessage" => {
                    let text = params
                        .as_ref()
                        .and_then(|p| p.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("");
                    tracing::debug!(target: "pasls", "{text}");
                }
                _ => {
                    tracing::trace!("Ignoring server notification: {method}");
                }
            },
        }
    }

    async fn initialize(&mut self, workspace_root: &Path, options: &InitOptions) -> Result<()> {
        let root_uri = protocol::path_to_file_uri(workspace_root)
            .context("converting workspace root to URI")?;

        let params = protocol::initialize_params(root_uri.as_str(), options);
        let response = self.request_raw("initialize", Some(params)).await?;

        if let Some(error) = response.get("error") {
            bail!(
                "initialize failed: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }

        self.notify("initialized", Some(serde_json::json!({})))
            .await?;

        Ok(())
    }

    /// Send a request and return the full JSON-RPC response body.
    async fn request_raw(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = Request::new(id, method, params);
        let frame = serde_json::to_value(&request).context("serializing request")?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            bail!("writer channel closed");
        }

        let timeout = std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("server connection closed before responding to {method}");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("request {method} timed out");
            }
        }
    }

    /// Forward a custom request and return its `result` payload.
    ///
    /// A JSON-RPC error response becomes an `Err`; the caller decides how
    /// to render it.
    pub async fn custom_request(
        &mut self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let response = self.request_raw(method, Some(params)).await?;
        if let Some(error) = response.get("error") {
            bail!(
                "{method} failed: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(response.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn notify(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let notification = Notification::new(method, params);
        let frame = serde_json::to_value(&notification).context("serializing notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow::anyhow!("writer channel closed"))?;
        Ok(())
    }

    /// Synchronize a document's text with the server.
    ///
    /// First sight of a URI sends didOpen; later calls send didChange with
    /// a monotonically increasing version.
    pub async fn sync_document(&mut self, uri: &str, text: &str) -> Result<()> {
        if self.opened_docs.contains(uri) {
            let version = self.doc_versions.entry(uri.to_string()).or_insert(0);
            *version += 1;
            let params = protocol::did_change_params(uri, *version, text);
            self.notify("textDocument/didChange", Some(params)).await
        } else {
            let version = 1;
            self.doc_versions.insert(uri.to_string(), version);
            self.opened_docs.insert(uri.to_string());
            let params = protocol::did_open_params(uri, LANGUAGE_ID, version, text);
            self.notify("textDocument/didOpen", Some(params)).await
        }
    }

    /// Push the re-read settings namespace to the server.
    pub async fn push_configuration(&self, settings: serde_json::Value) -> Result<()> {
        let params = protocol::did_change_configuration_params(settings);
        self.notify("workspace/didChangeConfiguration", Some(params))
            .await
    }

    /// Report watched-file events.
    pub async fn notify_watched_files(&self, events: &[(String, FileChange)]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let params = protocol::did_change_watched_files_params(events);
        self.notify("workspace/didChangeWatchedFiles", Some(params))
            .await
    }

    /// Gracefully end the session. Consumes self.
    pub async fn shutdown(mut self) {
        if let Ok(response) = self.request_raw("shutdown", None).await
            && response.get("error").is_none()
        {
            let _ = self.notify("exit", None).await;
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        if let Some(mut child) = self.child.take() {
            let waited = tokio::time::timeout(
                std::time::Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
                child.wait(),
            )
            .await;

            if waited.is_err() {
                tracing::debug!("Analysis server didn't exit in time, killing");
                let _ = child.kill().await;
            }
        }
    }
}
