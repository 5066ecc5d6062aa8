//! JSON-RPC message types and request builders for the analysis server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pasbridge_types::InitOptions;

/// Custom request: dump the in-memory scope tree for a document.
pub const METHOD_DUMP_SCOPE: &str = "pascal/dumpScope";
/// Custom request: dump the persisted (database) scope tree for a document.
pub const METHOD_DUMP_SCOPE_DB: &str = "pascal/dumpScopeDb";
/// Custom request: run an ad-hoc query against the server's symbol store.
pub const METHOD_SQL_QUERY: &str = "pascal/sqlQuery";

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Result payload shared by all three custom diagnostic requests.
///
/// The server returns `{ "dump": "..." }`, an empty object, or null.
#[derive(Debug, Default, Deserialize)]
pub struct DumpResult {
    #[serde(default)]
    pub dump: Option<String>,
}

impl DumpResult {
    /// The dump text, or a placeholder when the server returned nothing.
    #[must_use]
    pub fn text(self) -> String {
        match self.dump {
            Some(dump) if !dump.is_empty() => dump,
            _ => String::from("(no output)"),
        }
    }
}

pub(crate) fn initialize_params(root_uri: &str, options: &InitOptions) -> serde_json::Value {
    serde_json::json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "willSave": false,
                    "willSaveWaitUntil": false,
                    "didSave": false
                }
            },
            "workspace": {
                "didChangeConfiguration": { "dynamicRegistration": false },
                "didChangeWatchedFiles": { "dynamicRegistration": false }
            }
        },
        "initializationOptions": options,
        "workspaceFolders": [{
            "uri": root_uri,
            "name": "workspace"
        }]
    })
}

/// `{ textDocument: { uri } }` — the payload both scope-dump requests take.
#[must_use]
pub fn text_document_params(uri: &str) -> serde_json::Value {
    serde_json::json!({ "textDocument": { "uri": uri } })
}

/// `{ sqlQuery }` — the payload of the ad-hoc query request.
#[must_use]
pub fn sql_query_params(query: &str) -> serde_json::Value {
    serde_json::json!({ "sqlQuery": query })
}

pub(crate) fn did_open_params(
    uri: &str,
    language_id: &str,
    version: i32,
    text: &str,
) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn did_change_params(uri: &str, version: i32, text: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": { "uri": uri, "version": version },
        "contentChanges": [{ "text": text }]
    })
}

pub(crate) fn did_change_configuration_params(settings: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "settings": settings })
}

/// Watched-file change kinds, per the protocol's `FileChangeType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Created,
    Changed,
    Deleted,
}

impl FileChange {
    const fn code(self) -> u8 {
        match self {
            Self::Created => 1,
            Self::Changed => 2,
            Self::Deleted => 3,
        }
    }
}

pub(crate) fn did_change_watched_files_params(
    events: &[(String, FileChange)],
) -> serde_json::Value {
    let changes: Vec<serde_json::Value> = events
        .iter()
        .map(|(uri, change)| serde_json::json!({ "uri": uri, "type": change.code() }))
        .collect();
    serde_json::json!({ "changes": changes })
}

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

#[must_use]
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}
