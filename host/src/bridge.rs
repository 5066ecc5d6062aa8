//! The activation-scoped bridge context.
//!
//! One `Bridge` per activation. It owns the client handle as an explicit
//! field (not module-global state), so independent activations - real or
//! under test - never collide. The embedding host serializes activation,
//! deactivation and configuration-change events; the bridge assumes no
//! two of them overlap.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use pasbridge_config::{NAMESPACE, SettingsStore, affects_bridge, resolve};
use pasbridge_lsp::{
    BridgeClient, DumpResult, FileChange, METHOD_DUMP_SCOPE, METHOD_DUMP_SCOPE_DB,
    METHOD_SQL_QUERY, ServerIo, log_args, path_to_file_uri, select_transport, sql_query_params,
    text_document_params,
};
use pasbridge_types::{QueryHistory, ServerSettings};

use crate::storage::{self, BridgeState};
use crate::watch::SourceWatch;

/// Activation-scoped bridge state and lifecycle.
pub struct Bridge {
    workspace_root: PathBuf,
    state_path: Option<PathBuf>,
    state: BridgeState,
    watch: SourceWatch,
    settings: Option<ServerSettings>,
    client: Option<BridgeClient>,
}

impl Bridge {
    /// Bridge with the default persistent-state location.
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        Self::with_state_path(workspace_root, storage::state_path())
    }

    /// Bridge with an explicit (or no) state file. `None` keeps history
    /// in memory only.
    #[must_use]
    pub fn with_state_path(workspace_root: PathBuf, state_path: Option<PathBuf>) -> Self {
        let state = state_path
            .as_deref()
            .map(storage::load)
            .unwrap_or_default();
        Self {
            workspace_root,
            state_path,
            state,
            watch: SourceWatch::new(),
            settings: None,
            client: None,
        }
    }

    /// Whether a client session is up.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.client.is_some()
    }

    #[must_use]
    pub fn query_history(&self) -> &QueryHistory {
        &self.state.query_history
    }

    /// Run the resolve -> build -> select -> open -> initialize pipeline.
    ///
    /// Fails fast on a missing server path (no descriptor is produced and
    /// no client is created) and on transport or handshake errors. The
    /// caller renders the error; nothing here retries.
    pub async fn activate(&mut self, store: &SettingsStore) -> Result<()> {
        let settings = resolve(store)?;
        self.start_session(settings).await
    }

    async fn start_session(&mut self, settings: ServerSettings) -> Result<()> {
        tracing::info!("Using Pascal language server: {}", settings.server_path());
        tracing::info!("Connection mode: {}", settings.connection_mode().as_str());
        if !settings.search_folders().is_empty() {
            tracing::info!("Search folders: {}", settings.search_folders().join(", "));
        }

        let descriptor = select_transport(&settings, log_args(&settings));
        let io = ServerIo::open(&descriptor).await?;
        let client = BridgeClient::start(io, &self.workspace_root, settings.init_options())
            .await
            .context("initializing analysis server session")?;

        self.settings = Some(settings);
        self.client = Some(client);
        Ok(())
    }

    /// Shut the session down if one was created; no-op otherwise.
    pub async fn deactivate(&mut self) {
        self.settings = None;
        if let Some(client) = self.client.take() {
            client.shutdown().await;
        }
    }

    /// React to a configuration-change notification.
    ///
    /// Changes outside the bridge namespace are ignored. A relevant change
    /// re-reads the namespace in full: if the resolved settings are
    /// unchanged the running session just receives a
    /// `didChangeConfiguration` push, otherwise the session is restarted
    /// with the new settings. A failing re-resolve leaves the current
    /// session untouched.
    pub async fn on_configuration_changed(
        &mut self,
        section: &str,
        store: &SettingsStore,
    ) -> Result<()> {
        if !affects_bridge(section) {
            return Ok(());
        }

        let resolved = resolve(store)?;
        if self.settings.as_ref() == Some(&resolved) {
            if let Some(client) = &self.client {
                client
                    .push_configuration(serde_json::json!({ NAMESPACE: store.to_json() }))
                    .await?;
            }
            return Ok(());
        }

        tracing::info!("Bridge settings changed; restarting session");
        self.deactivate().await;
        self.start_session(resolved).await
    }

    /// Workspace folder set changed. The session keeps running; the event
    /// is only recorded.
    pub fn on_workspace_folders_changed(&self) {
        tracing::info!("Workspace folders changed");
    }

    /// Forward a watched-file event if the path is a Pascal source file.
    pub async fn on_watched_file_event(&mut self, path: &Path, change: FileChange) -> Result<()> {
        if !self.watch.matches(path) {
            return Ok(());
        }
        let Some(client) = &self.client else {
            return Ok(());
        };
        let absolute = self.absolute(path);
        let uri = path_to_file_uri(&absolute)?;
        client
            .notify_watched_files(&[(uri.to_string(), change)])
            .await
    }

    /// Dump the in-memory scope tree for a document.
    ///
    /// Command-handler boundary: failures are logged and rendered as the
    /// returned text, never propagated.
    pub async fn dump_scope(&mut self, document: &Path) -> String {
        match self.forward_document_dump(METHOD_DUMP_SCOPE, document).await {
            Ok(text) => text,
            Err(e) => render_failure("Scope dump", &e),
        }
    }

    /// Dump the persisted (database) scope tree for a document.
    pub async fn dump_scope_db(&mut self, document: &Path) -> String {
        match self
            .forward_document_dump(METHOD_DUMP_SCOPE_DB, document)
            .await
        {
            Ok(text) => text,
            Err(e) => render_failure("Persisted scope dump", &e),
        }
    }

    /// Run an ad-hoc query against the server's symbol store.
    ///
    /// Every submitted query lands in the persisted history, including
    /// ones the server rejects - the history records what the user typed,
    /// not what succeeded.
    pub async fn run_query(&mut self, query: &str) -> String {
        self.state.query_history.record(query);
        self.persist_state();

        match self.forward_query(query).await {
            Ok(text) => text,
            Err(e) => render_failure("Query", &e),
        }
    }

    async fn forward_document_dump(
        &mut self,
        method: &'static str,
        document: &Path,
    ) -> Result<String> {
        let absolute = self.absolute(document);
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| anyhow!("bridge is not active"))?;

        let uri = path_to_file_uri(&absolute)?;
        let text = tokio::fs::read_to_string(&absolute)
            .await
            .with_context(|| format!("reading {}", absolute.display()))?;

        client.sync_document(uri.as_str(), &text).await?;
        let result = client
            .custom_request(method, text_document_params(uri.as_str()))
            .await?;
        Ok(parse_dump(result))
    }

    async fn forward_query(&mut self, query: &str) -> Result<String> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| anyhow!("bridge is not active"))?;
        let result = client
            .custom_request(METHOD_SQL_QUERY, sql_query_params(query))
            .await?;
        Ok(parse_dump(result))
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn persist_state(&self) {
        let Some(path) = &self.state_path else { return };
        if let Err(e) = storage::save(path, &self.state) {
            tracing::warn!(path = %path.display(), "Failed to persist bridge state: {e}");
        }
    }
}

/// Tolerant result parsing: the server answers `{ dump }`, an empty
/// object, or null.
fn parse_dump(result: serde_json::Value) -> String {
    serde_json::from_value::<DumpResult>(result)
        .unwrap_or_default()
        .text()
}

fn render_failure(what: &str, err: &anyhow::Error) -> String {
    tracing::error!("{what} failed: {err:#}");
    format!("{what} failed: {err:#}")
}
