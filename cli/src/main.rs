//! pasbridge - headless driver for the Pascal language-server bridge.
//!
//! Each subcommand is one activation: resolve settings, bring the session
//! up, run the command, shut the session down. The same `Bridge` type
//! serves editor embeddings; this binary only drives it from a terminal.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pasbridge_config::SettingsStore;
use pasbridge_host::Bridge;
use pasbridge_lsp::{log_args, select_transport};

#[derive(Parser)]
#[command(name = "pasbridge", version, about = "Bridge to an external Pascal analysis server")]
struct Cli {
    /// Config file to read the [pascal] settings from
    /// (default: ~/.pasbridge/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root reported to the server.
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the settings and print the selected transport.
    Check,
    /// Dump the in-memory scope tree for a document.
    DumpScope {
        /// Pascal source file to dump.
        file: PathBuf,
    },
    /// Dump the persisted (database) scope tree for a document.
    DumpScopeDb {
        /// Pascal source file to dump.
        file: PathBuf,
    },
    /// Run an ad-hoc query against the server's symbol store.
    Query {
        /// Query text, passed to the server verbatim.
        sql: String,
    },
    /// Print the stored ad-hoc query history, most recent first.
    History,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::debug!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No writable log location: log to stderr so command output on stdout
    // stays clean.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.pasbridge/logs/pasbridge.log
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".pasbridge").join("logs").join("pasbridge.log"));
    }

    // Fallback: ./.pasbridge/logs/pasbridge.log
    candidates.push(PathBuf::from(".pasbridge").join("logs").join("pasbridge.log"));

    candidates
}

fn load_store(config: Option<&PathBuf>) -> Result<SettingsStore> {
    let store = match config {
        Some(path) => SettingsStore::load_from(path)?,
        None => SettingsStore::load()?,
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let store = load_store(cli.config.as_ref())?;
    let workspace = std::path::absolute(&cli.workspace)?;

    match cli.command {
        Command::Check => {
            let settings = pasbridge_config::resolve(&store)?;
            let descriptor = select_transport(&settings, log_args(&settings));
            println!("{descriptor}");
        }
        Command::DumpScope { file } => {
            let mut bridge = Bridge::new(workspace);
            bridge.activate(&store).await?;
            println!("{}", bridge.dump_scope(&file).await);
            bridge.deactivate().await;
        }
        Command::DumpScopeDb { file } => {
            let mut bridge = Bridge::new(workspace);
            bridge.activate(&store).await?;
            println!("{}", bridge.dump_scope_db(&file).await);
            bridge.deactivate().await;
        }
        Command::Query { sql } => {
            let mut bridge = Bridge::new(workspace);
            bridge.activate(&store).await?;
            println!("{}", bridge.run_query(&sql).await);
            bridge.deactivate().await;
        }
        Command::History => {
            let bridge = Bridge::new(workspace);
            let history = bridge.query_history();
            if history.is_empty() {
                println!("(no queries recorded)");
            } else {
                for (index, query) in history.queries().iter().enumerate() {
                    println!("{:>2}  {query}", index + 1);
                }
            }
        }
    }

    Ok(())
}
