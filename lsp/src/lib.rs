//! Protocol client plumbing for the external Pascal analysis server.
//!
//! The pipeline: resolved settings -> [`launch::log_args`] ->
//! [`launch::select_transport`] -> [`transport::ServerIo::open`] ->
//! [`client::BridgeClient::start`].

pub mod codec;
pub mod launch;
pub mod protocol;
pub mod transport;

mod client;

pub use client::BridgeClient;
pub use launch::{TransportDescriptor, log_args, select_transport};
pub use protocol::{
    DumpResult, FileChange, METHOD_DUMP_SCOPE, METHOD_DUMP_SCOPE_DB, METHOD_SQL_QUERY,
    path_to_file_uri, sql_query_params, text_document_params,
};
pub use transport::{ServerIo, TransportError};
