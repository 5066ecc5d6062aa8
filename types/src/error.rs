//! Shared error taxonomy.

/// Errors that block activation before any client is constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    /// The server executable is not configured. Activation stops here:
    /// no transport descriptor is produced and no client is created.
    #[error(
        "Pascal language server path is not configured. \
         Set `pascal.serverPath` in your settings."
    )]
    MissingServerPath,
}
