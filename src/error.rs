use thiserror::Error;

/// Failure talking to the credit backend.
///
/// Every variant is recoverable from the ledger's point of view: the
/// ledger turns it into a tagged failure result or a fallback state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build error: {0}")]
    BuildError(String),
}
