use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("can't open device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't {what}: {source}")]
    Configure {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("can't send spi message: {0}")]
    Message(#[source] std::io::Error),

    #[error("tx/rx length mismatch: tx {tx} bytes, rx {rx} bytes")]
    LengthMismatch { tx: usize, rx: usize },

    #[error("transfer of {len} bytes exceeds the {max}-byte message limit")]
    TransferTooLarge { len: usize, max: usize },

    #[error("injected fault: {0}")]
    Injected(String),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("failed to open slave ready indicator {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to get slave ready status from {path}: {content:?}")]
    Malformed { path: PathBuf, content: String },

    #[error("simulated gate marked inaccessible")]
    Simulated,
}
