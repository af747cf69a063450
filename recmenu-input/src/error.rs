//! Input layer error types

use thiserror::Error;

/// Errors from device discovery and event listening
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to open input device {path}: {source}")]
    OpenDevice {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read events from {path}: {source}")]
    ReadEvents {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan input directory {path}: {source}")]
    ScanDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
