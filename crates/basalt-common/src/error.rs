//! Error types for BasaltDB.

use thiserror::Error;

/// Result type alias using BasaltError.
pub type Result<T> = std::result::Result<T, BasaltError>;

/// Errors that can occur in BasaltDB operations.
#[derive(Debug, Error)]
pub enum BasaltError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Storage errors
    #[error("corruption: {0}")]
    Corruption(String),

    #[error("invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    // Catalog errors
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // Armed crash points surface as an error so the operation stops mid-flight
    #[error("operation interrupted at fault point {0}")]
    FaultInjected(&'static str),
}
