//! services/storefront/src/error.rs
//!
//! Defines the primary error type for the storefront client.

use crate::config::ConfigError;
use storefront_core::ports::ClientError;

/// The primary error type for the `storefront` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the client core.
    #[error("{0}")]
    Client(#[from] ClientError),

    /// Represents a standard Input/Output error (e.g., writing to the terminal).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
