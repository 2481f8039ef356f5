//! Error types for the core crate.

use thiserror::Error;

/// Errors raised by the core primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The owning side of a dispatch queue has been dropped.
    #[error("dispatch queue has been closed")]
    DispatcherClosed,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
