//! Error types for the engine bridge.

use thiserror::Error;

use crate::value::PropertyKind;

/// Errors that can occur while building or driving the bridge.
///
/// Construction errors ([`EngineInit`](Self::EngineInit),
/// [`RenderingUnsupported`](Self::RenderingUnsupported),
/// [`RenderInit`](Self::RenderInit)) are fatal to the bridge. Everything else
/// is reported to the caller and otherwise absorbed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MpvError {
    /// The engine could not be created or initialized.
    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    /// The engine was built without the OpenGL render sub-API.
    #[error("OpenGL render API not available in this engine build")]
    RenderingUnsupported,

    /// No GPU context was current, or the engine refused to bind to it.
    #[error("could not initialize GPU rendering: {0}")]
    RenderInit(String),

    /// The engine rejected a command or property access.
    #[error("engine rejected {operation}: {message}")]
    Command {
        /// What was being attempted, e.g. `set_property(pause)`.
        operation: String,
        /// The engine's description of the failure.
        message: String,
    },

    /// A property value had a different type than requested.
    #[error("property '{name}' has type {actual}, expected {expected}")]
    PropertyFormat {
        name: String,
        expected: PropertyKind,
        actual: PropertyKind,
    },

    /// Bridge configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<toml::de::Error> for MpvError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, MpvError>;
