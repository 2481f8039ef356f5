//! The playback engine seam and the handle that owns it.
//!
//! The engine is opaque: it is reached only through the [`Engine`] trait
//! (options, commands, properties, event polling, wake-up registration) and
//! its OpenGL render sub-API, [`RenderApi`]. A libmpv binding implements these
//! traits; [`crate::testing::ScriptedEngine`] implements them in memory.
//!
//! [`EngineHandle`] wraps an engine after it has been configured and
//! initialized, and converts engine failures into [`MpvError`] values.

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mpv_scene_core::logging::targets;
use thiserror::Error;

use crate::config::BridgeConfig;
use crate::error::{MpvError, Result};
use crate::value::{PropertyKind, PropertyValue, WatchedType};

/// A failure reported by the engine itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct EngineError {
    /// The engine's negative status code.
    pub code: i32,
    /// The engine's description of the status code.
    pub message: String,
}

impl EngineError {
    /// Create an engine error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type for raw engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Callback the engine invokes, from a thread of its choosing, when events are pending.
pub type WakeupCallback = Box<dyn Fn() + Send + Sync>;

/// Callback the render sub-API invokes, from any thread, when a new frame is ready.
pub type UpdateCallback = Box<dyn Fn() + Send + Sync>;

/// Why playback of a file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndFileReason {
    /// The end of the file was reached.
    Eof,
    /// Playback was stopped by a command (e.g. a new file was loaded).
    Stop,
    /// The engine is shutting down.
    Quit,
    /// The file could not be played.
    Error,
    /// The file was a playlist or redirect and has been expanded.
    Redirect,
    /// A reason code this bridge does not know.
    Unknown,
}

impl EndFileReason {
    /// Decode the engine's reason code. Unrecognized codes map to [`Unknown`](Self::Unknown).
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Eof,
            2 => Self::Stop,
            3 => Self::Quit,
            4 => Self::Error,
            5 => Self::Redirect,
            _ => Self::Unknown,
        }
    }

    /// The reason as reported to the UI layer.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eof => "eof",
            Self::Stop => "stop",
            Self::Quit => "quit",
            Self::Error => "error",
            Self::Redirect => "redirect",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EndFileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event taken from the engine's queue.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The queue is empty.
    None,
    /// A file is about to be opened.
    StartFile,
    /// Playback of a file ended; `reason` is the engine's raw reason code.
    EndFile { reason: i32 },
    /// A file was opened and playback will start.
    FileLoaded,
    /// An observed property changed. `value` is `None` when the property
    /// currently has no value (e.g. `duration` with nothing loaded).
    PropertyChange {
        name: String,
        value: Option<PropertyValue>,
    },
    /// A line from the engine's own log.
    LogMessage {
        prefix: String,
        level: String,
        text: String,
    },
    /// The engine is being destroyed.
    Shutdown,
    /// Any other event, identified by the engine's numeric event ID.
    Other(u32),
}

/// A GPU context the engine can resolve OpenGL entry points from.
///
/// Implemented by the host window's render thread. Only valid while it is
/// the current context on the calling thread.
pub trait GpuContext {
    /// Look up an OpenGL function by name. Returns null if unknown.
    fn get_proc_address(&self, name: &str) -> *const c_void;
}

/// The engine's OpenGL render sub-API.
pub trait RenderApi: Send + Sync {
    /// Bind the engine's renderer to `context`, which must be current.
    fn init_gl(&self, context: &dyn GpuContext) -> EngineResult<()>;

    /// Render the current video frame into framebuffer `fbo`.
    ///
    /// A negative `height` asks for vertically flipped output.
    fn draw(&self, fbo: u32, width: i32, height: i32) -> EngineResult<()>;

    /// Tell the engine that framebuffer `fbo` has been presented.
    fn report_flip(&self, fbo: u32);

    /// Release every GPU resource created by [`init_gl`](Self::init_gl).
    fn uninit_gl(&self);

    /// Install or clear the frame-ready callback.
    fn set_update_callback(&self, callback: Option<UpdateCallback>);
}

/// The engine's control surface.
pub trait Engine: Send + Sync {
    /// Set an option by its string form. Some options only apply before
    /// [`initialize`](Self::initialize).
    fn set_option_string(&self, name: &str, value: &str) -> EngineResult<()>;

    /// Finish engine start-up.
    fn initialize(&self) -> EngineResult<()>;

    /// Run a command, e.g. `["seek", 10.0, "absolute"]`.
    fn command(&self, args: &[PropertyValue]) -> EngineResult<()>;

    /// Write a property.
    fn set_property(&self, name: &str, value: &PropertyValue) -> EngineResult<()>;

    /// Read a property in its native format.
    fn get_property(&self, name: &str) -> EngineResult<PropertyValue>;

    /// Ask for [`EngineEvent::PropertyChange`] events for `name`, decoded as `kind`.
    fn observe_property(&self, name: &str, kind: PropertyKind) -> EngineResult<()>;

    /// Ask for [`EngineEvent::LogMessage`] events at `min_level` and above
    /// (`"fatal"`, `"error"`, `"warn"`, `"info"`, `"v"`, `"debug"`, `"trace"`),
    /// or stop them with `"no"`.
    fn request_log_messages(&self, min_level: &str) -> EngineResult<()>;

    /// Take the next event, waiting up to `timeout`. Returns
    /// [`EngineEvent::None`] if the queue stays empty.
    fn wait_event(&self, timeout: Duration) -> EngineEvent;

    /// Install or clear the wake-up callback.
    fn set_wakeup_callback(&self, callback: Option<WakeupCallback>);

    /// The OpenGL render sub-API, if this engine build has one.
    fn render_api(&self) -> Option<Arc<dyn RenderApi>>;
}

/// An initialized engine plus its render sub-API.
///
/// Cloning the handle shares the engine; the engine is destroyed when the
/// last clone is dropped. The render object keeps a clone so the engine
/// outlives its GPU teardown.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn Engine>,
    render: Arc<dyn RenderApi>,
}

impl EngineHandle {
    /// Create, configure and initialize an engine.
    ///
    /// `factory` constructs the raw engine and returns `None` if it cannot.
    ///
    /// # Errors
    ///
    /// - [`MpvError::EngineInit`] if the engine cannot be constructed, a
    ///   pre-initialization option is rejected, or initialization fails.
    /// - [`MpvError::RenderingUnsupported`] if the render sub-API is missing.
    pub fn create<F>(factory: F, config: &BridgeConfig) -> Result<Self>
    where
        F: FnOnce() -> Option<Arc<dyn Engine>>,
    {
        let engine =
            factory().ok_or_else(|| MpvError::EngineInit("could not create engine context".into()))?;

        for (name, value) in config.pre_init_options() {
            engine.set_option_string(name, value).map_err(|err| {
                MpvError::EngineInit(format!("could not set option {name}={value}: {err}"))
            })?;
        }

        engine
            .initialize()
            .map_err(|err| MpvError::EngineInit(format!("could not initialize engine: {err}")))?;

        for (name, value) in config.post_init_options() {
            if let Err(err) = engine.set_option_string(name, value) {
                tracing::warn!(target: targets::ENGINE, name, value, %err, "engine rejected option");
            }
        }

        if let Err(err) = engine.request_log_messages(&config.log_level) {
            tracing::warn!(
                target: targets::ENGINE,
                level = config.log_level.as_str(),
                %err,
                "engine refused to forward its log"
            );
        }

        let render = engine.render_api().ok_or(MpvError::RenderingUnsupported)?;

        tracing::debug!(target: targets::ENGINE, "engine initialized");
        Ok(Self { engine, render })
    }

    /// Run a command.
    pub fn command(&self, args: &[PropertyValue]) -> Result<()> {
        tracing::trace!(target: targets::ENGINE, ?args, "command");
        self.engine.command(args).map_err(|err| MpvError::Command {
            operation: format!("command({})", command_name(args)),
            message: err.to_string(),
        })
    }

    /// Write a property.
    pub fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let value = value.into();
        tracing::trace!(target: targets::ENGINE, name, %value, "set property");
        self.engine
            .set_property(name, &value)
            .map_err(|err| MpvError::Command {
                operation: format!("set_property({name})"),
                message: err.to_string(),
            })
    }

    /// Read a property in whatever format the engine reports.
    pub fn get_property(&self, name: &str) -> Result<PropertyValue> {
        self.engine
            .get_property(name)
            .map_err(|err| MpvError::Command {
                operation: format!("get_property({name})"),
                message: err.to_string(),
            })
    }

    /// Read a property and require it to have type `T`.
    pub fn get_property_as<T: WatchedType>(&self, name: &str) -> Result<T> {
        let value = self.get_property(name)?;
        T::decode(&value).ok_or_else(|| MpvError::PropertyFormat {
            name: name.to_string(),
            expected: T::KIND,
            actual: value.kind(),
        })
    }

    /// Set a runtime option.
    pub fn set_option(&self, name: &str, value: &PropertyValue) -> Result<()> {
        self.engine
            .set_option_string(name, &value.to_option_string())
            .map_err(|err| MpvError::Command {
                operation: format!("set_option({name})"),
                message: err.to_string(),
            })
    }

    /// Ask the engine to report changes of `name`.
    pub fn observe(&self, name: &str, kind: PropertyKind) -> Result<()> {
        self.engine
            .observe_property(name, kind)
            .map_err(|err| MpvError::Command {
                operation: format!("observe_property({name})"),
                message: err.to_string(),
            })
    }

    /// Take the next pending event, or `None` if the queue is empty.
    ///
    /// A zero `timeout` never blocks.
    pub fn poll_event(&self, timeout: Duration) -> Option<EngineEvent> {
        match self.engine.wait_event(timeout) {
            EngineEvent::None => None,
            event => Some(event),
        }
    }

    /// Install or clear the engine's wake-up callback.
    pub fn set_wakeup_callback(&self, callback: Option<WakeupCallback>) {
        self.engine.set_wakeup_callback(callback);
    }

    /// The OpenGL render sub-API.
    pub fn render_api(&self) -> &Arc<dyn RenderApi> {
        &self.render
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("handles", &Arc::strong_count(&self.engine))
            .finish()
    }
}

fn command_name(args: &[PropertyValue]) -> String {
    args.first()
        .map(PropertyValue::to_option_string)
        .unwrap_or_default()
}
