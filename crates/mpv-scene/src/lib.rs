//! Embed an mpv playback engine in a GPU scene graph.
//!
//! mpv-scene bridges three threads it does not own:
//!
//! - the **engine thread**, which decodes media and announces pending events
//!   and new frames through callbacks;
//! - the **UI thread**, which owns every cached property value and runs the
//!   event pump through a [`Dispatcher`](mpv_scene_core::Dispatcher);
//! - the **render thread** of the host window, which creates, paints and
//!   tears down the engine's GPU binding through [`RenderHooks`].
//!
//! The entry point is [`MpvObject`]. Its watched properties are exposed as
//! typed values with change signals on [`MediaProperties`].
//!
//! # Wiring a host
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mpv_scene::{BridgeConfig, Engine, HostWindow, MpvObject};
//! use mpv_scene_core::DispatchQueue;
//!
//! fn embed(
//!     engine: impl FnOnce() -> Option<Arc<dyn Engine>>,
//!     window: Arc<dyn HostWindow>,
//! ) -> mpv_scene::Result<()> {
//!     // Created on the UI thread; its event loop calls `process_pending`.
//!     let queue = DispatchQueue::new();
//!     let object = MpvObject::new(engine, BridgeConfig::default(), queue.dispatcher())?;
//!     object.handle_window_changed(Some(window));
//!
//!     // Render thread, at each synchronization point of the host window:
//!     let hooks = object.render_hooks().clone();
//!     hooks.sync()?;
//!     hooks.paint();
//!     hooks.swapped();
//!
//!     object.load_file("https://example.com/video.webm");
//!     queue.process_pending();
//!     Ok(())
//! }
//! ```

mod config;
mod engine;
mod error;
mod events;
mod object;
mod playback;
mod properties;
mod render;
pub mod testing;
mod value;

pub use config::BridgeConfig;
pub use engine::{
    EndFileReason, Engine, EngineError, EngineEvent, EngineHandle, EngineResult, GpuContext,
    RenderApi, UpdateCallback, WakeupCallback,
};
pub use error::{MpvError, Result};
pub use events::{LifecycleSignals, PumpState};
pub use object::MpvObject;
pub use properties::{MediaProperties, PropertyRegistry, WATCHED_PROPERTIES, WatchedProperty};
pub use render::{HostWindow, PixelSize, RenderHooks, RenderState};
pub use value::{PropertyKind, PropertyValue, WatchedType};
