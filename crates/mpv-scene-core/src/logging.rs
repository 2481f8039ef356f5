//! Tracing targets used throughout mpv-scene.
//!
//! mpv-scene uses the `tracing` crate for instrumentation. Nothing is printed
//! unless the host installs a subscriber:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("mpv_scene::render=debug,mpv_scene::events=trace")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Owner-thread dispatch queue.
    pub const DISPATCH: &str = "mpv_scene_core::dispatch";
    /// Signal emission.
    pub const SIGNAL: &str = "mpv_scene_core::signal";
    /// Engine handle: options, commands, property access.
    pub const ENGINE: &str = "mpv_scene::engine";
    /// Event pump: wake-ups and drains.
    pub const EVENTS: &str = "mpv_scene::events";
    /// Messages forwarded from the engine's own log.
    pub const ENGINE_LOG: &str = "mpv_scene::engine_log";
    /// Watched property registry.
    pub const PROPERTIES: &str = "mpv_scene::properties";
    /// Render object lifecycle.
    pub const RENDER: &str = "mpv_scene::render";
    /// Playback facade.
    pub const PLAYBACK: &str = "mpv_scene::playback";
}
