//! The bridge object the UI layer talks to.

use std::fmt;
use std::sync::{Arc, Weak};

use mpv_scene_core::logging::targets;
use mpv_scene_core::{CoalescedPost, Dispatcher, Property, Signal, ThreadAffinity};

use crate::config::BridgeConfig;
use crate::engine::{Engine, EngineHandle};
use crate::error::Result;
use crate::events::{EventPump, LifecycleSignals, PumpState};
use crate::playback::Playback;
use crate::properties::{MediaProperties, PropertyRegistry};
use crate::render::{HostWindow, RenderHooks};
use crate::value::{PropertyValue, WatchedType};

/// A playback engine embedded in a host window.
///
/// `MpvObject` owns the engine and everything that reads from or writes to
/// it. It is created on the UI thread, together with the [`Dispatcher`] of
/// that thread's event loop. Engine wake-ups and frame notifications arrive
/// on arbitrary threads and are forwarded to the UI thread through that
/// dispatcher; property values and notifications are only ever updated from
/// the UI thread.
///
/// Rendering is driven separately by the host window through
/// [`render_hooks`](Self::render_hooks).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use mpv_scene::testing::{FakeWindow, ScriptedEngine};
/// use mpv_scene::{BridgeConfig, Engine, HostWindow, MpvObject, RenderState};
/// use mpv_scene_core::DispatchQueue;
///
/// let queue = DispatchQueue::new();
/// let engine = ScriptedEngine::new();
/// let object = MpvObject::new(
///     || Some(engine.clone() as Arc<dyn Engine>),
///     BridgeConfig::default(),
///     queue.dispatcher(),
/// )
/// .unwrap();
///
/// object.properties().media_title_changed().connect(|title| println!("now playing {title}"));
/// let window = FakeWindow::new(1280, 720, 1.0);
/// object.handle_window_changed(Some(window.clone() as Arc<dyn HostWindow>));
/// object.load_file("movie.mkv");
///
/// engine.push_property("media-title", "Movie");
/// queue.process_pending();
/// assert_eq!(object.properties().media_title(), "Movie");
///
/// // On the render thread, at the host window's pre-sync hook.
/// object.render_hooks().sync().unwrap();
/// assert_eq!(object.render_hooks().state(), RenderState::Bound);
/// ```
pub struct MpvObject {
    affinity: ThreadAffinity,
    registry: PropertyRegistry,
    lifecycle: LifecycleSignals,
    playback: Playback,
    enable_audio: Property<bool>,
    enable_audio_changed: Signal<bool>,
    render: Arc<RenderHooks>,
    frame_relay: CoalescedPost,
    events: EventPump,
    engine: EngineHandle,
}

impl MpvObject {
    /// Create the engine, configure it, and start observing its properties.
    ///
    /// `factory` constructs the raw engine. `dispatcher` posts to the event
    /// loop of the calling thread, which becomes the object's owner thread.
    ///
    /// # Errors
    ///
    /// [`MpvError::EngineInit`](crate::MpvError::EngineInit) and
    /// [`MpvError::RenderingUnsupported`](crate::MpvError::RenderingUnsupported)
    /// from engine creation, or [`MpvError::Command`](crate::MpvError::Command)
    /// if the engine refuses to observe a property.
    pub fn new<F>(factory: F, config: BridgeConfig, dispatcher: Dispatcher) -> Result<Arc<Self>>
    where
        F: FnOnce() -> Option<Arc<dyn Engine>>,
    {
        let engine = EngineHandle::create(factory, &config)?;
        let registry = PropertyRegistry::new();
        registry.observe_all(&engine)?;

        let object = Arc::new(Self {
            affinity: ThreadAffinity::current(),
            registry,
            lifecycle: LifecycleSignals::default(),
            playback: Playback::new(engine.clone()),
            enable_audio: Property::new(config.enable_audio),
            enable_audio_changed: Signal::new(),
            render: Arc::new(RenderHooks::new(engine.clone())),
            frame_relay: CoalescedPost::new(dispatcher.clone()),
            events: EventPump::new(engine.clone(), dispatcher),
            engine,
        });
        object.connect_internal();

        tracing::info!(target: targets::ENGINE, "mpv object created");
        Ok(object)
    }

    fn connect_internal(self: &Arc<Self>) {
        let props = self.registry.properties();
        for changed in [props.idle_changed(), props.paused_changed()] {
            let weak = Arc::downgrade(self);
            changed.connect(move |_| {
                if let Some(object) = weak.upgrade() {
                    object.playback.update_state(object.registry.properties());
                }
            });
        }

        let render: Weak<RenderHooks> = Arc::downgrade(&self.render);
        let relay = self.frame_relay.clone();
        self.engine
            .render_api()
            .set_update_callback(Some(Box::new(move || {
                let render = render.clone();
                relay.post(move || {
                    if let Some(render) = render.upgrade() {
                        render.request_window_update();
                    }
                });
            })));

        // Last, so no drain can run against a half-wired object.
        let weak = Arc::downgrade(self);
        self.events.install(move || {
            if let Some(object) = weak.upgrade() {
                object.process_engine_events();
            }
        });
    }

    /// Drain the engine's event queue now. Returns how many events were handled.
    ///
    /// Normally invoked through the dispatcher after a wake-up.
    pub fn process_engine_events(&self) -> usize {
        self.affinity
            .debug_assert_same_thread_with_msg("engine events must be processed on the owner thread");
        self.events.drain(&self.registry, &self.lifecycle)
    }

    /// Current event pump state.
    pub fn pump_state(&self) -> PumpState {
        self.events.state()
    }

    /// Bind to a new host window. `None` is ignored.
    pub fn handle_window_changed(&self, window: Option<Arc<dyn HostWindow>>) {
        if let Some(window) = window {
            self.render.attach_window(&window);
        }
    }

    /// Hooks for the host window's render thread.
    pub fn render_hooks(&self) -> &Arc<RenderHooks> {
        &self.render
    }

    /// Rebuild the render object on the next frame without stopping playback.
    pub fn reinit_renderer(&self) {
        if let Err(err) = self
            .engine
            .set_option("stop-playback-on-init-failure", &PropertyValue::Flag(false))
        {
            tracing::warn!(target: targets::RENDER, %err, "could not keep playback alive across reinit");
        }
        self.render.request_reinit();
        self.render.request_window_update();
    }

    /// Cached values of every watched property.
    pub fn properties(&self) -> &MediaProperties {
        self.registry.properties()
    }

    /// File lifecycle notifications.
    pub fn lifecycle(&self) -> &LifecycleSignals {
        &self.lifecycle
    }

    /// Whether a file is loaded and not paused.
    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Emitted when [`is_playing`](Self::is_playing) flips.
    pub fn is_playing_changed(&self) -> &Signal<bool> {
        self.playback.is_playing_changed()
    }

    /// Resume playback, reloading the current playlist entry if the engine is idle.
    pub fn play(&self) {
        self.affinity.debug_assert_same_thread();
        self.playback.play(self.properties());
    }

    /// Pause playback.
    pub fn pause(&self) {
        self.affinity.debug_assert_same_thread();
        self.playback.pause();
    }

    /// Toggle between playing and paused.
    pub fn play_pause(&self) {
        self.affinity.debug_assert_same_thread();
        self.playback.play_pause(self.properties());
    }

    /// Seek to `position` seconds from the start.
    pub fn seek(&self, position: f64) {
        self.playback.seek(position);
    }

    /// Play `target`, a path or URL, replacing the playlist.
    pub fn load_file(&self, target: &str) {
        self.playback.load_file(target);
    }

    /// Replace the playlist with `targets` and start the first.
    pub fn load_files<S: AsRef<str>>(&self, targets: &[S]) {
        self.playback.load_files(targets);
    }

    /// Set the engine volume, in percent.
    pub fn set_volume(&self, volume: i64) {
        self.set_or_warn("volume", volume);
    }

    /// Mute or unmute audio output.
    pub fn set_muted(&self, muted: bool) {
        self.set_or_warn("mute", muted);
    }

    /// Jump to the playlist entry at `pos`.
    pub fn set_playlist_pos(&self, pos: i64) {
        self.set_or_warn("playlist-pos", pos);
    }

    /// Whether audio output is enabled.
    pub fn enable_audio(&self) -> bool {
        self.enable_audio.get()
    }

    /// Enable or disable audio output. Disabling routes audio to the null
    /// driver; re-enabling takes effect for the next engine only.
    pub fn set_enable_audio(&self, enable: bool) {
        if !self.enable_audio.set(enable) {
            return;
        }
        if !enable {
            if let Err(err) = self.engine.set_option("ao", &PropertyValue::from("null")) {
                tracing::warn!(target: targets::ENGINE, %err, "could not disable audio output");
            }
        }
        self.enable_audio_changed.emit(enable);
    }

    /// Emitted when [`enable_audio`](Self::enable_audio) changes.
    pub fn enable_audio_changed(&self) -> &Signal<bool> {
        &self.enable_audio_changed
    }

    /// Run an arbitrary engine command.
    pub fn command(&self, args: &[PropertyValue]) -> Result<()> {
        self.engine.command(args)
    }

    /// Write an arbitrary engine property.
    pub fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.engine.set_property(name, value)
    }

    /// Read an arbitrary engine property.
    pub fn get_property(&self, name: &str) -> Result<PropertyValue> {
        self.engine.get_property(name)
    }

    /// Set a runtime engine option.
    pub fn set_option(&self, name: &str, value: &PropertyValue) -> Result<()> {
        self.engine.set_option(name, value)
    }

    /// File name of playlist entry `index`.
    pub fn playlist_filename(&self, index: usize) -> Result<String> {
        self.get_as(&format!("playlist/{index}/filename"))
    }

    /// Title of playlist entry `index`, if the playlist provided one.
    pub fn playlist_title(&self, index: usize) -> Result<String> {
        self.get_as(&format!("playlist/{index}/title"))
    }

    /// Title of chapter `index`.
    pub fn chapter_title(&self, index: usize) -> Result<String> {
        self.get_as(&format!("chapter-list/{index}/title"))
    }

    /// Start time of chapter `index` in seconds.
    pub fn chapter_time(&self, index: usize) -> Result<f64> {
        self.get_as(&format!("chapter-list/{index}/time"))
    }

    fn get_as<T: WatchedType>(&self, name: &str) -> Result<T> {
        self.engine.get_property_as(name)
    }

    fn set_or_warn(&self, name: &str, value: impl Into<PropertyValue>) {
        if let Err(err) = self.engine.set_property(name, value) {
            tracing::warn!(target: targets::ENGINE, name, %err, "could not set property");
        }
    }
}

impl Drop for MpvObject {
    fn drop(&mut self) {
        self.engine.render_api().set_update_callback(None);
        self.events.uninstall();
        tracing::debug!(target: targets::ENGINE, "mpv object destroyed");
    }
}

impl fmt::Debug for MpvObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpvObject")
            .field("is_playing", &self.is_playing())
            .field("events", &self.events)
            .field("render", &self.render)
            .field("properties", &self.registry.properties())
            .finish()
    }
}

static_assertions::assert_impl_all!(MpvObject: Send, Sync);
