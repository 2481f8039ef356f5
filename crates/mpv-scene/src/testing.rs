//! In-memory stand-ins for the engine and the host window.
//!
//! [`ScriptedEngine`] records every call made on it, serves events from a
//! queue the test fills, and echoes writes to observed properties back as
//! property-change events, the way a real engine does. [`FakeWindow`] counts
//! the calls the render hooks make on it.

use std::collections::{HashMap, VecDeque};
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::{
    Engine, EngineError, EngineEvent, EngineResult, GpuContext, RenderApi, UpdateCallback,
    WakeupCallback,
};
use crate::render::HostWindow;
use crate::value::{PropertyKind, PropertyValue};

type SharedCallback = Arc<dyn Fn() + Send + Sync>;

/// A call made on a [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetOption(String, String),
    Initialize,
    Command(Vec<PropertyValue>),
    SetProperty(String, PropertyValue),
    Observe(String, PropertyKind),
    RequestLogMessages(String),
}

#[derive(Default)]
struct ScriptState {
    calls: Vec<EngineCall>,
    events: VecDeque<EngineEvent>,
    properties: HashMap<String, PropertyValue>,
    observed: HashMap<String, PropertyKind>,
    fail_initialize: bool,
    reject_commands: bool,
}

/// An engine driven entirely by the test.
pub struct ScriptedEngine {
    state: Mutex<ScriptState>,
    wakeup: Mutex<Option<SharedCallback>>,
    wakeups: AtomicUsize,
    render: Arc<ScriptedRenderApi>,
    has_render_api: bool,
}

impl ScriptedEngine {
    /// An engine with a render sub-API.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    /// An engine built without the render sub-API.
    pub fn without_render_api() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    fn build(has_render_api: bool) -> Self {
        Self {
            state: Mutex::new(ScriptState::default()),
            wakeup: Mutex::new(None),
            wakeups: AtomicUsize::new(0),
            render: Arc::new(ScriptedRenderApi::default()),
            has_render_api,
        }
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    /// Only the commands, oldest first.
    pub fn commands(&self) -> Vec<Vec<PropertyValue>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Command(args) => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Properties registered for observation, with their requested formats.
    pub fn observed(&self) -> HashMap<String, PropertyKind> {
        self.state.lock().observed.clone()
    }

    /// Make the next [`Engine::initialize`] fail.
    pub fn fail_initialize(&self) {
        self.state.lock().fail_initialize = true;
    }

    /// Make commands and property writes fail.
    pub fn reject_commands(&self, reject: bool) {
        self.state.lock().reject_commands = reject;
    }

    /// Set a property's value without producing an event.
    pub fn seed_property(&self, name: &str, value: PropertyValue) {
        self.state.lock().properties.insert(name.to_string(), value);
    }

    /// Queue an event and fire the wake-up callback.
    pub fn push_event(&self, event: EngineEvent) {
        self.state.lock().events.push_back(event);
        self.wake();
    }

    /// Queue several events and fire the wake-up callback once per event.
    pub fn push_events(&self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            self.push_event(event);
        }
    }

    /// Change a property as if playback did it, queueing the change event.
    pub fn push_property(&self, name: &str, value: impl Into<PropertyValue>) {
        let value = value.into();
        self.seed_property(name, value.clone());
        self.push_event(EngineEvent::PropertyChange {
            name: name.to_string(),
            value: Some(value),
        });
    }

    /// Events not yet taken.
    pub fn pending_events(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Whether a wake-up callback is installed.
    pub fn has_wakeup_callback(&self) -> bool {
        self.wakeup.lock().is_some()
    }

    /// How many times the wake-up callback has fired.
    pub fn wakeup_count(&self) -> usize {
        self.wakeups.load(Ordering::SeqCst)
    }

    /// Fire the wake-up callback, if installed. Never called with a lock held.
    pub fn wake(&self) {
        let callback = self.wakeup.lock().clone();
        if let Some(callback) = callback {
            self.wakeups.fetch_add(1, Ordering::SeqCst);
            callback();
        }
    }

    /// The render sub-API, whether or not the engine exposes it.
    pub fn render(&self) -> Arc<ScriptedRenderApi> {
        self.render.clone()
    }
}

impl Engine for ScriptedEngine {
    fn set_option_string(&self, name: &str, value: &str) -> EngineResult<()> {
        self.state
            .lock()
            .calls
            .push(EngineCall::SetOption(name.to_string(), value.to_string()));
        Ok(())
    }

    fn initialize(&self) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::Initialize);
        if state.fail_initialize {
            return Err(EngineError::new(-1, "initialization failed"));
        }
        Ok(())
    }

    fn command(&self, args: &[PropertyValue]) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::Command(args.to_vec()));
        if state.reject_commands {
            return Err(EngineError::new(-12, "error running command"));
        }
        Ok(())
    }

    fn set_property(&self, name: &str, value: &PropertyValue) -> EngineResult<()> {
        let echoed = {
            let mut state = self.state.lock();
            state
                .calls
                .push(EngineCall::SetProperty(name.to_string(), value.clone()));
            if state.reject_commands {
                return Err(EngineError::new(-9, "property not settable"));
            }
            let previous = state.properties.insert(name.to_string(), value.clone());
            let changed = previous.as_ref() != Some(value);
            if changed && state.observed.contains_key(name) {
                state.events.push_back(EngineEvent::PropertyChange {
                    name: name.to_string(),
                    value: Some(value.clone()),
                });
                true
            } else {
                false
            }
        };
        if echoed {
            self.wake();
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> EngineResult<PropertyValue> {
        self.state
            .lock()
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::new(-10, "property unavailable"))
    }

    fn observe_property(&self, name: &str, kind: PropertyKind) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(EngineCall::Observe(name.to_string(), kind));
        state.observed.insert(name.to_string(), kind);
        Ok(())
    }

    fn request_log_messages(&self, min_level: &str) -> EngineResult<()> {
        self.state
            .lock()
            .calls
            .push(EngineCall::RequestLogMessages(min_level.to_string()));
        Ok(())
    }

    fn wait_event(&self, _timeout: Duration) -> EngineEvent {
        self.state
            .lock()
            .events
            .pop_front()
            .unwrap_or(EngineEvent::None)
    }

    fn set_wakeup_callback(&self, callback: Option<WakeupCallback>) {
        *self.wakeup.lock() = callback.map(Arc::from);
    }

    fn render_api(&self) -> Option<Arc<dyn RenderApi>> {
        if self.has_render_api {
            Some(self.render.clone() as Arc<dyn RenderApi>)
        } else {
            None
        }
    }
}

/// A call made on a [`ScriptedRenderApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCall {
    InitGl,
    Draw { fbo: u32, width: i32, height: i32 },
    ReportFlip(u32),
    UninitGl,
}

/// Render sub-API of a [`ScriptedEngine`].
#[derive(Default)]
pub struct ScriptedRenderApi {
    calls: Mutex<Vec<RenderCall>>,
    gl_threads: Mutex<Vec<(RenderCall, ThreadId)>>,
    update: Mutex<Option<SharedCallback>>,
    fail_init_gl: AtomicBool,
}

impl ScriptedRenderApi {
    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    /// Successful `init_gl` calls.
    pub fn init_count(&self) -> usize {
        self.count(RenderCall::InitGl)
    }

    /// `uninit_gl` calls.
    pub fn uninit_count(&self) -> usize {
        self.count(RenderCall::UninitGl)
    }

    fn record_gl(&self, call: RenderCall) {
        self.calls.lock().push(call);
        self.gl_threads.lock().push((call, thread::current().id()));
    }

    fn count(&self, wanted: RenderCall) -> usize {
        self.calls.lock().iter().filter(|c| **c == wanted).count()
    }

    /// The thread each `init_gl` and `uninit_gl` ran on, oldest first.
    pub fn gl_threads(&self) -> Vec<(RenderCall, ThreadId)> {
        self.gl_threads.lock().clone()
    }

    /// Make `init_gl` fail.
    pub fn fail_init_gl(&self, fail: bool) {
        self.fail_init_gl.store(fail, Ordering::SeqCst);
    }

    /// Whether a frame-ready callback is installed.
    pub fn has_update_callback(&self) -> bool {
        self.update.lock().is_some()
    }

    /// Announce a new frame through the update callback, if installed.
    pub fn frame_ready(&self) {
        let callback = self.update.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl RenderApi for ScriptedRenderApi {
    fn init_gl(&self, context: &dyn GpuContext) -> EngineResult<()> {
        if self.fail_init_gl.load(Ordering::SeqCst) {
            return Err(EngineError::new(-18, "unsupported GPU context"));
        }
        // A real renderer resolves its entry points here.
        let _ = context.get_proc_address("glGetString");
        self.record_gl(RenderCall::InitGl);
        Ok(())
    }

    fn draw(&self, fbo: u32, width: i32, height: i32) -> EngineResult<()> {
        self.calls.lock().push(RenderCall::Draw { fbo, width, height });
        Ok(())
    }

    fn report_flip(&self, fbo: u32) {
        self.calls.lock().push(RenderCall::ReportFlip(fbo));
    }

    fn uninit_gl(&self) {
        self.record_gl(RenderCall::UninitGl);
    }

    fn set_update_callback(&self, callback: Option<UpdateCallback>) {
        *self.update.lock() = callback.map(Arc::from);
    }
}

/// A GPU context that resolves nothing.
#[derive(Debug, Default)]
pub struct FakeGpuContext;

impl GpuContext for FakeGpuContext {
    fn get_proc_address(&self, _name: &str) -> *const c_void {
        std::ptr::null()
    }
}

/// A host window that records what the render hooks do to it.
pub struct FakeWindow {
    size: Mutex<(u32, u32)>,
    ratio: Mutex<f64>,
    context: Mutex<Option<Arc<FakeGpuContext>>>,
    resets: AtomicUsize,
    updates: AtomicUsize,
    clear: Mutex<Option<bool>>,
}

impl FakeWindow {
    /// A window of the given logical size with a current GPU context.
    pub fn new(width: u32, height: u32, device_pixel_ratio: f64) -> Arc<Self> {
        Arc::new(Self {
            size: Mutex::new((width, height)),
            ratio: Mutex::new(device_pixel_ratio),
            context: Mutex::new(Some(Arc::new(FakeGpuContext))),
            resets: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            clear: Mutex::new(None),
        })
    }

    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
    }

    pub fn set_device_pixel_ratio(&self, ratio: f64) {
        *self.ratio.lock() = ratio;
    }

    /// Make the GPU context unavailable.
    pub fn lose_context(&self) {
        *self.context.lock() = None;
    }

    /// Number of GPU state resets.
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Number of frame requests.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// The last value passed to `set_clear_before_rendering`.
    pub fn clear_before_rendering(&self) -> Option<bool> {
        *self.clear.lock()
    }
}

impl HostWindow for FakeWindow {
    fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    fn device_pixel_ratio(&self) -> f64 {
        *self.ratio.lock()
    }

    fn current_gpu_context(&self) -> Option<Arc<dyn GpuContext>> {
        self.context
            .lock()
            .clone()
            .map(|context| context as Arc<dyn GpuContext>)
    }

    fn reset_gpu_state(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn request_update(&self) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn set_clear_before_rendering(&self, clear: bool) {
        *self.clear.lock() = Some(clear);
    }
}
