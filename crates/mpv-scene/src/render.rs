//! Render object lifecycle.
//!
//! The host window owns a render thread and calls into the bridge at fixed
//! synchronization points. [`RenderHooks`] is what it calls:
//!
//! | host hook           | method                       | effect                                    |
//! |---------------------|------------------------------|-------------------------------------------|
//! | before synchronize  | [`RenderHooks::sync`]        | create the render object, record its size |
//! | before rendering    | [`RenderHooks::paint`]       | engine draws into framebuffer 0           |
//! | frame swapped       | [`RenderHooks::swapped`]     | engine is told the frame was presented    |
//! | scene invalidated   | [`RenderHooks::cleanup`]     | render object is destroyed                |
//!
//! All four are synchronous and must be invoked directly from the hook, never
//! deferred. The render object itself (`Renderer`) only exists between a
//! successful `sync` and the next `cleanup` or consumed reinit request, and is
//! only touched from inside these calls. Dropping the hooks while it exists
//! leaks the engine's GPU binding rather than releasing it off the render
//! thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use mpv_scene_core::logging::targets;
use parking_lot::{Mutex, RwLock};

use crate::engine::{EngineHandle, GpuContext};
use crate::error::{MpvError, Result};

/// The window hosting the scene graph the video is drawn into.
///
/// Implemented by the windowing integration. Methods are called from the UI
/// thread and from the render thread.
pub trait HostWindow: Send + Sync {
    /// Logical size of the window.
    fn size(&self) -> (u32, u32);

    /// Physical pixels per logical pixel.
    fn device_pixel_ratio(&self) -> f64;

    /// The GPU context current on the calling (render) thread, if any.
    fn current_gpu_context(&self) -> Option<Arc<dyn GpuContext>>;

    /// Restore the GPU state the window's own renderer expects.
    fn reset_gpu_state(&self);

    /// Schedule a new frame.
    fn request_update(&self);

    /// Whether the window clears the framebuffer before rendering its scene.
    fn set_clear_before_rendering(&self, clear: bool);
}

/// Size of the render target in physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelSize {
    pub width: i32,
    pub height: i32,
}

impl PixelSize {
    /// Scale a logical size by a device pixel ratio, rounding to whole pixels.
    pub fn scaled((width, height): (u32, u32), ratio: f64) -> Self {
        Self {
            width: (f64::from(width) * ratio).round() as i32,
            height: (f64::from(height) * ratio).round() as i32,
        }
    }
}

/// Where the render object is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// No render object exists.
    Unbound,
    /// A render object is bound to the window's GPU context.
    Bound,
    /// The render object is drawing a frame.
    Painting,
}

/// The engine's GPU binding for one window.
struct Renderer {
    /// Keeps the engine alive until `uninit_gl` has run.
    engine: EngineHandle,
    window: Weak<dyn HostWindow>,
    size: PixelSize,
}

impl Renderer {
    fn new(engine: EngineHandle, window: &Arc<dyn HostWindow>) -> Result<Self> {
        // Looked up fresh and dropped on return: the context belongs to the window.
        let context = window
            .current_gpu_context()
            .ok_or_else(|| MpvError::RenderInit("no GPU context is current".into()))?;

        engine
            .render_api()
            .init_gl(context.as_ref())
            .map_err(|err| MpvError::RenderInit(err.to_string()))?;

        Ok(Self {
            engine,
            window: Arc::downgrade(window),
            size: PixelSize::default(),
        })
    }

    fn paint(&self) {
        let Some(window) = self.window.upgrade() else {
            return;
        };

        window.reset_gpu_state();

        // Framebuffer 0 is the window's default framebuffer. The engine's
        // vertical axis is inverted relative to it, hence the negated height.
        if let Err(err) = self
            .engine
            .render_api()
            .draw(0, self.size.width, -self.size.height)
        {
            tracing::warn!(target: targets::RENDER, %err, "engine failed to draw frame");
        }

        window.reset_gpu_state();
    }

    /// Unbind the engine from the window's GPU context. Must run on the
    /// render thread that created the binding.
    fn release(self) {
        self.engine.render_api().uninit_gl();
        tracing::debug!(target: targets::RENDER, "render object destroyed");
    }
}

/// Entry points the host window calls from its render-thread hooks.
///
/// Shared between the UI thread (which attaches the window and requests
/// reinitialization) and the render thread (which drives the lifecycle).
pub struct RenderHooks {
    engine: EngineHandle,
    window: RwLock<Option<Weak<dyn HostWindow>>>,
    renderer: Mutex<Option<Renderer>>,
    reinit: AtomicBool,
    bound: AtomicBool,
    painting: AtomicBool,
}

impl RenderHooks {
    pub(crate) fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            window: RwLock::new(None),
            renderer: Mutex::new(None),
            reinit: AtomicBool::new(false),
            bound: AtomicBool::new(false),
            painting: AtomicBool::new(false),
        }
    }

    /// Bind to a host window. The engine paints the whole frame, so the window
    /// is told not to clear before rendering.
    pub fn attach_window(&self, window: &Arc<dyn HostWindow>) {
        window.set_clear_before_rendering(false);
        *self.window.write() = Some(Arc::downgrade(window));
        tracing::debug!(target: targets::RENDER, "attached to host window");
    }

    /// The bound window, if it is still alive.
    pub fn window(&self) -> Option<Arc<dyn HostWindow>> {
        self.window.read().as_ref().and_then(Weak::upgrade)
    }

    /// Pre-synchronize hook.
    ///
    /// Consumes a pending reinit request by destroying the current render
    /// object, creates one if none exists, and records the window's size in
    /// physical pixels. Does nothing until a window is attached.
    ///
    /// # Errors
    ///
    /// [`MpvError::RenderInit`] if no GPU context is current or the engine
    /// cannot bind to it. The host should treat this as fatal.
    pub fn sync(&self) -> Result<()> {
        if self.reinit.swap(false, Ordering::AcqRel) {
            tracing::info!(target: targets::RENDER, "reinitializing renderer");
            self.cleanup();
        }

        let Some(window) = self.window() else {
            return Ok(());
        };

        let mut slot = self.renderer.lock();
        if slot.is_none() {
            *slot = Some(Renderer::new(self.engine.clone(), &window)?);
            self.bound.store(true, Ordering::Release);
            tracing::debug!(target: targets::RENDER, "render object created");
        }

        if let Some(renderer) = slot.as_mut() {
            renderer.window = Arc::downgrade(&window);
            renderer.size = PixelSize::scaled(window.size(), window.device_pixel_ratio());
        }
        Ok(())
    }

    /// Pre-render hook: draw the current video frame.
    pub fn paint(&self) {
        let slot = self.renderer.lock();
        if let Some(renderer) = slot.as_ref() {
            self.painting.store(true, Ordering::Release);
            renderer.paint();
            self.painting.store(false, Ordering::Release);
        }
    }

    /// Post-swap hook: tell the engine framebuffer 0 has been presented.
    pub fn swapped(&self) {
        self.engine.render_api().report_flip(0);
    }

    /// Scene-invalidated hook: destroy the render object, if any.
    pub fn cleanup(&self) {
        let renderer = self.renderer.lock().take();
        if let Some(renderer) = renderer {
            self.bound.store(false, Ordering::Release);
            renderer.release();
        }
    }

    /// Ask the next [`sync`](Self::sync) to rebuild the render object.
    pub fn request_reinit(&self) {
        self.reinit.store(true, Ordering::Release);
    }

    /// Whether a reinit request is waiting for the next sync.
    pub fn reinit_pending(&self) -> bool {
        self.reinit.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RenderState {
        if self.painting.load(Ordering::Acquire) {
            RenderState::Painting
        } else if self.bound.load(Ordering::Acquire) {
            RenderState::Bound
        } else {
            RenderState::Unbound
        }
    }

    /// The size recorded at the last sync, while a render object exists.
    pub fn target_size(&self) -> Option<PixelSize> {
        self.renderer.lock().as_ref().map(|r| r.size)
    }

    pub(crate) fn request_window_update(&self) {
        if let Some(window) = self.window() {
            window.request_update();
        }
    }
}

impl Drop for RenderHooks {
    fn drop(&mut self) {
        // The binding may only be torn down from a render-thread hook.
        if self.renderer.get_mut().take().is_some() {
            tracing::warn!(
                target: targets::RENDER,
                "render object still bound at shutdown; GPU resources not released"
            );
        }
    }
}

impl fmt::Debug for RenderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHooks")
            .field("state", &self.state())
            .field("reinit_pending", &self.reinit_pending())
            .finish()
    }
}
