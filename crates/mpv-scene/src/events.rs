//! The event pump: engine wake-ups in, typed notifications out.
//!
//! The engine calls its wake-up callback from a thread of its own whenever
//! events are queued. That callback does exactly one thing: raise a coalesced
//! drain request on the owner thread's dispatcher. When the owner thread gets
//! to it, [`EventPump::drain`] polls the engine without blocking until its
//! queue is empty and dispatches each event in order.
//!
//! ```text
//!   engine thread            owner thread
//!   ─────────────            ────────────
//!   wakeup() ──post──▶ [drain pending] ──▶ drain(): poll, dispatch, poll, ... none
//!   wakeup() ──(coalesced)
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mpv_scene_core::logging::targets;
use mpv_scene_core::{CoalescedPost, Dispatcher, Signal};

use crate::engine::{EndFileReason, EngineEvent, EngineHandle};
use crate::properties::PropertyRegistry;

/// File lifecycle notifications.
#[derive(Debug, Default)]
pub struct LifecycleSignals {
    file_started: Signal<()>,
    file_ended: Signal<EndFileReason>,
    file_loaded: Signal<()>,
}

impl LifecycleSignals {
    /// A file is about to be opened.
    pub fn file_started(&self) -> &Signal<()> {
        &self.file_started
    }

    /// Playback of a file ended, with the reason.
    pub fn file_ended(&self) -> &Signal<EndFileReason> {
        &self.file_ended
    }

    /// A file was opened and playback is starting.
    pub fn file_loaded(&self) -> &Signal<()> {
        &self.file_loaded
    }
}

/// Where the pump is between wake-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Nothing requested.
    Idle,
    /// A drain has been posted and not yet started.
    DrainRequested,
    /// A drain is running on the owner thread.
    Draining,
}

pub(crate) struct EventPump {
    engine: EngineHandle,
    relay: CoalescedPost,
    draining: AtomicBool,
}

impl EventPump {
    pub(crate) fn new(engine: EngineHandle, dispatcher: Dispatcher) -> Self {
        Self {
            engine,
            relay: CoalescedPost::new(dispatcher),
            draining: AtomicBool::new(false),
        }
    }

    /// Register the engine wake-up callback. `drain` runs on the owner thread.
    pub(crate) fn install<F>(&self, drain: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let relay = self.relay.clone();
        let drain = Arc::new(drain);
        self.engine.set_wakeup_callback(Some(Box::new(move || {
            let drain = Arc::clone(&drain);
            relay.post(move || drain());
        })));
        tracing::debug!(target: targets::EVENTS, "wake-up callback installed");
    }

    pub(crate) fn uninstall(&self) {
        self.engine.set_wakeup_callback(None);
    }

    pub(crate) fn state(&self) -> PumpState {
        if self.draining.load(Ordering::Acquire) {
            PumpState::Draining
        } else if self.relay.is_pending() {
            PumpState::DrainRequested
        } else {
            PumpState::Idle
        }
    }

    /// Take and dispatch every pending event. Returns how many were handled.
    ///
    /// Re-entrant calls (a slot draining from inside a notification) return 0;
    /// the outer drain picks up whatever arrives meanwhile.
    pub(crate) fn drain(&self, registry: &PropertyRegistry, lifecycle: &LifecycleSignals) -> usize {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            return 0;
        };
        let _span = tracing::trace_span!(target: targets::EVENTS, "drain").entered();

        let mut handled = 0;
        while let Some(event) = self.engine.poll_event(Duration::ZERO) {
            dispatch(event, registry, lifecycle);
            handled += 1;
        }

        tracing::trace!(target: targets::EVENTS, handled, "drain finished");
        handled
    }
}

/// Holds the draining flag for one drain. Released on drop, including when a
/// slot unwinds out of the loop.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl fmt::Debug for EventPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPump")
            .field("state", &self.state())
            .finish()
    }
}

fn dispatch(event: EngineEvent, registry: &PropertyRegistry, lifecycle: &LifecycleSignals) {
    match event {
        EngineEvent::StartFile => lifecycle.file_started.emit(()),
        EngineEvent::EndFile { reason } => {
            let reason = EndFileReason::from_code(reason);
            tracing::debug!(target: targets::EVENTS, %reason, "file ended");
            lifecycle.file_ended.emit(reason);
        }
        EngineEvent::FileLoaded => lifecycle.file_loaded.emit(()),
        EngineEvent::PropertyChange { name, value } => {
            let props = registry.properties();
            match (name.as_str(), value.as_ref()) {
                ("time-pos", Some(value)) => {
                    props.set_position(value);
                }
                ("duration", Some(value)) => {
                    props.set_duration(value);
                }
                (name, value) => {
                    registry.apply(name, value);
                }
            }
        }
        EngineEvent::LogMessage {
            prefix,
            level,
            text,
        } => forward_log(&prefix, &level, text.trim_end()),
        EngineEvent::None | EngineEvent::Shutdown | EngineEvent::Other(_) => {}
    }
}

fn forward_log(prefix: &str, level: &str, text: &str) {
    match level {
        "fatal" | "error" => tracing::error!(target: targets::ENGINE_LOG, prefix, "{text}"),
        "warn" => tracing::warn!(target: targets::ENGINE_LOG, prefix, "{text}"),
        "info" => tracing::info!(target: targets::ENGINE_LOG, prefix, "{text}"),
        "v" | "debug" => tracing::debug!(target: targets::ENGINE_LOG, prefix, "{text}"),
        _ => tracing::trace!(target: targets::ENGINE_LOG, prefix, "{text}"),
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use parking_lot::Mutex;

    use super::*;
    use crate::config::BridgeConfig;
    use crate::engine::Engine;
    use crate::testing::ScriptedEngine;
    use crate::value::PropertyValue;
    use mpv_scene_core::DispatchQueue;

    fn pump() -> (Arc<ScriptedEngine>, DispatchQueue, EventPump) {
        let engine = ScriptedEngine::new();
        let handle =
            EngineHandle::create(|| Some(engine.clone() as Arc<dyn Engine>), &BridgeConfig::default())
                .unwrap();
        let queue = DispatchQueue::new();
        let pump = EventPump::new(handle, queue.dispatcher());
        (engine, queue, pump)
    }

    #[test]
    fn test_drain_empties_queue_in_order() {
        let (engine, _queue, pump) = pump();
        let registry = PropertyRegistry::new();
        let lifecycle = LifecycleSignals::default();

        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        lifecycle.file_started().connect(move |_| o.lock().push("started"));
        let o = order.clone();
        lifecycle.file_loaded().connect(move |_| o.lock().push("loaded"));
        let o = order.clone();
        registry
            .properties()
            .media_title_changed()
            .connect(move |_| o.lock().push("title"));

        engine.push_events([
            EngineEvent::StartFile,
            EngineEvent::PropertyChange {
                name: "media-title".into(),
                value: Some(PropertyValue::from("clip")),
            },
            EngineEvent::FileLoaded,
        ]);

        assert_eq!(pump.drain(&registry, &lifecycle), 3);
        assert_eq!(*order.lock(), vec!["started", "title", "loaded"]);
        assert_eq!(engine.pending_events(), 0);
        assert_eq!(pump.drain(&registry, &lifecycle), 0);
    }

    #[test]
    fn test_end_file_reason_is_decoded() {
        let (engine, _queue, pump) = pump();
        let registry = PropertyRegistry::new();
        let lifecycle = LifecycleSignals::default();
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let r = reasons.clone();
        lifecycle.file_ended().connect(move |reason| r.lock().push(*reason));

        engine.push_events([
            EngineEvent::EndFile { reason: 4 },
            EngineEvent::EndFile { reason: 42 },
        ]);
        pump.drain(&registry, &lifecycle);

        assert_eq!(
            *reasons.lock(),
            vec![EndFileReason::Error, EndFileReason::Unknown]
        );
    }

    #[test]
    fn test_unhandled_events_are_consumed() {
        let (engine, _queue, pump) = pump();
        let registry = PropertyRegistry::new();
        let lifecycle = LifecycleSignals::default();

        engine.push_events([
            EngineEvent::Other(17),
            EngineEvent::LogMessage {
                prefix: "ffmpeg".into(),
                level: "warn".into(),
                text: "stream 1: discarding\n".into(),
            },
            EngineEvent::Shutdown,
        ]);
        assert_eq!(pump.drain(&registry, &lifecycle), 3);
    }

    #[test]
    fn test_wakeups_coalesce_into_one_drain() {
        let (engine, queue, pump) = pump();
        let drains = Arc::new(Mutex::new(0));
        let d = drains.clone();
        pump.install(move || *d.lock() += 1);

        engine.wake();
        engine.wake();
        engine.wake();
        assert_eq!(pump.state(), PumpState::DrainRequested);

        assert_eq!(queue.process_pending(), 1);
        assert_eq!(*drains.lock(), 1);
        assert_eq!(pump.state(), PumpState::Idle);
    }

    #[test]
    fn test_panicking_slot_does_not_wedge_pump() {
        let (engine, _queue, pump) = pump();
        let registry = PropertyRegistry::new();
        let lifecycle = LifecycleSignals::default();
        lifecycle.file_loaded().connect(|_| panic!("slot failed"));

        engine.push_event(EngineEvent::FileLoaded);
        let result = panic::catch_unwind(AssertUnwindSafe(|| pump.drain(&registry, &lifecycle)));
        assert!(result.is_err());
        assert_eq!(pump.state(), PumpState::Idle);

        engine.push_property("volume", 42i64);
        assert_eq!(pump.drain(&registry, &lifecycle), 1);
        assert_eq!(registry.properties().volume(), 42);
    }

    #[test]
    fn test_uninstall_clears_callback() {
        let (engine, _queue, pump) = pump();
        pump.install(|| {});
        assert!(engine.has_wakeup_callback());
        pump.uninstall();
        assert!(!engine.has_wakeup_callback());
    }
}
