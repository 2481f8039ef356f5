//! Core primitives for mpv-scene.
//!
//! This crate provides the building blocks the engine bridge is written on top of:
//!
//! - **Signals**: Type-safe change notifications with connect/disconnect
//! - **Properties**: Change-detecting value cells paired with signals
//! - **Dispatch**: A thread-safe queue of deferred closures drained by its owner thread
//! - **Coalesced posts**: At most one pending request per slot, safe to raise from any thread
//! - **Thread affinity**: Debug checks that state is touched from the thread that owns it
//!
//! # Property Example
//!
//! ```
//! use mpv_scene_core::{Property, Signal};
//!
//! struct Volume {
//!     value: Property<i64>,
//!     value_changed: Signal<i64>,
//! }
//!
//! impl Volume {
//!     fn set(&self, value: i64) {
//!         if self.value.set(value) {
//!             self.value_changed.emit(value);
//!         }
//!     }
//! }
//!
//! let volume = Volume { value: Property::new(100), value_changed: Signal::new() };
//! volume.value_changed.connect(|v| println!("volume is now {v}"));
//! volume.set(80);
//! volume.set(80); // no notification, value did not change
//! ```
//!
//! # Dispatch Example
//!
//! ```
//! use mpv_scene_core::{CoalescedPost, DispatchQueue};
//!
//! let queue = DispatchQueue::new();
//! let relay = CoalescedPost::new(queue.dispatcher());
//!
//! // Any thread may raise the request; duplicates collapse into one task.
//! let worker = std::thread::spawn(move || {
//!     for _ in 0..10 {
//!         relay.post(|| println!("drain"));
//!     }
//! });
//! worker.join().unwrap();
//!
//! // The owner thread runs whatever is pending.
//! assert_eq!(queue.process_pending(), 1);
//! ```

mod dispatch;
mod error;
pub mod logging;
pub mod property;
pub mod signal;
pub mod thread_check;

pub use dispatch::{CoalescedPost, DispatchQueue, Dispatcher};
pub use error::{CoreError, Result};
pub use property::Property;
pub use signal::{ConnectionId, Signal};
pub use thread_check::ThreadAffinity;
