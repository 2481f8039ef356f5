//! Signal/slot notifications.
//!
//! A [`Signal<Args>`] holds any number of connected slots (closures). Emitting
//! the signal calls every slot, in connection order, on the emitting thread.
//! Cross-thread delivery is not the signal's job: state owned by the UI thread
//! is only ever emitted from the UI thread, and foreign threads reach it by
//! posting through a [`crate::Dispatcher`].
//!
//! # Example
//!
//! ```
//! use mpv_scene_core::Signal;
//!
//! let title_changed = Signal::<String>::new();
//! let id = title_changed.connect(|title| println!("now playing: {title}"));
//!
//! title_changed.emit("Big Buck Bunny".to_string());
//! title_changed.disconnect(id);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Returned by [`Signal::connect`], used with [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// `Signal<Args>` is `Send + Sync`. Slots are snapshotted before they are
/// invoked, so a slot may connect or disconnect on the same signal without
/// deadlocking; such changes take effect from the next emission.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Connect a slot to this signal.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Disconnect a slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Emit the signal, invoking every connected slot with `args`.
    pub fn emit(&self, args: Args) {
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, slot_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }
}

impl<Args> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.slots.lock().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signal<String>: Send, Sync);
