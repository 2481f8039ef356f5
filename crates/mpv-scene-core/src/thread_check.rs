//! Thread affinity checks.
//!
//! The bridge spans three threads it does not own: the engine's worker, the UI
//! thread, and the host window's render thread. State that belongs to one of
//! them records a [`ThreadAffinity`] at creation and asserts it on access.
//!
//! ```
//! use mpv_scene_core::ThreadAffinity;
//!
//! struct UiState {
//!     affinity: ThreadAffinity,
//! }
//!
//! impl UiState {
//!     fn touch(&self) {
//!         self.affinity.debug_assert_same_thread();
//!     }
//! }
//!
//! UiState { affinity: ThreadAffinity::current() }.touch();
//! ```

use std::thread::ThreadId;

/// Records the thread an object was created on.
#[derive(Debug, Clone, Copy)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Affinity for the calling thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// The thread this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the calling thread matches.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Panic if called from another thread. Active in all builds.
    pub fn assert_same_thread_with_msg(&self, msg: &str) {
        if !self.is_same_thread() {
            self.panic_wrong_thread(msg);
        }
    }

    /// Panic if called from another thread, in debug builds only.
    #[inline]
    pub fn debug_assert_same_thread(&self) {
        #[cfg(debug_assertions)]
        self.assert_same_thread_with_msg("object accessed from wrong thread");
    }

    /// Debug-only check with a custom message.
    #[inline]
    pub fn debug_assert_same_thread_with_msg(&self, msg: &str) {
        #[cfg(debug_assertions)]
        self.assert_same_thread_with_msg(msg);
        #[cfg(not(debug_assertions))]
        let _ = msg;
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self, msg: &str) -> ! {
        let current = std::thread::current();
        let current_name = current.name().unwrap_or("<unnamed>");
        panic!(
            "thread affinity violation: {msg}\n\
             owner thread: {:?}\n\
             current thread: \"{current_name}\" ({:?})\n\
             post the work through a Dispatcher instead of calling across threads",
            self.thread_id,
            current.id(),
        )
    }
}
