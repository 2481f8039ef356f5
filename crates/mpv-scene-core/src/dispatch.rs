//! Owner-thread dispatch.
//!
//! A [`DispatchQueue`] belongs to one thread (normally the UI thread). Any
//! thread may hold a [`Dispatcher`] for it and post closures; the owner runs
//! them, in posting order, when it calls [`DispatchQueue::process_pending`].
//!
//! # How It Works
//!
//! 1. A foreign thread calls [`Dispatcher::post`]. The closure is pushed onto
//!    an unbounded channel and the optional waker is invoked so the host event
//!    loop knows to come back around.
//!
//! 2. The owner thread calls [`DispatchQueue::process_pending`] from its event
//!    loop and runs everything that was queued at that moment.
//!
//! [`CoalescedPost`] sits in front of a dispatcher and collapses repeated
//! requests: while one post is pending, further posts are dropped. The pending
//! flag is cleared just before the posted closure runs, so a request raised
//! while the closure is running is never lost.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::{CoreError, Result};
use crate::logging::targets;
use crate::thread_check::ThreadAffinity;

type Task = Box<dyn FnOnce() + Send + 'static>;
type Waker = Arc<dyn Fn() + Send + Sync>;

/// The owner side of a dispatch queue.
pub struct DispatchQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    waker: Option<Waker>,
    affinity: ThreadAffinity,
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchQueue {
    /// Create a queue owned by the calling thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            waker: None,
            affinity: ThreadAffinity::current(),
        }
    }

    /// Create a queue that calls `waker` after every successful post.
    ///
    /// The waker runs on the posting thread. Use it to nudge the host event
    /// loop, e.g. by sending a user event through its proxy.
    pub fn with_waker<F>(waker: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            waker: Some(Arc::new(waker)),
            ..Self::new()
        }
    }

    /// Get a posting handle for this queue.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            sender: self.sender.clone(),
            waker: self.waker.clone(),
        }
    }

    /// Number of closures waiting to run.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Run every closure that is queued right now.
    ///
    /// Closures posted while this runs are left for the next call, so a task
    /// that re-posts itself cannot starve the owner's event loop.
    ///
    /// Returns the number of closures run.
    pub fn process_pending(&self) -> usize {
        self.affinity
            .debug_assert_same_thread_with_msg("dispatch queue drained off its owner thread");

        let count = self.receiver.len();
        let mut ran = 0;
        for _ in 0..count {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        if ran > 0 {
            tracing::trace!(target: targets::DISPATCH, ran, "processed queued tasks");
        }
        ran
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("pending", &self.receiver.len())
            .field("owner", &self.affinity.thread_id())
            .finish()
    }
}

/// A cloneable, thread-safe handle for posting closures to a [`DispatchQueue`].
#[derive(Clone)]
pub struct Dispatcher {
    sender: Sender<Task>,
    waker: Option<Waker>,
}

impl Dispatcher {
    /// Queue `task` to run on the owner thread.
    ///
    /// Fails with [`CoreError::DispatcherClosed`] once the queue is gone.
    pub fn post<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Box::new(task))
            .map_err(|_| CoreError::DispatcherClosed)?;
        if let Some(waker) = &self.waker {
            waker();
        }
        Ok(())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("has_waker", &self.waker.is_some())
            .finish()
    }
}

/// A single-slot request in front of a [`Dispatcher`].
///
/// At most one posted closure is outstanding at a time. Safe to call from
/// any thread, including ones this crate does not own; it never blocks.
#[derive(Clone, Debug)]
pub struct CoalescedPost {
    dispatcher: Dispatcher,
    pending: Arc<AtomicBool>,
}

impl CoalescedPost {
    /// Create a coalescing relay posting through `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Post `task` unless a previous post is still pending.
    ///
    /// Returns `true` if a new closure was queued.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }

        let pending = self.pending.clone();
        let posted = self.dispatcher.post(move || {
            pending.store(false, Ordering::Release);
            task();
        });

        match posted {
            Ok(()) => true,
            Err(err) => {
                self.pending.store(false, Ordering::Release);
                tracing::debug!(target: targets::DISPATCH, %err, "coalesced post dropped");
                false
            }
        }
    }

    /// Whether a posted closure is waiting to run.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

static_assertions::assert_impl_all!(Dispatcher: Send, Sync);
static_assertions::assert_impl_all!(CoalescedPost: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_posts_run_in_order() {
        let queue = DispatchQueue::new();
        let dispatcher = queue.dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            dispatcher.post(move || order.lock().push(i)).unwrap();
        }

        assert_eq!(queue.pending_count(), 3);
        assert_eq!(queue.process_pending(), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_post_after_queue_dropped() {
        let queue = DispatchQueue::new();
        let dispatcher = queue.dispatcher();
        drop(queue);

        // The queue held the only receiver.
        assert_eq!(dispatcher.post(|| {}), Err(CoreError::DispatcherClosed));
    }

    #[test]
    fn test_waker_runs_on_post() {
        let woken = Arc::new(AtomicUsize::new(0));
        let woken_clone = woken.clone();
        let queue = DispatchQueue::with_waker(move || {
            woken_clone.fetch_add(1, Ordering::SeqCst);
        });

        queue.dispatcher().post(|| {}).unwrap();
        queue.dispatcher().post(|| {}).unwrap();
        assert_eq!(woken.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reposting_task_waits_for_next_pass() {
        let queue = DispatchQueue::new();
        let dispatcher = queue.dispatcher();
        let inner = dispatcher.clone();

        dispatcher
            .post(move || {
                inner.post(|| {}).unwrap();
            })
            .unwrap();

        assert_eq!(queue.process_pending(), 1);
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.process_pending(), 1);
    }

    #[test]
    fn test_coalesced_post_collapses_duplicates() {
        let queue = DispatchQueue::new();
        let relay = CoalescedPost::new(queue.dispatcher());
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let runs = runs.clone();
            relay.post(move || {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(relay.is_pending());
        assert_eq!(queue.pending_count(), 1);
        queue.process_pending();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!relay.is_pending());
    }

    #[test]
    fn test_coalesced_post_rearms_while_running() {
        let queue = DispatchQueue::new();
        let relay = CoalescedPost::new(queue.dispatcher());
        let inner = relay.clone();

        relay.post(move || {
            // Raised while the first request is being handled: must be kept.
            assert!(inner.post(|| {}));
        });

        assert_eq!(queue.process_pending(), 1);
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_coalesced_post_from_many_threads() {
        let queue = DispatchQueue::new();
        let relay = CoalescedPost::new(queue.dispatcher());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let relay = relay.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        relay.post(|| {});
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.pending_count(), 1);
    }
}
