//! In-process publish/subscribe channel.
//!
//! `MemoryChannel` is the only channel implementation in the substrate.
//! It owns a mutable set of subscriptions; `publish` snapshots the set
//! and enqueues the message, wrapped in each stored callback, onto each
//! subscriber's fiber. There is no buffering and no replay: a publish
//! with zero subscribers silently discards the message.

use crate::channel::subscription::Subscription;
use crate::fiber::ThreadFiber;
use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// The publish side of a channel.
///
/// Publishing never blocks and never waits for any subscriber to process
/// the message; it may be invoked from any thread, including the main
/// thread bootstrapping a protocol.
pub trait Publisher<M>: Send + Sync {
    /// Deliver `message` to every currently registered subscription,
    /// exactly once each, on each subscriber's own fiber.
    fn publish(&self, message: M);
}

/// The subscribe side of a channel.
pub trait Subscriber<M> {
    /// Register `callback` to run on `fiber`'s thread for every message
    /// published after registration. Returns a revocable handle.
    fn subscribe(
        &self,
        fiber: &Arc<ThreadFiber>,
        callback: Arc<dyn Fn(M) + Send + Sync>,
    ) -> Subscription;
}

/// One registered (fiber, callback) binding
struct SubscriptionEntry<M> {
    id: u64,
    fiber: Arc<ThreadFiber>,
    callback: Arc<dyn Fn(M) + Send + Sync>,
}

impl<M> Clone for SubscriptionEntry<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            fiber: Arc::clone(&self.fiber),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// A typed in-memory publish/subscribe bus.
///
/// Messages must be `Clone` because every subscriber receives its own
/// logically independent copy, and `Send` because delivery crosses
/// thread boundaries. The channel itself has no thread affinity.
pub struct MemoryChannel<M> {
    /// Registered subscriptions; shared with revocation closures
    subscriptions: Arc<Mutex<Vec<SubscriptionEntry<M>>>>,
    /// Source of per-channel subscription ids
    next_id: AtomicU64,
}

impl<M: Clone + Send + 'static> MemoryChannel<M> {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `callback` to run on `fiber`'s thread per publish.
    ///
    /// The same fiber may subscribe to the same channel multiple times;
    /// the subscriptions are independent.
    pub fn subscribe<F>(&self, fiber: &Arc<ThreadFiber>, callback: F) -> Subscription
    where
        F: Fn(M) + Send + Sync + 'static,
    {
        self.add_subscription(fiber, Arc::new(callback))
    }

    /// Number of currently registered subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    fn add_subscription(
        &self,
        fiber: &Arc<ThreadFiber>,
        callback: Arc<dyn Fn(M) + Send + Sync>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = SubscriptionEntry {
            id,
            fiber: Arc::clone(fiber),
            callback,
        };
        self.subscriptions.lock().unwrap().push(entry);
        trace!("channel: subscription {} added", id);

        let subscriptions = Arc::downgrade(&self.subscriptions);
        Subscription::new(
            id,
            Box::new(move || {
                if let Some(subscriptions) = subscriptions.upgrade() {
                    subscriptions.lock().unwrap().retain(|entry| entry.id != id);
                    trace!("channel: subscription {} removed", id);
                }
            }),
        )
    }
}

impl<M: Clone + Send + 'static> Default for MemoryChannel<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone + Send + 'static> Publisher<M> for MemoryChannel<M> {
    fn publish(&self, message: M) {
        // Snapshot under the lock, schedule outside it: a callback must
        // be free to subscribe or unsubscribe from within its own fiber.
        let entries = self.subscriptions.lock().unwrap().clone();

        if entries.is_empty() {
            trace!("channel: publish with no subscribers, message discarded");
            return;
        }

        for entry in &entries {
            let callback = Arc::clone(&entry.callback);
            let message = message.clone();
            entry.fiber.schedule(move || callback(message));
        }
    }
}

impl<M: Clone + Send + 'static> Subscriber<M> for MemoryChannel<M> {
    fn subscribe(
        &self,
        fiber: &Arc<ThreadFiber>,
        callback: Arc<dyn Fn(M) + Send + Sync>,
    ) -> Subscription {
        self.add_subscription(fiber, callback)
    }
}
