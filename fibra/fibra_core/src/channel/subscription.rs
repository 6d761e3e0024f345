//! Revocable subscription handles.

/// A handle binding one (fiber, callback) pair to one channel.
///
/// Returned by `MemoryChannel::subscribe`; consuming it with
/// [`Subscription::unsubscribe`] removes the binding. Deliveries already
/// enqueued on the subscriber's fiber are unaffected and still run.
/// Dropping the handle without unsubscribing leaves the binding in place.
pub struct Subscription {
    id: u64,
    revoke: Box<dyn FnOnce() + Send>,
}

impl Subscription {
    pub(crate) fn new(id: u64, revoke: Box<dyn FnOnce() + Send>) -> Self {
        Self { id, revoke }
    }

    /// Identifier of this subscription, unique within its channel.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the binding from the channel.
    pub fn unsubscribe(self) {
        (self.revoke)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
