//! Typed publish/subscribe channels connecting fibers.
//!
//! A channel carries one immutable message type from any number of
//! publishers to zero or more subscribed fibers. Publishing never blocks
//! and never waits for subscribers; delivery is at-most-once per
//! subscription per publish, with strict FIFO ordering within each
//! subscriber's own queue and no ordering guarantee across subscribers.

pub mod memory;
pub mod subscription;

// Re-export key types from memory
pub use memory::{MemoryChannel, Publisher, Subscriber};

// Re-export key types from subscription
pub use subscription::Subscription;
