#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Fibra Core
//!
//! The fiber/channel concurrency substrate underlying the fibra
//! demonstrations.
//!
//! This crate provides the coordination primitives the rest of the
//! workspace is built on:
//!
//! - Fibers: single-threaded execution contexts with a dedicated worker
//!   thread and a FIFO task queue
//! - Channels: typed publish/subscribe buses connecting fibers
//! - Subscriptions: revocable (fiber, callback) bindings on a channel
//! - Small lock-free synchronization helpers
//!
//! ## Integration with Other Fibra Crates
//!
//! - **fibra_pipelines**: Compose fibers and channels into the cyclic
//!   ping-pong exchange and the partitioned fan-out/fan-in pipeline
//! - **fibra_cli**: Wire the pipelines to concrete payloads and stdout

/// Single-threaded execution contexts backed by dedicated worker threads
pub mod fiber;

/// Typed publish/subscribe channels and subscription handles
pub mod channel;

/// Synchronization helpers shared by the substrate and its consumers
pub mod sync;

// Re-export key types for easier access
pub use channel::{MemoryChannel, Publisher, Subscriber, Subscription};
pub use fiber::{FiberError, FiberState, ThreadFiber};
pub use sync::AtomicCounter;
