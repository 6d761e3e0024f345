//! Single-threaded execution contexts backed by dedicated worker threads.
//!
//! A fiber owns one OS thread and a private FIFO task queue. Work is
//! enqueued from any thread with [`ThreadFiber::schedule`] and executed
//! strictly in arrival order on the fiber's own thread, so two callbacks
//! belonging to the same fiber never run concurrently.

pub mod thread_fiber;

// Re-export key types from thread_fiber
pub use thread_fiber::{FiberError, FiberState, ThreadFiber};
