//! Synchronization helpers shared by the substrate and its consumers.
//!
//! The substrate itself needs almost nothing here: fibers serialize all
//! state behind their task queues. What remains is the completion
//! counting used by fan-in sinks and by concurrency tests.

pub mod counter;

// Re-export key types from counter
pub use counter::AtomicCounter;
