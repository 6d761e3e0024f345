#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Fibra Pipelines
//!
//! The two coordination protocols layered on the fibra substrate:
//!
//! - A cyclic two-party ping-pong computation with a termination
//!   condition, where each peer disposes itself independently
//! - A partitioned fan-out/fan-in worker pool with completion counting
//!   and coordinated shutdown
//!
//! Both protocols are generic over their payloads: the arithmetic lives
//! with the caller, the coordination lives here.

/// Cyclic two-party exchange with independent termination
pub mod ping_pong;

/// Partitioned fan-out/fan-in worker pool
pub mod fan_out;

// Re-export key types for easier access
pub use fan_out::{FanOutPipeline, PipelineError};
pub use ping_pong::PingPongPeer;
