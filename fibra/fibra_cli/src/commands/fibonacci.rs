//! The Fibonacci ping-pong demonstration.
//!
//! Two peers, "Odd" and "Even", message each other back and forth with
//! the latest two terms and successively build the sequence. Odd
//! contributes the 1st, 3rd, 5th... terms, Even the rest. Each peer
//! stops itself once a derived term exceeds the limit; there is no stop
//! handshake between them.

use anyhow::Result;
use fibra_core::channel::{MemoryChannel, Publisher};
use fibra_core::fiber::ThreadFiber;
use fibra_pipelines::PingPongPeer;
use std::sync::Arc;

/// The last two terms of the sequence, immutable in flight.
#[derive(Clone, Copy, Debug)]
struct IntPair {
    first: u64,
    second: u64,
}

pub fn run(limit: u64) -> Result<()> {
    // Two channels, named by the peer that listens on them.
    let odd_channel: Arc<MemoryChannel<IntPair>> = Arc::new(MemoryChannel::new());
    let even_channel: Arc<MemoryChannel<IntPair>> = Arc::new(MemoryChannel::new());

    let odd_fiber = Arc::new(ThreadFiber::new("odd"));
    let even_fiber = Arc::new(ThreadFiber::new("even"));
    odd_fiber.start()?;
    even_fiber.start()?;

    let step = |pair: &IntPair| IntPair {
        first: pair.second,
        second: pair.first + pair.second,
    };
    let finished = move |pair: &IntPair| pair.second > limit;
    let emit = |name: &str, pair: &IntPair| println!("{} {}", name, pair.second);

    let odd = PingPongPeer::new(
        Arc::clone(&odd_fiber),
        "Odd",
        odd_channel.as_ref(),
        Arc::clone(&even_channel) as Arc<dyn Publisher<IntPair>>,
        step,
        finished,
        emit,
    );
    let _even = PingPongPeer::new(
        Arc::clone(&even_fiber),
        "Even",
        even_channel.as_ref(),
        Arc::clone(&odd_channel) as Arc<dyn Publisher<IntPair>>,
        step,
        finished,
        emit,
    );

    odd.begin(IntPair { first: 0, second: 1 });

    odd_fiber.join()?;
    even_fiber.join()?;
    Ok(())
}
