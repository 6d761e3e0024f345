//! Cyclic two-party exchange with independent termination.
//!
//! Two peers, each owning one inbound channel and holding the other's
//! channel as outbound target, pass a value back and forth. Each applies
//! a pure transition to the received value, republishes the result, and
//! stops itself once a termination predicate fires. There is no shutdown
//! handshake: the peer that stops first still republishes one final
//! value, so the other peer reaches the same predicate one cycle later
//! and disposes independently. That one-cycle gap is an accepted race,
//! not a defect to engineer away.

use fibra_core::channel::{Publisher, Subscriber, Subscription};
use fibra_core::fiber::ThreadFiber;
use log::{debug, info};
use std::sync::Arc;

/// One party of a cyclic two-party computation.
///
/// Holds a non-owning handle to its own fiber and to the peer's inbound
/// channel; the composing code owns both channels and wires the peers
/// after both exist, so no cyclic ownership is required.
pub struct PingPongPeer<M: Clone + Send + 'static> {
    fiber: Arc<ThreadFiber>,
    name: String,
    outbound: Arc<dyn Publisher<M>>,
    emit: Arc<dyn Fn(&str, &M) + Send + Sync>,
    _subscription: Subscription,
}

impl<M: Clone + Send + 'static> PingPongPeer<M> {
    /// Wire a peer onto its inbound channel.
    ///
    /// `step` is the pure transition applied to each received value,
    /// `finished` the termination predicate tested on the derived value,
    /// and `emit` the presentation sink invoked for every value this
    /// peer contributes to the sequence. The fiber must already be
    /// started; the subscription lives as long as the peer.
    pub fn new<S, P, E>(
        fiber: Arc<ThreadFiber>,
        name: impl Into<String>,
        inbound: &dyn Subscriber<M>,
        outbound: Arc<dyn Publisher<M>>,
        step: S,
        finished: P,
        emit: E,
    ) -> Self
    where
        S: Fn(&M) -> M + Send + Sync + 'static,
        P: Fn(&M) -> bool + Send + Sync + 'static,
        E: Fn(&str, &M) + Send + Sync + 'static,
    {
        let name = name.into();
        let emit: Arc<dyn Fn(&str, &M) + Send + Sync> = Arc::new(emit);

        let callback = {
            let fiber = Arc::clone(&fiber);
            let outbound = Arc::clone(&outbound);
            let name = name.clone();
            let emit = Arc::clone(&emit);
            move |message: M| {
                let next = step(&message);

                // Republish before testing termination so the peer always
                // receives one more value, either to continue with or to
                // match the stop condition on its own side.
                outbound.publish(next.clone());

                if finished(&next) {
                    info!("stopping {}", name);
                    fiber.dispose();
                    return;
                }
                emit(&name, &next);
            }
        };
        let subscription = inbound.subscribe(&fiber, Arc::new(callback));
        debug!("ping-pong peer '{}' wired on fiber '{}'", name, fiber.name());

        Self {
            fiber,
            name,
            outbound,
            emit,
            _subscription: subscription,
        }
    }

    /// Bootstrap the cycle by publishing `seed` directly onto this
    /// peer's outbound channel, bypassing the subscribe/react loop.
    ///
    /// Callable from any thread, typically the initiating one.
    pub fn begin(&self, seed: M) {
        (self.emit)(&self.name, &seed);
        self.outbound.publish(seed);
    }

    /// The fiber this peer reacts on, for the initiator to join.
    pub fn fiber(&self) -> &Arc<ThreadFiber> {
        &self.fiber
    }

    /// Diagnostic name of this peer.
    pub fn name(&self) -> &str {
        &self.name
    }
}
