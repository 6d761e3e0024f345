//! Partitioned fan-out/fan-in worker pool.
//!
//! One source fiber routes a finite, predetermined supply of work items
//! across N worker channels by a deterministic partition key; N daemon
//! worker fibers each apply a pure transform and publish onto one shared
//! results channel; one sink fiber counts results and disposes itself
//! after the last one. Pool size is fixed and partitioning is static:
//! there is no work stealing and no rebalancing.

use fibra_core::channel::{MemoryChannel, Publisher, Subscription};
use fibra_core::fiber::{FiberError, ThreadFiber};
use fibra_core::sync::AtomicCounter;
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

/// Error type for pipeline composition and execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A work item's partition key does not select any worker channel.
    /// Raised before anything is published: the supply is predetermined,
    /// so the whole batch is validated up front.
    #[error("partition key {key} out of range for {workers} workers")]
    PartitionOutOfRange {
        /// The offending key
        key: usize,
        /// Number of worker channels available
        workers: usize,
    },

    /// A fiber lifecycle operation failed
    #[error(transparent)]
    Fiber(#[from] FiberError),
}

/// A fixed-size fan-out/fan-in worker pool.
///
/// Owns every fiber, channel, and subscription it is composed of for its
/// whole lifetime, so nothing is torn down while work is in flight. The
/// worker fibers are daemons: they are never joined and are reaped by
/// process exit.
pub struct FanOutPipeline<W, R>
where
    W: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    source_fiber: Arc<ThreadFiber>,
    sink_fiber: Arc<ThreadFiber>,
    worker_fibers: Vec<Arc<ThreadFiber>>,
    worker_channels: Vec<Arc<MemoryChannel<W>>>,
    results: Arc<MemoryChannel<R>>,
    subscriptions: Vec<Subscription>,
}

impl<W, R> FanOutPipeline<W, R>
where
    W: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    /// Compose and start a pipeline with `workers` parallel workers, all
    /// applying the same pure `transform`.
    pub fn new<T>(workers: usize, transform: T) -> Result<Self, PipelineError>
    where
        T: Fn(W) -> R + Send + Sync + 'static,
    {
        let results: Arc<MemoryChannel<R>> = Arc::new(MemoryChannel::new());
        let transform: Arc<dyn Fn(W) -> R + Send + Sync> = Arc::new(transform);

        let mut worker_fibers = Vec::with_capacity(workers);
        let mut worker_channels = Vec::with_capacity(workers);
        let mut subscriptions = Vec::with_capacity(workers + 1);

        for idx in 0..workers {
            let fiber = Arc::new(ThreadFiber::daemon(format!("worker-{}", idx + 1)));
            fiber.start()?;

            let channel: Arc<MemoryChannel<W>> = Arc::new(MemoryChannel::new());
            let results = Arc::clone(&results);
            let transform = Arc::clone(&transform);
            subscriptions.push(channel.subscribe(&fiber, move |item: W| {
                results.publish(transform(item));
            }));

            worker_fibers.push(fiber);
            worker_channels.push(channel);
        }

        let source_fiber = Arc::new(ThreadFiber::new("source"));
        source_fiber.start()?;
        let sink_fiber = Arc::new(ThreadFiber::new("sink"));
        sink_fiber.start()?;

        debug!("fan-out pipeline composed with {} workers", workers);

        Ok(Self {
            source_fiber,
            sink_fiber,
            worker_fibers,
            worker_channels,
            results,
            subscriptions,
        })
    }

    /// Number of worker channels.
    pub fn worker_count(&self) -> usize {
        self.worker_channels.len()
    }

    /// The source fiber, joined by `run` once the supply is exhausted.
    pub fn source_fiber(&self) -> &Arc<ThreadFiber> {
        &self.source_fiber
    }

    /// The sink fiber, joined by `run` once every result arrived.
    pub fn sink_fiber(&self) -> &Arc<ThreadFiber> {
        &self.sink_fiber
    }

    /// The worker fibers, left running after `run` returns.
    pub fn worker_fibers(&self) -> &[Arc<ThreadFiber>] {
        &self.worker_fibers
    }

    /// Stream `items` through the pool and block until every result has
    /// reached the sink.
    ///
    /// `partition` selects the worker channel per item and must yield a
    /// key below the worker count for every item; any out-of-range key
    /// fails the whole run before a single item is published. `on_result`
    /// runs on the sink fiber with the running result count, one-based.
    pub fn run<P, E>(mut self, items: Vec<W>, partition: P, on_result: E) -> Result<(), PipelineError>
    where
        P: Fn(&W) -> usize,
        E: Fn(usize, &R) + Send + Sync + 'static,
    {
        let workers = self.worker_channels.len();

        // The supply is finite and predetermined: validate every key
        // before the first publish, failing fast on the precondition.
        let mut routed = Vec::with_capacity(items.len());
        for item in items {
            let key = partition(&item);
            if key >= workers {
                return Err(PipelineError::PartitionOutOfRange { key, workers });
            }
            routed.push((key, item));
        }
        let expected = routed.len();

        if expected == 0 {
            self.sink_fiber.dispose();
        } else {
            // Sink: count results, self-dispose on the last one and
            // never before it.
            let received = Arc::new(AtomicCounter::new());
            let sink_fiber = Arc::clone(&self.sink_fiber);
            self.subscriptions
                .push(self.results.subscribe(&self.sink_fiber, move |result: R| {
                    let count = received.increment();
                    on_result(count, &result);
                    if count == expected {
                        sink_fiber.dispose();
                    }
                }));
        }

        // Source: route the whole supply, then self-dispose.
        {
            let channels = self.worker_channels.clone();
            let source_fiber = Arc::clone(&self.source_fiber);
            self.source_fiber.schedule(move || {
                for (key, item) in routed {
                    channels[key].publish(item);
                }
                source_fiber.dispose();
            });
        }

        self.source_fiber.join()?;
        self.sink_fiber.join()?;
        info!("pipeline drained {} items through {} workers", expected, workers);

        // Worker fibers stay up: daemon lifecycle, reaped at process exit.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_out_of_range_key_fails_before_any_publish() {
        let pipeline: FanOutPipeline<usize, usize> =
            FanOutPipeline::new(2, |item| item).unwrap();

        let result = pipeline.run(vec![0, 5, 1], |item| *item, |_, _| {});
        match result {
            Err(PipelineError::PartitionOutOfRange { key, workers }) => {
                assert_eq!(key, 5);
                assert_eq!(workers, 2);
            }
            other => panic!("expected PartitionOutOfRange, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_every_item_produces_exactly_one_result() {
        let pipeline = FanOutPipeline::new(2, |item: usize| item * 3).unwrap();

        let results = Arc::new(Mutex::new(Vec::new()));
        let results_clone = Arc::clone(&results);
        pipeline
            .run(
                (0..8).collect(),
                |item| item % 2,
                move |_count, result: &usize| {
                    results_clone.lock().unwrap().push(*result);
                },
            )
            .unwrap();

        let mut results = results.lock().unwrap().clone();
        results.sort_unstable();
        assert_eq!(results, (0..8).map(|i| i * 3).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_supply_completes_immediately() {
        let pipeline = FanOutPipeline::new(3, |item: u32| item).unwrap();
        pipeline.run(Vec::new(), |_| 0, |_, _| {}).unwrap();
    }
}
