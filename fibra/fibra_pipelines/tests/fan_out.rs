//! End-to-end test of the fan-out/fan-in pipeline: completion counting,
//! sink self-disposal, and the daemon lifecycle of the workers.

use fibra_core::fiber::FiberState;
use fibra_pipelines::FanOutPipeline;
use std::sync::{Arc, Mutex};

#[test]
fn sink_sees_every_result_and_stops_only_after_the_last() {
    let pipeline = FanOutPipeline::new(5, |item: u64| item * 2).unwrap();

    let source = Arc::clone(pipeline.source_fiber());
    let sink = Arc::clone(pipeline.sink_fiber());
    let workers: Vec<_> = pipeline.worker_fibers().iter().map(Arc::clone).collect();
    assert_eq!(workers.len(), 5);
    assert!(workers.iter().all(|worker| worker.is_daemon()));
    assert!(!sink.is_daemon());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let sink_clone = Arc::clone(&sink);
    pipeline
        .run(
            (0..25).collect(),
            |item| (*item % 5) as usize,
            move |count, result: &u64| {
                // The sink must not have begun disposing itself before
                // the final result.
                if count < 25 {
                    assert_eq!(sink_clone.state(), FiberState::Running);
                }
                seen_clone.lock().unwrap().push(*result);
            },
        )
        .unwrap();

    assert_eq!(source.state(), FiberState::Stopped);
    assert_eq!(sink.state(), FiberState::Stopped);
    assert!(workers
        .iter()
        .all(|worker| worker.state() == FiberState::Running));

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..25).map(|item| item * 2).collect::<Vec<u64>>());
}
