//! Fiber implementation backed by a dedicated worker thread.
//!
//! `ThreadFiber` is the only execution context in the substrate: one OS
//! thread draining one multi-producer/single-consumer task queue. All
//! cross-fiber communication happens by enqueueing closures here, never
//! by sharing mutable state.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, trace};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use thiserror::Error;

/// Error type for fiber lifecycle operations
#[derive(Error, Debug)]
pub enum FiberError {
    /// The fiber's worker thread was already started
    #[error("fiber '{0}' was already started")]
    AlreadyStarted(String),

    /// The fiber was never started
    #[error("fiber '{0}' was never started")]
    NotStarted(String),

    /// `join` was invoked on the fiber's own worker thread
    #[error("fiber '{0}' cannot be joined from its own worker thread")]
    JoinFromOwnThread(String),

    /// The worker thread itself panicked outside of any callback
    #[error("worker thread of fiber '{0}' panicked")]
    WorkerPanicked(String),

    /// The OS refused to spawn the worker thread
    #[error("failed to spawn worker thread for fiber '{name}'")]
    Spawn {
        /// Name of the fiber whose worker could not be spawned
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle state of a fiber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberState {
    /// Constructed but the worker thread is not running yet
    Created,
    /// Worker thread is draining the task queue
    Running,
    /// Disposal requested; the in-flight callback may still be running
    Disposing,
    /// Worker thread has terminated; terminal state
    Stopped,
}

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const DISPOSING: u8 = 2;
const STOPPED: u8 = 3;

fn state_from_u8(raw: u8) -> FiberState {
    match raw {
        CREATED => FiberState::Created,
        RUNNING => FiberState::Running,
        DISPOSING => FiberState::Disposing,
        _ => FiberState::Stopped,
    }
}

/// Unit of work queued on a fiber
enum Task {
    /// Execute the closure on the worker thread
    Run(Box<dyn FnOnce() + Send + 'static>),
    /// Wake the worker so it notices the disposal request
    Stop,
}

/// A single-threaded execution context with its own worker thread.
///
/// The lifecycle is `Created -> Running -> Disposing -> Stopped`, with
/// `Stopped` terminal. Scheduling is permitted from any thread; execution
/// happens exclusively on the worker thread, strictly in arrival order.
pub struct ThreadFiber {
    /// Diagnostic name, also used for the worker thread
    name: String,

    /// Detached lifecycle: daemon fibers are never joined and die with
    /// the process
    daemon: bool,

    /// Current lifecycle state, shared with the worker thread
    state: Arc<AtomicU8>,

    /// Producer side of the task queue
    sender: Sender<Task>,

    /// Consumer side, handed to the worker thread by `start`
    receiver: Mutex<Option<Receiver<Task>>>,

    /// Worker thread handle, taken by the first `join`
    handle: Mutex<Option<JoinHandle<()>>>,

    /// Worker thread id, used to reject self-joins
    worker_id: Mutex<Option<ThreadId>>,
}

impl ThreadFiber {
    /// Create a new fiber that the initiator is expected to join.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_daemon(name, false)
    }

    /// Create a detached fiber whose termination is tied to process exit.
    pub fn daemon(name: impl Into<String>) -> Self {
        Self::with_daemon(name, true)
    }

    fn with_daemon(name: impl Into<String>, daemon: bool) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            name: name.into(),
            daemon,
            state: Arc::new(AtomicU8::new(CREATED)),
            sender,
            receiver: Mutex::new(Some(receiver)),
            handle: Mutex::new(None),
            worker_id: Mutex::new(None),
        }
    }

    /// Start the dedicated worker thread.
    ///
    /// Transitions `Created -> Running`. Starting an already started (or
    /// already stopped) fiber returns `FiberError::AlreadyStarted` and
    /// never spawns a second thread.
    pub fn start(&self) -> Result<(), FiberError> {
        if self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FiberError::AlreadyStarted(self.name.clone()));
        }

        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| FiberError::AlreadyStarted(self.name.clone()))?;

        let state = Arc::clone(&self.state);
        let name = self.name.clone();

        let builder = thread::Builder::new().name(self.name.clone());
        let handle = builder
            .spawn(move || Self::worker_loop(&name, &state, receiver))
            .map_err(|source| FiberError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        *self.worker_id.lock().unwrap() = Some(handle.thread().id());
        *self.handle.lock().unwrap() = Some(handle);

        debug!("fiber '{}': started (daemon: {})", self.name, self.daemon);
        Ok(())
    }

    /// Worker thread main loop
    fn worker_loop(name: &str, state: &AtomicU8, receiver: Receiver<Task>) {
        debug!("fiber '{}': worker running", name);

        loop {
            if state.load(Ordering::SeqCst) != RUNNING {
                break;
            }

            match receiver.recv() {
                Ok(Task::Run(callback)) => {
                    // A panicking callback must not take down the fiber for
                    // unrelated subsequent messages: log and continue.
                    let result = catch_unwind(AssertUnwindSafe(callback));
                    if let Err(payload) = result {
                        error!(
                            "fiber '{}': callback panicked: {}",
                            name,
                            panic_message(&payload)
                        );
                    }
                }
                Ok(Task::Stop) | Err(_) => break,
            }
        }

        state.store(STOPPED, Ordering::SeqCst);
        debug!("fiber '{}': worker stopped", name);
    }

    /// Enqueue a unit of work to run on the fiber's thread.
    ///
    /// Callable from any thread. Once disposal has been requested the task
    /// is silently dropped; callers relying on delivery after disposal
    /// must treat this as a race and design around it.
    pub fn schedule<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.state.load(Ordering::SeqCst) {
            DISPOSING | STOPPED => {
                trace!(
                    "fiber '{}': dropping task scheduled after disposal",
                    self.name
                );
            }
            _ => {
                // Tasks scheduled before `start` are buffered and run once
                // the worker comes up.
                if self.sender.send(Task::Run(Box::new(f))).is_err() {
                    trace!("fiber '{}': task queue closed, task dropped", self.name);
                }
            }
        }
    }

    /// Request cooperative termination of the fiber.
    ///
    /// Transitions `Running -> Disposing`; the worker finishes the
    /// in-flight callback (if any), drops the remaining queue, and moves
    /// to `Stopped`. May be called from within one of the fiber's own
    /// callbacks or from any external thread. Idempotent: repeat calls
    /// after `Stopped` are no-ops.
    pub fn dispose(&self) {
        match self
            .state
            .compare_exchange(RUNNING, DISPOSING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                debug!("fiber '{}': disposing", self.name);
                // Wake the worker if it is idle on an empty queue.
                let _ = self.sender.send(Task::Stop);
            }
            Err(CREATED) => {
                // Never started: there is no worker to stop.
                let _ = self.state.compare_exchange(
                    CREATED,
                    STOPPED,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                debug!("fiber '{}': disposed before start", self.name);
            }
            Err(_) => {
                trace!("fiber '{}': dispose after stop is a no-op", self.name);
            }
        }
    }

    /// Block the calling thread until the worker thread has terminated.
    ///
    /// Safe to call concurrently with `dispose` from another thread;
    /// concurrent joiners all return once the worker is down. Calling
    /// from the fiber's own thread is rejected rather than deadlocking.
    pub fn join(&self) -> Result<(), FiberError> {
        match *self.worker_id.lock().unwrap() {
            Some(id) if id == thread::current().id() => {
                return Err(FiberError::JoinFromOwnThread(self.name.clone()));
            }
            Some(_) => {}
            None => return Err(FiberError::NotStarted(self.name.clone())),
        }

        // The first joiner takes the handle and blocks; later joiners
        // block on the lock until the worker is down, then fall through.
        let mut guard = self.handle.lock().unwrap();
        if let Some(handle) = guard.take() {
            handle
                .join()
                .map_err(|_| FiberError::WorkerPanicked(self.name.clone()))?;
        }
        Ok(())
    }

    /// Current lifecycle state of the fiber.
    pub fn state(&self) -> FiberState {
        state_from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Diagnostic name of the fiber.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this fiber is detached (reaped by process exit, not joined).
    pub fn is_daemon(&self) -> bool {
        self.daemon
    }
}

impl Drop for ThreadFiber {
    fn drop(&mut self) {
        if self.state.load(Ordering::SeqCst) == RUNNING {
            self.dispose();
        }
    }
}

impl std::fmt::Debug for ThreadFiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadFiber")
            .field("name", &self.name)
            .field("daemon", &self.daemon)
            .field("state", &self.state())
            .finish()
    }
}

/// Best-effort extraction of a panic payload for logging
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<unknown panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_schedule_executes_on_worker() {
        let fiber = ThreadFiber::new("test");
        fiber.start().unwrap();

        let (tx, rx) = mpsc::channel();
        fiber.schedule(move || {
            tx.send(thread::current().name().map(String::from)).unwrap();
        });

        let worker_name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(worker_name.as_deref(), Some("test"));

        fiber.dispose();
        fiber.join().unwrap();
        assert_eq!(fiber.state(), FiberState::Stopped);
    }

    #[test]
    fn test_tasks_run_in_arrival_order() {
        let fiber = Arc::new(ThreadFiber::new("ordered"));
        fiber.start().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..100 {
            let seen = Arc::clone(&seen);
            fiber.schedule(move || seen.lock().unwrap().push(i));
        }

        // Self-disposal sentinel runs after everything queued before it.
        let sentinel = Arc::clone(&fiber);
        fiber.schedule(move || sentinel.dispose());
        fiber.join().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_double_start_is_an_error() {
        let fiber = ThreadFiber::new("double-start");
        fiber.start().unwrap();

        let result = fiber.start();
        assert!(matches!(result, Err(FiberError::AlreadyStarted(_))));

        fiber.dispose();
        fiber.join().unwrap();
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let fiber = ThreadFiber::new("idempotent");
        fiber.start().unwrap();

        fiber.dispose();
        fiber.dispose();
        fiber.join().unwrap();
        fiber.dispose();

        assert_eq!(fiber.state(), FiberState::Stopped);
    }

    #[test]
    fn test_schedule_after_dispose_is_a_noop() {
        let fiber = ThreadFiber::new("post-dispose");
        fiber.start().unwrap();
        fiber.dispose();
        fiber.join().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        fiber.schedule(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_join_from_own_thread_is_rejected() {
        let fiber = Arc::new(ThreadFiber::new("self-join"));
        fiber.start().unwrap();

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&fiber);
        fiber.schedule(move || {
            tx.send(inner.join().is_err()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());

        fiber.dispose();
        fiber.join().unwrap();
    }

    #[test]
    fn test_join_before_start_is_an_error() {
        let fiber = ThreadFiber::new("unstarted");
        assert!(matches!(fiber.join(), Err(FiberError::NotStarted(_))));
    }

    #[test]
    fn test_panicking_callback_does_not_kill_the_fiber() {
        let fiber = ThreadFiber::new("survivor");
        fiber.start().unwrap();

        fiber.schedule(|| panic!("callback failure"));

        let (tx, rx) = mpsc::channel();
        fiber.schedule(move || tx.send(()).unwrap());
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        fiber.dispose();
        fiber.join().unwrap();
    }

    #[test]
    fn test_concurrent_schedulers_never_interleave_callbacks() {
        let fiber = Arc::new(ThreadFiber::new("race"));
        fiber.start().unwrap();

        // Deliberately non-atomic read-modify-write: a lost update here
        // would prove two callback bodies overlapped.
        let counter = Arc::new(AtomicUsize::new(0));
        let producers: Vec<_> = (0..8)
            .map(|_| {
                let fiber = Arc::clone(&fiber);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let counter = Arc::clone(&counter);
                        fiber.schedule(move || {
                            let value = counter.load(Ordering::SeqCst);
                            counter.store(value + 1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }

        let sentinel = Arc::clone(&fiber);
        fiber.schedule(move || sentinel.dispose());
        fiber.join().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 800);
    }

    #[test]
    fn test_dispose_before_start_goes_straight_to_stopped() {
        let fiber = ThreadFiber::new("never-started");
        fiber.dispose();
        assert_eq!(fiber.state(), FiberState::Stopped);
    }
}
