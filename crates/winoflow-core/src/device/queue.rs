//! Execution queues.
//!
//! Work is issued as boxed jobs. `submit` never blocks on the job itself;
//! results become visible through [`Pending`](super::Pending) slots or after
//! [`ExecutionQueue::synchronize`]. A failed job never stops the jobs queued
//! after it; dependent stages observe the failure through the slots they wait
//! on, and `synchronize` reports the first failure seen since the last call.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{trace, warn};

use crate::{Result, TensorError};

/// Unit of queued work
pub type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Execution statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
}

/// In-order execution queue shared by every stage of an invocation.
pub trait ExecutionQueue: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Issue `job`; returns without waiting for it.
    fn submit(&self, label: &str, job: Job);

    /// Wait for every submitted job and return the first failure, clearing it.
    fn synchronize(&self) -> Result<()>;

    fn stats(&self) -> QueueStats;
}

#[derive(Debug, Default)]
struct QueueState {
    in_flight: usize,
    failure: Option<TensorError>,
    stats: QueueStats,
}

impl QueueState {
    fn record(&mut self, label: &str, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.stats.completed += 1,
            Err(err) => {
                warn!(job = label, error = %err, "queued job failed");
                self.stats.failed += 1;
                self.failure.get_or_insert(err);
            }
        }
    }
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a job, turning a panic into a `ComputeError`.
fn execute(label: &str, job: Job) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let details = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "job panicked".to_string());
            Err(TensorError::compute_error(label, details))
        }
    }
}

/// Runs every job on the calling thread at submission.
#[derive(Debug, Default)]
pub struct InlineQueue {
    state: Mutex<QueueState>,
}

impl InlineQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionQueue for InlineQueue {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn submit(&self, label: &str, job: Job) {
        lock(&self.state).stats.submitted += 1;
        trace!(job = label, "running inline");
        let outcome = execute(label, job);
        lock(&self.state).record(label, outcome);
    }

    fn synchronize(&self) -> Result<()> {
        lock(&self.state).failure.take().map_or(Ok(()), Err)
    }

    fn stats(&self) -> QueueStats {
        lock(&self.state).stats
    }
}

struct Task {
    label: String,
    job: Job,
}

#[derive(Debug, Default)]
struct StreamShared {
    state: Mutex<QueueState>,
    idle: Condvar,
}

/// Single worker thread executing jobs in submission order, in the manner
/// of an accelerator command stream.
#[derive(Debug)]
pub struct StreamQueue {
    sender: Mutex<Option<Sender<Task>>>,
    shared: Arc<StreamShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamQueue {
    pub fn new() -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(StreamShared::default());
        let worker = thread::Builder::new()
            .name("winoflow-stream".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || Self::drain(receiver, shared)
            })
            .map_err(|e| TensorError::compute_error("stream_queue", e.to_string()))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn drain(receiver: Receiver<Task>, shared: Arc<StreamShared>) {
        for Task { label, job } in receiver {
            trace!(job = %label, "running on stream");
            let outcome = execute(&label, job);
            let mut state = lock(&shared.state);
            state.record(&label, outcome);
            state.in_flight -= 1;
            if state.in_flight == 0 {
                shared.idle.notify_all();
            }
        }
    }
}

impl ExecutionQueue for StreamQueue {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn submit(&self, label: &str, job: Job) {
        {
            let mut state = lock(&self.shared.state);
            state.stats.submitted += 1;
            state.in_flight += 1;
        }
        trace!(job = label, "submitting to stream");

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let task = Task {
            label: label.to_string(),
            job,
        };
        let sent = sender.as_ref().map(|s| s.send(task).is_ok()).unwrap_or(false);
        if !sent {
            let mut state = lock(&self.shared.state);
            state.in_flight -= 1;
            state.record(
                label,
                Err(TensorError::compute_error(label, "stream worker has stopped")),
            );
        }
    }

    fn synchronize(&self) -> Result<()> {
        let mut state = lock(&self.shared.state);
        while state.in_flight > 0 {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.failure.take().map_or(Ok(()), Err)
    }

    fn stats(&self) -> QueueStats {
        lock(&self.shared.state).stats
    }
}

impl Drop for StreamQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after queued jobs finish
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            if worker.join().is_err() {
                warn!("stream worker terminated abnormally");
            }
        }
    }
}
