//! Write-once hand-off slots between queued stages.
//!
//! A stage job owns a [`Promise`] and fulfils it with its output; the
//! consumer holds the matching [`Pending`] and blocks in [`Pending::wait`].
//! A failing stage hands its error on through [`Promise::complete`], so every
//! later stage of the same invocation fails with the original cause. A promise
//! dropped without a value wakes the consumer with `ComputeError` instead of
//! leaving it blocked.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::{Result, TensorError};

#[derive(Debug)]
enum SlotState<R> {
    Empty,
    Ready(R),
    Failed(TensorError),
    Abandoned,
}

#[derive(Debug)]
struct Slot<R> {
    state: Mutex<SlotState<R>>,
    ready: Condvar,
}

impl<R> Slot<R> {
    fn lock(&self) -> MutexGuard<'_, SlotState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer half of a hand-off slot
#[derive(Debug)]
pub struct Promise<R> {
    slot: Arc<Slot<R>>,
}

/// Consumer half of a hand-off slot
#[derive(Debug)]
pub struct Pending<R> {
    slot: Arc<Slot<R>>,
    label: String,
}

/// Create a connected producer/consumer pair.
pub fn pending<R>(label: impl Into<String>) -> (Promise<R>, Pending<R>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Empty),
        ready: Condvar::new(),
    });
    (
        Promise {
            slot: Arc::clone(&slot),
        },
        Pending {
            slot,
            label: label.into(),
        },
    )
}

impl<R> Promise<R> {
    /// Store the value and wake the consumer.
    pub fn fulfill(self, value: R) {
        *self.slot.lock() = SlotState::Ready(value);
        self.slot.ready.notify_all();
    }

    /// Store the error and wake the consumer.
    pub fn fail(self, error: TensorError) {
        *self.slot.lock() = SlotState::Failed(error);
        self.slot.ready.notify_all();
    }

    /// Hand a stage outcome to the consumer and return it for the queue's
    /// own bookkeeping.
    pub fn complete(self, outcome: Result<R>) -> Result<()> {
        match outcome {
            Ok(value) => {
                self.fulfill(value);
                Ok(())
            }
            Err(error) => {
                self.fail(error.clone());
                Err(error)
            }
        }
    }
}

impl<R> Drop for Promise<R> {
    fn drop(&mut self) {
        let mut state = self.slot.lock();
        if matches!(*state, SlotState::Empty) {
            *state = SlotState::Abandoned;
            self.slot.ready.notify_all();
        }
    }
}

impl<R> Pending<R> {
    /// A slot that already holds `value`
    pub fn ready(label: impl Into<String>, value: R) -> Self {
        let (promise, pending) = pending(label);
        promise.fulfill(value);
        pending
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether `wait` would return without blocking
    pub fn is_complete(&self) -> bool {
        !matches!(*self.slot.lock(), SlotState::Empty)
    }

    /// Block until the producer finishes, taking ownership of its value.
    pub fn wait(self) -> Result<R> {
        let mut state = self.slot.lock();
        loop {
            match std::mem::replace(&mut *state, SlotState::Abandoned) {
                SlotState::Ready(value) => return Ok(value),
                SlotState::Failed(error) => return Err(error),
                SlotState::Abandoned => {
                    return Err(TensorError::compute_error(
                        &self.label,
                        "producing stage did not complete",
                    ))
                }
                SlotState::Empty => {
                    *state = SlotState::Empty;
                    state = self
                        .slot
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}
