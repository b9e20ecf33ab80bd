//! Document Store
//!
//! A `DocStore` is a memoization cell with explicit invalidation. It is the
//! per-document cache behind every node of the graph.
//!
//! # Epochs
//!
//! Every store carries an epoch counter. A computation is tagged with the
//! epoch it started under, and its result is installed only if the epoch is
//! still current when it finishes. `reset` bumps the epoch, so:
//!
//! - within one epoch the computation runs at most once and every reader
//!   receives the same value;
//! - a reader that arrives after `reset` returns always starts (or joins) a
//!   computation of the new epoch, never the superseded one;
//! - a superseded computation is not cancelled. It completes and hands its
//!   value to the thread that ran it, but the value is discarded rather than
//!   cached.
//!
//! # Thread Safety
//!
//! State lives behind a `parking_lot::Mutex`, and waiters park on a
//! `Condvar`. The computation itself runs with the lock released, so a slow
//! parser never blocks `reset` or readers of other stores.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// Lifecycle of the cached value within one epoch.
enum SlotState<T> {
    /// Nothing computed for this epoch yet.
    Empty,

    /// A computation for this epoch is running.
    Computing,

    /// The value for this epoch.
    Ready(T),
}

struct Slot<T> {
    epoch: u64,
    state: SlotState<T>,
}

/// An epoch-tagged, single-flight memoization cell.
pub struct DocStore<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T: Clone> DocStore<T> {
    /// Create an empty store at epoch 0.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                epoch: 0,
                state: SlotState::Empty,
            }),
            ready: Condvar::new(),
        }
    }

    /// Return the cached value for the current epoch, computing it if needed.
    ///
    /// If another thread is already computing this epoch, blocks until it
    /// finishes and returns its value. `compute` is only invoked when this
    /// caller wins the gate.
    pub fn get_or_compute<F>(&self, compute: F) -> T
    where
        F: FnOnce() -> T,
    {
        let epoch = {
            let mut slot = self.slot.lock();
            loop {
                match slot.state {
                    SlotState::Ready(ref value) => return value.clone(),
                    SlotState::Computing => {}
                    SlotState::Empty => break,
                }
                self.ready.wait(&mut slot);
            }
            slot.state = SlotState::Computing;
            slot.epoch
        };

        let gate = ComputeGate {
            store: self,
            epoch,
            open: true,
        };
        let value = compute();
        gate.install(value.clone());
        value
    }

    /// Invalidate the cached value and advance the epoch.
    ///
    /// Never waits for an in-flight computation. Returns the new epoch.
    pub fn reset(&self) -> u64 {
        let mut slot = self.slot.lock();
        slot.epoch += 1;
        slot.state = SlotState::Empty;
        self.ready.notify_all();
        slot.epoch
    }

    /// The current epoch.
    pub fn epoch(&self) -> u64 {
        self.slot.lock().epoch
    }

    /// Whether a value is cached for the current epoch.
    pub fn is_ready(&self) -> bool {
        matches!(self.slot.lock().state, SlotState::Ready(_))
    }

    /// Whether a computation for the current epoch is running.
    pub fn is_computing(&self) -> bool {
        matches!(self.slot.lock().state, SlotState::Computing)
    }

    /// The cached value, without computing.
    pub fn peek(&self) -> Option<T> {
        match &self.slot.lock().state {
            SlotState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> Default for DocStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the thread computing an epoch.
///
/// If the computation unwinds before `install`, the gate reopens the slot so
/// waiters can retry instead of parking forever.
struct ComputeGate<'a, T: Clone> {
    store: &'a DocStore<T>,
    epoch: u64,
    open: bool,
}

impl<T: Clone> ComputeGate<'_, T> {
    fn install(mut self, value: T) {
        let mut slot = self.store.slot.lock();
        if slot.epoch == self.epoch {
            slot.state = SlotState::Ready(value);
        } else {
            trace!(
                started = self.epoch,
                current = slot.epoch,
                "discarding superseded computation"
            );
        }
        self.open = false;
        self.store.ready.notify_all();
    }
}

impl<T: Clone> Drop for ComputeGate<'_, T> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        let mut slot = self.store.slot.lock();
        if slot.epoch == self.epoch && matches!(slot.state, SlotState::Computing) {
            slot.state = SlotState::Empty;
        }
        self.store.ready.notify_all();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
