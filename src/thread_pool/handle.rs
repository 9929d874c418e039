//! Result handles for submitted tasks.
//!
//! A [`Handle`] and its [`Completer`] share one slot. The completer travels
//! inside the type-erased job and publishes the outcome exactly once; the
//! handle stays with the submitter and blocks on a condvar until then.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TpoolError};

enum Slot<T> {
    Pending,
    Done(std::result::Result<T, String>),
    Taken,
    Abandoned,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Creates a connected completer/handle pair.
pub(crate) fn pair<T>() -> (Completer<T>, Handle<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        ready: Condvar::new(),
    });
    (
        Completer {
            shared: Some(shared.clone()),
        },
        Handle { shared },
    )
}

/// Write side of a handle. Dropping it unpublished marks the handle abandoned.
pub(crate) struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Completer<T> {
    /// Runs `f`, catching a panic as the task's failure, and publishes the outcome.
    pub(crate) fn run<F>(self, f: F)
    where
        F: FnOnce() -> T,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message);
        self.publish(outcome);
    }

    pub(crate) fn publish(mut self, outcome: std::result::Result<T, String>) {
        if let Some(shared) = self.shared.take() {
            *shared.slot.lock() = Slot::Done(outcome);
            shared.ready.notify_all();
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let mut slot = shared.slot.lock();
            if let Slot::Pending = *slot {
                *slot = Slot::Abandoned;
            }
            drop(slot);
            shared.ready.notify_all();
        }
    }
}

/// The submitter's view of a task's eventual outcome.
pub struct Handle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Handle<T> {
    /// Returns `true` once the outcome has been published (or abandoned).
    pub fn is_finished(&self) -> bool {
        !matches!(*self.shared.slot.lock(), Slot::Pending)
    }

    /// Blocks until the task has run, then moves its value out.
    pub fn join(self) -> Result<T> {
        let mut slot = self.shared.slot.lock();
        self.shared
            .ready
            .wait_while(&mut slot, |s| matches!(s, Slot::Pending));
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Done(Ok(value)) => Ok(value),
            Slot::Done(Err(message)) => Err(TpoolError::TaskFailure(message)),
            Slot::Abandoned => Err(TpoolError::HandleAbandoned),
            Slot::Pending | Slot::Taken => unreachable!("handle joined twice"),
        }
    }
}

impl<T: Clone> Handle<T> {
    /// Blocks until the task has run and returns its outcome.
    ///
    /// May be called repeatedly; every call observes the same outcome.
    pub fn get(&self) -> Result<T> {
        let mut slot = self.shared.slot.lock();
        self.shared
            .ready
            .wait_while(&mut slot, |s| matches!(s, Slot::Pending));
        outcome_of(&slot)
    }

    /// Like [`Handle::get`], but gives up after `timeout` and returns `None`.
    pub fn get_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let mut slot = self.shared.slot.lock();
        let waited = self
            .shared
            .ready
            .wait_while_for(&mut slot, |s| matches!(s, Slot::Pending), timeout);
        if waited.timed_out() && matches!(*slot, Slot::Pending) {
            return None;
        }
        Some(outcome_of(&slot))
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.shared.slot.lock() {
            Slot::Pending => "pending",
            Slot::Done(Ok(_)) | Slot::Taken => "done",
            Slot::Done(Err(_)) => "failed",
            Slot::Abandoned => "abandoned",
        };
        f.debug_struct("Handle").field("state", &state).finish()
    }
}

fn outcome_of<T: Clone>(slot: &Slot<T>) -> Result<T> {
    match slot {
        Slot::Done(Ok(value)) => Ok(value.clone()),
        Slot::Done(Err(message)) => Err(TpoolError::TaskFailure(message.clone())),
        Slot::Abandoned => Err(TpoolError::HandleAbandoned),
        // `get` borrows the handle, so nothing can have taken the value.
        Slot::Pending | Slot::Taken => unreachable!("outcome read before it was published"),
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
