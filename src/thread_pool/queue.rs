use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use super::Job;
use crate::config::ShutdownPolicy;
use crate::error::{Result, TpoolError};

struct State {
    jobs: VecDeque<Job>,
    stopped: bool,
}

/// FIFO of pending jobs shared by every worker of a pool.
///
/// The job list and the shutdown flag sit behind the same lock, so a worker
/// waiting on an empty queue cannot miss the transition to stopped.
pub(crate) struct TaskQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                jobs: VecDeque::new(),
                stopped: false,
            }),
            available: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, job: Job) -> Result<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(TpoolError::PoolStopped);
        }
        state.jobs.push_back(job);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Appends every job under a single lock, then wakes all idle workers.
    pub(crate) fn push_batch(&self, jobs: Vec<Job>) -> Result<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(TpoolError::PoolStopped);
        }
        if jobs.is_empty() {
            return Ok(());
        }
        state.jobs.extend(jobs);
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    /// Removes the head job, blocking while the queue is empty and running.
    ///
    /// Returns `None` once the queue is stopped and drained.
    pub(crate) fn pop_blocking(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.stopped {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Stops accepting jobs and wakes every waiting worker.
    ///
    /// Under [`ShutdownPolicy::Abandon`] the queued jobs are handed back so the
    /// caller can drop them outside the lock.
    pub(crate) fn close(&self, policy: ShutdownPolicy) -> Vec<Job> {
        let mut state = self.state.lock();
        state.stopped = true;
        let abandoned = match policy {
            ShutdownPolicy::Drain => Vec::new(),
            ShutdownPolicy::Abandon => state.jobs.drain(..).collect(),
        };
        drop(state);
        self.available.notify_all();
        abandoned
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }
}
