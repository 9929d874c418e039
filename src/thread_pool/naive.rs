use std::thread::{self, ThreadId};

use log::error;
use parking_lot::{Condvar, Mutex};

use super::ThreadPool;
use crate::error::{Result, TpoolError};

struct State {
    stopped: bool,
    threads: Vec<thread::JoinHandle<()>>,
    /// Threads being joined by the first `shutdown` caller.
    joining: Vec<ThreadId>,
    joined: bool,
}

/// Spawns a fresh OS thread for every job.
pub struct NaiveThreadPool {
    state: Mutex<State>,
    joined: Condvar,
}

impl ThreadPool for NaiveThreadPool {
    fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(TpoolError::config("need at least 1 thread"));
        }
        Ok(Self {
            state: Mutex::new(State {
                stopped: false,
                threads: Vec::new(),
                joining: Vec::new(),
                joined: false,
            }),
            joined: Condvar::new(),
        })
    }

    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(TpoolError::PoolStopped);
        }
        state.threads.retain(|t| !t.is_finished());
        let thread = thread::Builder::new()
            .spawn(job)
            .map_err(TpoolError::Spawn)?;
        state.threads.push(thread);
        Ok(())
    }

    fn shutdown(&self) {
        let current = thread::current().id();
        let mut state = self.state.lock();
        if !state.stopped {
            state.stopped = true;
            let threads = std::mem::take(&mut state.threads);
            state.joining = threads.iter().map(|t| t.thread().id()).collect();
            drop(state);
            for thread in threads {
                if thread.thread().id() == current {
                    continue;
                }
                if let Err(e) = thread.join() {
                    error!("job thread panicked: {:?}", e);
                }
            }
            self.state.lock().joined = true;
            self.joined.notify_all();
            return;
        }
        if state.joining.contains(&current) {
            return;
        }
        self.joined.wait_while(&mut state, |state| !state.joined);
    }
}

impl Drop for NaiveThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
