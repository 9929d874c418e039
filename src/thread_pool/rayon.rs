use log::{error, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use super::{handle::panic_message, ThreadPool};
use crate::error::{Result, TpoolError};

struct InFlight {
    stopped: bool,
    running: usize,
}

struct Tracker {
    state: Mutex<InFlight>,
    idle: Condvar,
}

/// Decrements the in-flight count even if the job unwinds.
struct Finished(Arc<Tracker>);

impl Drop for Finished {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.running -= 1;
        if state.running == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Delegates to a rayon pool; shutdown waits for every accepted job.
pub struct RayonThreadPool {
    pool: ::rayon::ThreadPool,
    tracker: Arc<Tracker>,
}

impl ThreadPool for RayonThreadPool {
    fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(TpoolError::config("need at least 1 thread"));
        }
        let pool = ::rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tpool-rayon-{}", i))
            .panic_handler(|payload| error!("job panicked: {}", panic_message(payload)))
            .build()?;
        Ok(Self {
            pool,
            tracker: Arc::new(Tracker {
                state: Mutex::new(InFlight {
                    stopped: false,
                    running: 0,
                }),
                idle: Condvar::new(),
            }),
        })
    }

    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.tracker.state.lock();
        if state.stopped {
            return Err(TpoolError::PoolStopped);
        }
        state.running += 1;
        drop(state);
        let finished = Finished(self.tracker.clone());
        self.pool.spawn(move || {
            let _finished = finished;
            job();
        });
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.tracker.state.lock();
        state.stopped = true;
        if self.pool.current_thread_index().is_some() {
            warn!("shutdown requested from inside the pool, not waiting for running jobs");
            return;
        }
        self.tracker
            .idle
            .wait_while(&mut state, |s| s.running > 0);
    }
}

impl Drop for RayonThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
