use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use crate::Result;

mod handle;
pub mod naive;
mod queue;
pub mod rayon;
pub mod shared_queue;
mod stats;

pub use handle::Handle;
pub use naive::NaiveThreadPool;
pub use self::rayon::RayonThreadPool;
pub use shared_queue::SharedQueueThreadPool;
pub use stats::PoolStats;

/// A type-erased unit of work: no arguments, no return value.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait ThreadPool {
    fn new(threads: usize) -> Result<Self>
    where
        Self: Sized;

    /// Queues a fire-and-forget job. A panic inside it is logged and otherwise lost.
    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static;

    fn spawn_batch(&self, jobs: Vec<Job>) -> Result<()> {
        for job in jobs {
            self.spawn(job)?;
        }
        Ok(())
    }

    /// Stops accepting work and blocks until the pool's threads are done.
    fn shutdown(&self);

    fn submit<F, T>(&self, f: F) -> Result<Handle<T>>
    where
        Self: Sized,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (completer, handle) = handle::pair();
        self.spawn(move || completer.run(f))?;
        Ok(handle)
    }

    /// Like `submit`, but an `Err` returned by `f` is recorded as a task failure.
    fn submit_result<F, T, E>(&self, f: F) -> Result<Handle<T>>
    where
        Self: Sized,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Display,
    {
        let (completer, handle) = handle::pair();
        self.spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(payload) => Err(handle::panic_message(payload)),
            };
            completer.publish(outcome);
        })?;
        Ok(handle)
    }

    /// Submits every computation at once; handles come back in input order.
    fn submit_batch<I, F, T>(&self, computations: I) -> Result<Vec<Handle<T>>>
    where
        Self: Sized,
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let computations = computations.into_iter();
        let mut jobs: Vec<Job> = Vec::with_capacity(computations.size_hint().0);
        let mut handles = Vec::with_capacity(jobs.capacity());
        for f in computations {
            let (completer, handle) = handle::pair();
            jobs.push(Box::new(move || completer.run(f)));
            handles.push(handle);
        }
        self.spawn_batch(jobs)?;
        Ok(handles)
    }
}
