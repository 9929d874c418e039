use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, ThreadId},
};

use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};

use super::{
    handle::panic_message,
    queue::TaskQueue,
    stats::{Counters, PoolStats},
    Job, ThreadPool,
};
use crate::config::{PoolConfig, ShutdownPolicy};
use crate::error::{Result, TpoolError};

/// Fixed set of worker threads consuming one shared FIFO queue.
pub struct SharedQueueThreadPool {
    queue: Arc<TaskQueue>,
    workers: Mutex<Workers>,
    joined: Condvar,
    counters: Arc<Counters>,
    policy: ShutdownPolicy,
    num_threads: usize,
}

/// Lifecycle of the worker threads, advanced by the first `shutdown` caller.
enum Workers {
    Running(Vec<Worker>),
    /// The first caller is joining these threads.
    Joining(Vec<ThreadId>),
    Joined,
}

impl SharedQueueThreadPool {
    pub fn with_config(config: &PoolConfig) -> Result<Self> {
        Self::start(config, Worker::spawn)
    }

    fn start<S>(config: &PoolConfig, mut spawn_worker: S) -> Result<Self>
    where
        S: FnMut(usize, &PoolConfig, Arc<TaskQueue>, Arc<Counters>) -> Result<Worker>,
    {
        config.validate()?;
        let num_threads = config.worker_threads();
        let pool = SharedQueueThreadPool {
            queue: Arc::new(TaskQueue::new()),
            workers: Mutex::new(Workers::Running(Vec::with_capacity(num_threads))),
            joined: Condvar::new(),
            counters: Arc::new(Counters::default()),
            policy: config.shutdown_policy,
            num_threads,
        };
        for id in 0..num_threads {
            // On error `pool` is dropped here, which stops the workers already running.
            let worker = spawn_worker(id, config, pool.queue.clone(), pool.counters.clone())?;
            if let Workers::Running(workers) = &mut *pool.workers.lock() {
                workers.push(worker);
            }
        }
        debug!("started pool with {} workers", num_threads);
        Ok(pool)
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Number of jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.num_threads, self.queue.len())
    }
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(threads: usize) -> Result<Self> {
        Self::with_config(&PoolConfig::builder().num_threads(threads).build()?)
    }

    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.counters.on_submit(1);
        self.queue.push(Box::new(job)).map_err(|e| {
            self.counters.on_rejected(1);
            e
        })
    }

    fn spawn_batch(&self, jobs: Vec<Job>) -> Result<()> {
        let n = jobs.len();
        self.counters.on_submit(n);
        self.queue.push_batch(jobs).map_err(|e| {
            self.counters.on_rejected(n);
            e
        })
    }

    /// Stops accepting jobs and blocks until every worker has been joined.
    ///
    /// Concurrent and repeated calls wait for the first one to finish joining.
    /// When called from one of this pool's own workers (including the last
    /// `Drop` of a pool shared into its own tasks), that worker is not joined:
    /// it returns to its loop, finishes the remaining queued jobs together with
    /// the others and exits after this call has returned.
    fn shutdown(&self) {
        let abandoned = self.queue.close(self.policy);
        if !abandoned.is_empty() {
            warn!("shutdown abandoned {} queued jobs", abandoned.len());
            self.counters.on_abandoned(abandoned.len());
        }
        // Dropping the jobs releases their handles as abandoned.
        drop(abandoned);

        let current = thread::current().id();
        let mut state = self.workers.lock();
        if let Workers::Running(workers) = &mut *state {
            let workers = std::mem::take(workers);
            *state = Workers::Joining(workers.iter().map(Worker::thread_id).collect());
            drop(state);
            for worker in workers {
                worker.join(current);
            }
            *self.workers.lock() = Workers::Joined;
            self.joined.notify_all();
            return;
        }
        if let Workers::Joining(ids) = &*state {
            if ids.contains(&current) {
                // the joining caller is waiting for this very thread
                return;
            }
        }
        self.joined
            .wait_while(&mut state, |workers| !matches!(workers, Workers::Joined));
    }
}

impl Drop for SharedQueueThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn spawn(
        id: usize,
        config: &PoolConfig,
        queue: Arc<TaskQueue>,
        counters: Arc<Counters>,
    ) -> Result<Self> {
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let thread = builder
            .spawn(move || Self::run(id, &queue, &counters))
            .map_err(TpoolError::Spawn)?;
        Ok(Worker { id, thread })
    }

    fn run(id: usize, queue: &TaskQueue, counters: &Counters) {
        debug!("worker {} started", id);
        while let Some(job) = queue.pop_blocking() {
            // submitted tasks catch their own panics; only detached jobs land here
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                counters.on_panic();
                error!("worker {}: job panicked: {}", id, panic_message(payload));
            }
            counters.on_executed();
        }
        debug!("worker {} exiting", id);
    }

    fn thread_id(&self) -> ThreadId {
        self.thread.thread().id()
    }

    fn join(self, current: ThreadId) {
        if self.thread_id() == current {
            warn!("worker {} requested shutdown of its own pool, not joining itself", self.id);
            return;
        }
        if let Err(e) = self.thread.join() {
            error!("worker {} terminated abnormally: {:?}", self.id, e);
        }
    }
}
