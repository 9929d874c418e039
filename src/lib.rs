//! A fixed-size worker pool over a single shared FIFO queue.
//!
//! Computations are submitted as closures and come back as [`Handle`]s that
//! block until the result (or the captured panic) is available:
//!
//! ```no_run
//! use tpool::{SharedQueueThreadPool, ThreadPool};
//!
//! let pool = SharedQueueThreadPool::new(4).unwrap();
//! let squares = pool.submit_batch((1..=3).map(|x| move || x * x)).unwrap();
//! let squares: Vec<i32> = squares.iter().map(|h| h.get().unwrap()).collect();
//! assert_eq!(squares, vec![1, 4, 9]);
//! ```
//!
//! The [`images`] module is a small consumer that decodes a directory of
//! pictures on a pool.

pub mod config;
mod error;
pub mod images;
pub mod thread_pool;

pub use config::{ConfigBuilder, PoolConfig, ShutdownPolicy};
pub use error::{Result, TpoolError};
pub use thread_pool::{
    Handle, Job, NaiveThreadPool, PoolStats, RayonThreadPool, SharedQueueThreadPool, ThreadPool,
};
