use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::sync::WaitGroup;
use rand::Rng;
use tpool::{
    NaiveThreadPool, PoolConfig, RayonThreadPool, Result, SharedQueueThreadPool,
    ShutdownPolicy, ThreadPool, TpoolError,
};

fn spawn_counter<P: ThreadPool>(pool: P) -> Result<()> {
    const TASK_NUM: usize = 20;
    const ADD_COUNT: usize = 1000;

    let wg = WaitGroup::new();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..TASK_NUM {
        let counter = Arc::clone(&counter);
        let wg = wg.clone();
        pool.spawn(move || {
            for _ in 0..ADD_COUNT {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            drop(wg);
        })?;
    }

    wg.wait();
    assert_eq!(counter.load(Ordering::SeqCst), TASK_NUM * ADD_COUNT);
    Ok(())
}

fn spawn_panic_task<P: ThreadPool>() -> Result<()> {
    const TASK_NUM: usize = 1000;

    let pool = P::new(4)?;
    for _ in 0..TASK_NUM {
        pool.spawn(move || {
            // keeps the expected panics off the console
            panic_control::disable_hook_in_current_thread();
            panic!();
        })?;
    }

    spawn_counter(pool)
}

fn every_task_runs_once<P: ThreadPool>() -> Result<()> {
    const TASK_NUM: usize = 500;

    let pool = P::new(4)?;
    let log = Arc::new(Mutex::new(Vec::new()));
    let handles = (0..TASK_NUM)
        .map(|id| {
            let log = log.clone();
            pool.submit(move || log.lock().unwrap().push(id))
        })
        .collect::<Result<Vec<_>>>()?;
    for handle in handles {
        handle.join()?;
    }

    let mut seen = log.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..TASK_NUM).collect::<Vec<_>>());
    Ok(())
}

fn failure_does_not_kill_workers<P: ThreadPool>() -> Result<()> {
    let pool = P::new(2)?;
    let failing = pool.submit(|| -> u32 {
        panic_control::disable_hook_in_current_thread();
        panic!("bad input")
    })?;
    let handles = pool.submit_batch((0..50u32).map(|i| move || i + 1))?;

    match failing.get() {
        Err(TpoolError::TaskFailure(msg)) => assert_eq!(msg, "bad input"),
        other => panic!("expected task failure, got {:?}", other),
    }
    let total: u32 = handles.iter().map(|h| h.get().unwrap()).sum();
    assert_eq!(total, (1..=50).sum::<u32>());
    Ok(())
}

fn batch_keeps_input_order<P: ThreadPool>() -> Result<()> {
    let pool = P::new(3)?;
    let handles = pool.submit_batch([1, 2, 3].iter().map(|&x| move || x * x))?;
    let squares: Vec<i32> = handles.iter().map(|h| h.get().unwrap()).collect();
    assert_eq!(squares, vec![1, 4, 9]);
    Ok(())
}

fn submit_after_shutdown_fails<P: ThreadPool>() -> Result<()> {
    let pool = P::new(2)?;
    pool.shutdown();
    assert!(matches!(pool.submit(|| 1), Err(TpoolError::PoolStopped)));
    assert!(matches!(pool.spawn(|| {}), Err(TpoolError::PoolStopped)));
    assert!(matches!(
        pool.submit_batch((0..2).map(|i| move || i)),
        Err(TpoolError::PoolStopped)
    ));
    // a second shutdown is a no-op
    pool.shutdown();
    Ok(())
}

fn shutdown_waits_for_accepted_tasks<P: ThreadPool>() -> Result<()> {
    const TASK_NUM: usize = 8;

    let pool = P::new(2)?;
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..TASK_NUM {
        let done = done.clone();
        pool.spawn(move || {
            thread::sleep(Duration::from_millis(20));
            done.fetch_add(1, Ordering::SeqCst);
        })?;
    }
    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), TASK_NUM);
    Ok(())
}

fn second_shutdown_waits_for_first<P: ThreadPool + Send + Sync + 'static>() -> Result<()> {
    let pool = Arc::new(P::new(1)?);
    let done = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    {
        let done = done.clone();
        pool.spawn(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(300));
            done.store(true, Ordering::SeqCst);
        })?;
    }
    started_rx.recv().unwrap();

    let first = {
        let pool = pool.clone();
        thread::spawn(move || pool.shutdown())
    };
    thread::sleep(Duration::from_millis(50));
    pool.shutdown();
    assert!(done.load(Ordering::SeqCst));
    first.join().unwrap();
    Ok(())
}

#[test]
fn naive_thread_pool_spawn_counter() -> Result<()> {
    let pool = NaiveThreadPool::new(4)?;
    spawn_counter(pool)
}

#[test]
fn shared_queue_thread_pool_spawn_counter() -> Result<()> {
    let pool = SharedQueueThreadPool::new(4)?;
    spawn_counter(pool)
}

#[test]
fn rayon_thread_pool_spawn_counter() -> Result<()> {
    let pool = RayonThreadPool::new(4)?;
    spawn_counter(pool)
}

#[test]
fn shared_queue_thread_pool_panic_task() -> Result<()> {
    spawn_panic_task::<SharedQueueThreadPool>()
}

#[test]
fn rayon_thread_pool_panic_task() -> Result<()> {
    spawn_panic_task::<RayonThreadPool>()
}

#[test]
fn every_task_runs_exactly_once() -> Result<()> {
    every_task_runs_once::<SharedQueueThreadPool>()?;
    every_task_runs_once::<RayonThreadPool>()?;
    every_task_runs_once::<NaiveThreadPool>()
}

#[test]
fn failing_task_is_isolated() -> Result<()> {
    failure_does_not_kill_workers::<SharedQueueThreadPool>()?;
    failure_does_not_kill_workers::<RayonThreadPool>()?;
    failure_does_not_kill_workers::<NaiveThreadPool>()
}

#[test]
fn batch_handles_match_inputs() -> Result<()> {
    batch_keeps_input_order::<SharedQueueThreadPool>()?;
    batch_keeps_input_order::<RayonThreadPool>()?;
    batch_keeps_input_order::<NaiveThreadPool>()
}

#[test]
fn submit_after_shutdown_is_rejected() -> Result<()> {
    submit_after_shutdown_fails::<SharedQueueThreadPool>()?;
    submit_after_shutdown_fails::<RayonThreadPool>()?;
    submit_after_shutdown_fails::<NaiveThreadPool>()
}

#[test]
fn shutdown_drains_accepted_tasks() -> Result<()> {
    shutdown_waits_for_accepted_tasks::<SharedQueueThreadPool>()?;
    shutdown_waits_for_accepted_tasks::<RayonThreadPool>()?;
    shutdown_waits_for_accepted_tasks::<NaiveThreadPool>()
}

#[test]
fn concurrent_shutdown_returns_after_workers_joined() -> Result<()> {
    second_shutdown_waits_for_first::<SharedQueueThreadPool>()?;
    second_shutdown_waits_for_first::<RayonThreadPool>()?;
    second_shutdown_waits_for_first::<NaiveThreadPool>()
}

#[test]
fn zero_threads_is_a_config_error() {
    assert!(matches!(
        SharedQueueThreadPool::new(0),
        Err(TpoolError::Config(_))
    ));
    assert!(matches!(RayonThreadPool::new(0), Err(TpoolError::Config(_))));
    assert!(matches!(NaiveThreadPool::new(0), Err(TpoolError::Config(_))));
}

#[test]
fn get_blocks_until_task_has_run() -> Result<()> {
    let pool = SharedQueueThreadPool::new(2)?;
    let start = Instant::now();
    let handle = pool.submit(|| {
        thread::sleep(Duration::from_millis(100));
        "slept"
    })?;
    assert_eq!(handle.get()?, "slept");
    assert!(start.elapsed() >= Duration::from_millis(100));
    Ok(())
}

#[test]
fn get_is_idempotent() -> Result<()> {
    let pool = SharedQueueThreadPool::new(2)?;
    let ok = pool.submit(|| vec![1, 2, 3])?;
    assert_eq!(ok.get()?, vec![1, 2, 3]);
    assert_eq!(ok.get()?, vec![1, 2, 3]);

    let failed = pool.submit_result(|| -> std::result::Result<u8, String> {
        Err("no such file".to_string())
    })?;
    for _ in 0..2 {
        match failed.get() {
            Err(TpoolError::TaskFailure(msg)) => assert_eq!(msg, "no such file"),
            other => panic!("expected task failure, got {:?}", other),
        }
    }
    Ok(())
}

#[test]
fn submit_result_passes_values_through() -> Result<()> {
    let pool = SharedQueueThreadPool::new(1)?;
    let handle = pool.submit_result(|| "42".parse::<u32>())?;
    assert_eq!(handle.join()?, 42);
    let handle = pool.submit_result(|| "forty-two".parse::<u32>())?;
    assert!(matches!(handle.join(), Err(TpoolError::TaskFailure(_))));
    Ok(())
}

#[test]
fn single_worker_runs_in_fifo_order() -> Result<()> {
    let pool = SharedQueueThreadPool::new(1)?;
    let log = Arc::new(Mutex::new(Vec::new()));
    let record = |id: usize| {
        let log = log.clone();
        move || log.lock().unwrap().push(id)
    };

    let mut handles = vec![pool.submit(record(0))?];
    handles.extend(pool.submit_batch((1..4).map(record))?);
    handles.push(pool.submit(record(4))?);
    for handle in handles {
        handle.join()?;
    }
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[test]
fn ten_thousand_increments_on_eight_workers() -> Result<()> {
    let pool = SharedQueueThreadPool::new(8)?;
    let counter = Arc::new(Mutex::new(0usize));
    let handles = (0..10_000)
        .map(|_| {
            let counter = counter.clone();
            pool.submit(move || *counter.lock().unwrap() += 1)
        })
        .collect::<Result<Vec<_>>>()?;
    for handle in handles {
        handle.join()?;
    }
    assert_eq!(*counter.lock().unwrap(), 10_000);
    pool.shutdown();
    assert_eq!(pool.stats().executed, 10_000);
    Ok(())
}

#[test]
fn concurrent_submitters() -> Result<()> {
    const SUBMITTERS: usize = 4;
    const PER_SUBMITTER: usize = 250;

    let pool = SharedQueueThreadPool::new(4)?;
    let total = AtomicUsize::new(0);
    crossbeam_utils::thread::scope(|s| {
        for _ in 0..SUBMITTERS {
            s.spawn(|_| {
                let mut rng = rand::thread_rng();
                let handles: Vec<_> = (0..PER_SUBMITTER)
                    .map(|_| {
                        let micros = rng.gen_range(0, 50);
                        pool.submit(move || {
                            thread::sleep(Duration::from_micros(micros));
                            1usize
                        })
                        .unwrap()
                    })
                    .collect();
                for handle in handles {
                    total.fetch_add(handle.join().unwrap(), Ordering::SeqCst);
                }
            });
        }
    })
    .unwrap();
    assert_eq!(total.load(Ordering::SeqCst), SUBMITTERS * PER_SUBMITTER);
    Ok(())
}

#[test]
fn drop_drains_queue() -> Result<()> {
    let done = Arc::new(AtomicUsize::new(0));
    {
        let pool = SharedQueueThreadPool::new(2)?;
        for _ in 0..10 {
            let done = done.clone();
            pool.spawn(move || {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            })?;
        }
    }
    assert_eq!(done.load(Ordering::SeqCst), 10);
    Ok(())
}

#[test]
fn abandon_policy_releases_pending_handles() -> Result<()> {
    let config = PoolConfig::builder()
        .num_threads(1)
        .shutdown_policy(ShutdownPolicy::Abandon)
        .build()?;
    let pool = SharedQueueThreadPool::with_config(&config)?;

    let (started_tx, started_rx) = std::sync::mpsc::channel();
    let blocker = pool.submit(move || {
        started_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        "first"
    })?;
    started_rx.recv().unwrap();
    let queued = pool.submit_batch((0..5).map(|i| move || i))?;
    assert_eq!(pool.queued(), 5);

    pool.shutdown();

    assert_eq!(blocker.get()?, "first");
    for handle in &queued {
        assert!(matches!(handle.get(), Err(TpoolError::HandleAbandoned)));
    }
    let stats = pool.stats();
    assert_eq!(stats.abandoned, 5);
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.in_flight(), 0);
    Ok(())
}

#[test]
fn shutdown_from_inside_a_task_does_not_deadlock() -> Result<()> {
    let pool = Arc::new(SharedQueueThreadPool::new(2)?);
    let inner = pool.clone();
    let handle = pool.submit(move || {
        inner.shutdown();
        inner.submit(|| ()).is_err()
    })?;
    assert!(handle.join()?);
    assert!(matches!(pool.submit(|| ()), Err(TpoolError::PoolStopped)));
    Ok(())
}

#[test]
fn workers_use_configured_names() -> Result<()> {
    let config = PoolConfig::builder()
        .num_threads(2)
        .thread_name_prefix("loader")
        .build()?;
    let pool = SharedQueueThreadPool::with_config(&config)?;
    let name = pool
        .submit(|| thread::current().name().map(str::to_owned))?
        .join()?;
    assert!(name.unwrap().starts_with("loader-"));
    assert_eq!(pool.num_threads(), 2);
    Ok(())
}
