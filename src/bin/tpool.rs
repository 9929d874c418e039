use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use tpool::{
    images::{ImageSet, RgbDecoder},
    NaiveThreadPool, PoolConfig, RayonThreadPool, SharedQueueThreadPool, ShutdownPolicy,
    ThreadPool,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Worker threads (defaults to the number of CPUs)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode every image under a directory
    Images {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run many tiny counter tasks through a pool
    Stress {
        #[arg(long, default_value_t = 10_000)]
        tasks: usize,
        #[arg(value_enum, long, default_value_t = Backend::Shared)]
        backend: Backend,
        #[arg(value_enum, long, default_value_t = Policy::Drain)]
        policy: Policy,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Backend {
    Shared,
    Rayon,
    Naive,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Policy {
    Drain,
    Abandon,
}

impl From<Policy> for ShutdownPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Drain => ShutdownPolicy::Drain,
            Policy::Abandon => ShutdownPolicy::Abandon,
        }
    }
}

fn main() -> tpool::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let cli = Cli::parse();
    info!("tpool {}", env!("CARGO_PKG_VERSION"));

    let mut builder = PoolConfig::builder();
    if let Some(threads) = cli.threads {
        builder = builder.num_threads(threads);
    }

    match cli.command {
        Commands::Images { dir, json } => {
            let config = builder.build()?;
            let pool = SharedQueueThreadPool::with_config(&config)?;
            let images = ImageSet::load(&dir, &pool, Arc::new(RgbDecoder))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&images.summaries())?);
            } else {
                for image in images.iter() {
                    println!("{} {}x{}", image.name, image.width, image.height);
                }
                println!("{} images", images.len());
            }
        }
        Commands::Stress {
            tasks,
            backend,
            policy,
            json,
        } => {
            let config = builder.shutdown_policy(policy.into()).build()?;
            let threads = config.worker_threads();
            info!("stress: {} tasks on {:?} backend, {} threads", tasks, backend, threads);
            match backend {
                Backend::Shared => {
                    let pool = SharedQueueThreadPool::with_config(&config)?;
                    stress(&pool, tasks)?;
                    if json {
                        println!("{}", serde_json::to_string(&pool.stats())?);
                    }
                }
                Backend::Rayon => stress(&RayonThreadPool::new(threads)?, tasks)?,
                Backend::Naive => stress(&NaiveThreadPool::new(threads)?, tasks)?,
            }
        }
    }
    Ok(())
}

fn stress<P: ThreadPool>(pool: &P, tasks: usize) -> tpool::Result<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    for _ in 0..tasks {
        let counter = counter.clone();
        pool.spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })?;
    }
    pool.shutdown();
    println!(
        "counter = {} after {:?}",
        counter.load(Ordering::SeqCst),
        start.elapsed()
    );
    Ok(())
}
