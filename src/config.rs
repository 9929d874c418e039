use crate::error::{Result, TpoolError};

const MAX_THREADS: usize = 1024;

/// What happens to jobs still queued when a pool shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Workers keep consuming until the queue is empty, then exit.
    #[default]
    Drain,
    /// Queued jobs are dropped unrun; their handles report `HandleAbandoned`.
    Abandon,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_threads: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "tpool-worker".to_string(),
            stack_size: None,
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(TpoolError::config("num_threads must be > 0"));
            }
            if n > MAX_THREADS {
                return Err(TpoolError::config(format!(
                    "num_threads too large (max {})",
                    MAX_THREADS
                )));
            }
        }
        if let Some(0) = self.stack_size {
            return Err(TpoolError::config("stack_size must be > 0"));
        }
        Ok(())
    }

    /// Worker count, falling back to the available hardware parallelism.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: PoolConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.config.shutdown_policy = policy;
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
