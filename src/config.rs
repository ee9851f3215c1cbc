use crate::error::{Error, Result};

/// Smallest stack a worker thread may be configured with.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Number of hardware threads available to this process, never less than 1.
///
/// Queried fresh on every call; queues call it once at construction.
pub fn hardware_concurrency() -> usize {
    num_cpus::get().max(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Requested worker count. `None` means one per hardware thread.
    pub num_threads: Option<usize>,
    /// Pending-task bound. `None` means unbounded.
    pub max_elements: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            max_elements: None,
            thread_name_prefix: "forkq-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_elements == Some(0) {
            return Err(Error::config(
                "max_elements must be > 0 (leave unset for unbounded)",
            ));
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::config(format!(
                    "stack_size too small (min {} bytes)",
                    MIN_STACK_SIZE
                )));
            }
        }

        Ok(())
    }

    /// Effective worker count on this machine.
    pub fn worker_threads(&self) -> usize {
        Self::clamp_threads(self.num_threads, hardware_concurrency())
    }

    /// Clamps a requested worker count into `[1, available]`.
    pub fn clamp_threads(requested: Option<usize>, available: usize) -> usize {
        let available = available.max(1);
        requested.unwrap_or(available).clamp(1, available)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn max_elements(mut self, max: usize) -> Self {
        self.config.max_elements = Some(max);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.config.max_elements = None;
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

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
