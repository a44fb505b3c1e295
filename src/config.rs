use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::time::Duration;

/// Upper bound on slots; slot indices and generations must stay addressable.
pub const MAX_CAPACITY: usize = 1 << 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub capacity: usize,
    pub worker_threads: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub tick_budget: Duration,
    pub steps_per_turn: usize,
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 256,
            worker_threads: None,
            thread_name_prefix: "stepwork-worker".to_string(),
            stack_size: None,
            tick_budget: Duration::from_millis(2),
            steps_per_turn: 8,
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::config("capacity must be > 0"));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(Error::config(format!(
                "capacity too large (max {})",
                MAX_CAPACITY
            )));
        }

        if let Some(n) = self.worker_threads {
            if n > 1024 {
                return Err(Error::config("worker_threads too large (max 1024)"));
            }
        }

        if self.tick_budget.is_zero() {
            return Err(Error::config("tick_budget must be > 0"));
        }

        if self.steps_per_turn == 0 {
            return Err(Error::config("steps_per_turn must be > 0"));
        }

        Ok(())
    }

    /// Number of background workers to spawn. Always 0 without the
    /// `threading` feature.
    pub fn worker_threads(&self) -> usize {
        if cfg!(feature = "threading") {
            self.worker_threads.unwrap_or_else(num_cpus::get)
        } else {
            0
        }
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

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn worker_threads(mut self, n: usize) -> Self {
        self.config.worker_threads = Some(n);
        self
    }

    /// Run everything on the thread that calls `Scheduler::tick`.
    pub fn main_thread_only(self) -> Self {
        self.worker_threads(0)
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn tick_budget(mut self, budget: Duration) -> Self {
        self.config.tick_budget = budget;
        self
    }

    pub fn steps_per_turn(mut self, steps: usize) -> Self {
        self.config.steps_per_turn = steps;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
