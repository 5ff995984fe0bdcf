use super::{
    errors::SpawnError,
    result::SpawnResult,
};
use std::env;
use log::warn;


pub const ENV_THREADS: &str = "TASK_POOL_THREADS";
pub const ENV_MAX_PENDING: &str = "TASK_POOL_MAX_PENDING";
pub const ENV_OVERFLOW: &str = "TASK_POOL_OVERFLOW";

/// Поведение `submit` при переполненной ограниченной очереди
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Ждать, пока воркер освободит место (или пул закроется)
    #[default]
    Block,
    /// Сразу вернуть `SpawnError::QueueFull`
    Reject,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = SpawnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "reject" => Ok(OverflowPolicy::Reject),
            other => Err(SpawnError::config(format!("unknown overflow policy: {}", other))),
        }
    }
}

/// Конфигурация пула потоков
///
/// `max_pending = None` - очередь не ограничена: если задачи поступают быстрее,
/// чем воркеры их выполняют, память растет без предела.
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub max_pending: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub failure_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            max_pending: None,
            overflow_policy: OverflowPolicy::Block,
            thread_name_prefix: "task-pool".to_string(),
            stack_size: None,
            failure_capacity: 1024,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_threads: num_cpus,
            max_pending: Some(num_cpus * 64),
            overflow_policy: OverflowPolicy::Block,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_threads: num_cpus * 2,
            max_pending: None,
            ..Default::default()
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Значения по умолчанию, переопределенные через `TASK_POOL_THREADS`,
    /// `TASK_POOL_MAX_PENDING` и `TASK_POOL_OVERFLOW`
    pub fn from_env() -> SpawnResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = env::var(ENV_THREADS) {
            config.num_threads = v
                .trim()
                .parse()
                .map_err(|e| SpawnError::config(format!("{}={:?}: {}", ENV_THREADS, v, e)))?;
        }
        if let Ok(v) = env::var(ENV_MAX_PENDING) {
            let cap: usize = v
                .trim()
                .parse()
                .map_err(|e| SpawnError::config(format!("{}={:?}: {}", ENV_MAX_PENDING, v, e)))?;
            config.max_pending = Some(cap);
        }
        if let Ok(v) = env::var(ENV_OVERFLOW) {
            config.overflow_policy = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SpawnResult<()> {
        if self.max_pending == Some(0) {
            return Err(SpawnError::config("max_pending must be > 0"));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(SpawnError::config("thread_name_prefix must not be empty"));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(SpawnError::config("thread_name_prefix must not contain NUL bytes"));
        }
        Ok(())
    }

    /// Фактическое число воркеров, не меньше одного
    pub fn worker_threads(&self) -> usize {
        if self.num_threads == 0 {
            warn!("num_threads = 0 requested, clamping to 1 worker");
            return 1;
        }
        self.num_threads
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
        self.config.num_threads = n;
        self
    }

    pub fn max_pending(mut self, cap: usize) -> Self {
        self.config.max_pending = Some(cap);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.config.max_pending = None;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
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

    pub fn failure_capacity(mut self, cap: usize) -> Self {
        self.config.failure_capacity = cap;
        self
    }

    pub fn build(self) -> SpawnResult<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
