use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

const MIN_STACK_SIZE: usize = 16 * 1024;
const MAX_WORKERS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: Option<usize>,
    pub worker_name_prefix: String,
    pub loop_thread_name: String,
    pub stack_size: Option<usize>,

    /// Rewrite each worker's name to `"<name> (<thread id>)"` once its thread is up.
    pub tag_names_with_thread: bool,

    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: None,
            worker_name_prefix: "Worker".to_string(),
            loop_thread_name: "taskloop-main".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            tag_names_with_thread: false,
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_workers {
            if n == 0 {
                return Err(Error::config("num_workers must be > 0"));
            }
            if n > MAX_WORKERS {
                return Err(Error::config(format!(
                    "num_workers too large (max {})",
                    MAX_WORKERS
                )));
            }
        }

        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::config(format!(
                    "stack_size must be at least {} bytes",
                    MIN_STACK_SIZE
                )));
            }
        }

        if self.loop_thread_name.contains('\0') || self.worker_name_prefix.contains('\0') {
            return Err(Error::config("thread names may not contain NUL bytes"));
        }

        Ok(())
    }

    /// Number of workers a [`Runtime`](crate::Runtime) creates; one per CPU unless set.
    pub fn worker_count(&self) -> usize {
        self.num_workers.unwrap_or_else(num_cpus::get)
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

    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = Some(n);
        self
    }

    pub fn worker_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.worker_name_prefix = prefix.into();
        self
    }

    pub fn loop_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.loop_thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn tag_names_with_thread(mut self, tag: bool) -> Self {
        self.config.tag_names_with_thread = tag;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .num_workers(3)
            .worker_name_prefix("Pool")
            .tag_names_with_thread(true)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();

        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.worker_name_prefix, "Pool");
        assert!(config.tag_names_with_thread);
        assert_eq!(config.panic_strategy, PanicStrategy::Isolate);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::builder().num_workers(0).build().is_err());
        assert!(Config::builder().num_workers(MAX_WORKERS + 1).build().is_err());
        assert!(Config::builder().stack_size(1024).build().is_err());
        assert!(Config::builder().loop_thread_name("bad\0name").build().is_err());
    }
}
