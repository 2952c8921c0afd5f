//! Connection and dispatcher settings.
//!
//! # Design
//! `ConfigHolder` is the only mutable state shared between callers and the
//! dispatcher. It stores the whole `ConnectionConfig` behind one `Mutex` and
//! swaps it as a unit, so a snapshot is always entirely old or entirely new.
//! The lock covers the pointer swap and the snapshot clone, never any I/O.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::CpasError;

/// The four values every call URL is assembled from.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    base_url: String,
    api_key: String,
    host: String,
    port: String,
}

impl ConnectionConfig {
    /// Validate and build a configuration. Every value must be non-empty.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Result<Self, CpasError> {
        let config = Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            host: host.into(),
            port: port.into(),
        };
        for (name, value) in [
            ("base_url", &config.base_url),
            ("api_key", &config.api_key),
            ("host", &config.host),
            ("port", &config.port),
        ] {
            if value.is_empty() {
                return Err(CpasError::Configuration(format!("{name} must not be empty")));
            }
        }
        Ok(config)
    }

    /// Read `CPAS_API_URL`, `CPAS_API_KEY`, `CPAS_SERVER_IP` and
    /// `CPAS_SERVER_PORT`.
    pub fn from_env() -> Result<Self, CpasError> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| CpasError::Configuration(format!("{name} is not set")))
        };
        Self::new(
            var("CPAS_API_URL")?,
            var("CPAS_API_KEY")?,
            var("CPAS_SERVER_IP")?,
            var("CPAS_SERVER_PORT")?,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// `base_url/api_key/host/port/path`.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{path}",
            self.base_url, self.api_key, self.host, self.port
        )
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Lock-guarded holder of the current `ConnectionConfig`.
#[derive(Debug, Default)]
pub struct ConfigHolder {
    current: Mutex<Option<Arc<ConnectionConfig>>>,
}

impl ConfigHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all four values at once. Nothing changes if validation fails.
    pub fn reconfigure(
        &self,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Result<(), CpasError> {
        let next = ConnectionConfig::new(base_url, api_key, host, port)?;
        self.replace(next);
        Ok(())
    }

    pub fn replace(&self, config: ConnectionConfig) {
        let next = Arc::new(config);
        *self.lock() = Some(next);
    }

    /// The configuration in effect right now.
    pub fn snapshot(&self) -> Result<Arc<ConnectionConfig>, CpasError> {
        self.lock()
            .clone()
            .ok_or_else(|| CpasError::Configuration("connection is not configured".to_string()))
    }

    // The guarded value is replaced whole, so a poisoned lock still holds a
    // consistent configuration.
    fn lock(&self) -> MutexGuard<'_, Option<Arc<ConnectionConfig>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sizing and timing of the dispatcher's worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum calls running at once; further calls queue without bound.
    pub max_workers: usize,
    /// How long an idle handler thread lives before it is reclaimed.
    pub idle_timeout: Duration,
    /// Hard limit on a single fetch, from send to fully read body.
    pub fetch_timeout: Duration,
    /// Threads driving the asynchronous network I/O.
    pub io_threads: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            idle_timeout: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(5),
            io_threads: 2,
        }
    }
}

impl DispatcherConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_io_threads(mut self, io_threads: usize) -> Self {
        self.io_threads = io_threads;
        self
    }

    pub fn validate(&self) -> Result<(), CpasError> {
        if self.max_workers == 0 {
            return Err(CpasError::Configuration("max_workers must be at least 1".to_string()));
        }
        if self.io_threads == 0 {
            return Err(CpasError::Configuration("io_threads must be at least 1".to_string()));
        }
        if self.idle_timeout.is_zero() {
            return Err(CpasError::Configuration("idle_timeout must be non-zero".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(CpasError::Configuration("fetch_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}
