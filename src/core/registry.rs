//! Logger registry
//!
//! Creates loggers that share one pipeline, derives default names from the
//! calling file, and broadcasts silence and level changes to every logger it
//! created.

use super::{
    error::Result,
    location::{BacktraceLocator, CallerLocator},
    log_level::LogLevel,
    logger::{Logger, LoggerInner, LoggerSeed},
    metrics::LoggerMetrics,
    state::SharedContext,
    writer::DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::sinks::SinkHandle;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::panic::Location;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Registry settings. Serializable so host applications can embed them in
/// their own configuration.
///
/// ```
/// use fm_log::{LogLevel, RegistryConfig};
///
/// let config: RegistryConfig =
///     serde_json::from_str(r#"{ "min_level": "Warn", "colors": false }"#).unwrap();
/// assert_eq!(config.min_level, LogLevel::Warn);
/// assert!(config.sync);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Initial minimum level of new loggers
    pub min_level: LogLevel,
    /// Whether new loggers start disabled
    pub silent: bool,
    /// Colorize lines by level
    pub colors: bool,
    /// Default write mode of new loggers
    pub sync: bool,
    /// Upper bound for [`LoggerRegistry::flush`]
    pub flush_timeout_ms: u64,
}

impl RegistryConfig {
    /// Parse settings from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// [`LoggerError::JsonError`](super::LoggerError::JsonError) if `json` is
    /// malformed or a field has the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            silent: false,
            colors: true,
            sync: true,
            flush_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}

pub struct LoggerRegistry {
    context: Arc<SharedContext>,
    loggers: Mutex<Vec<Weak<LoggerInner>>>,
    silent: AtomicBool,
    min_level: RwLock<LogLevel>,
    default_sync: bool,
    next_id: AtomicU64,
}

impl LoggerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::from_parts(config, Arc::new(BacktraceLocator))
    }

    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    fn from_parts(config: RegistryConfig, locator: Arc<dyn CallerLocator>) -> Self {
        let context = SharedContext::new(
            locator,
            config.colors,
            Duration::from_millis(config.flush_timeout_ms),
        );

        Self {
            context: Arc::new(context),
            loggers: Mutex::new(Vec::new()),
            silent: AtomicBool::new(config.silent),
            min_level: RwLock::new(config.min_level),
            default_sync: config.sync,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a logger named `name`.
    ///
    /// `None` names the logger after the calling file, without extension.
    /// `Some("")` asks for a logger without prefix. A non-empty name widens
    /// the shared alignment if it is the longest seen so far.
    #[track_caller]
    pub fn create_named(&self, name: Option<&str>, sink: Option<SinkHandle>) -> Logger {
        let name = match name {
            Some(name) => Some(name.to_string()),
            None => caller_name(Location::caller()),
        };

        if let Some(name) = name.as_deref().filter(|n| !n.is_empty()) {
            self.context.state.lock().note_prefix(name);
        }

        self.create(name.as_deref(), sink)
    }

    /// Create a logger with `prefix` as-is. Does not touch the alignment
    /// width.
    pub fn create(&self, prefix: Option<&str>, sink: Option<SinkHandle>) -> Logger {
        let logger = Logger::new(
            LoggerSeed {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                prefix: prefix.map(str::to_string),
                enabled: !self.is_silent(),
                min_level: self.min_level(),
                sync: self.default_sync,
                sink,
            },
            Arc::clone(&self.context),
        );

        let mut loggers = self.loggers.lock();
        loggers.retain(|weak| weak.strong_count() > 0);
        loggers.push(logger.downgrade());

        logger
    }

    /// Disable (or re-enable) every logger created so far. Loggers created
    /// later start in the new state but can be switched individually.
    pub fn silence(&self, silent: bool) {
        self.silent.store(silent, Ordering::Relaxed);
        self.for_each_logger(|logger| logger.enabled.store(!silent, Ordering::Relaxed));
    }

    /// Check whether new loggers start disabled
    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::Relaxed)
    }

    /// Set the default level and overwrite the level of every existing
    /// logger, individual overrides included.
    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
        self.for_each_logger(|logger| *logger.min_level.write() = level);
    }

    /// Get the level new loggers start with
    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    /// Width every prefix block is aligned to.
    pub fn max_prefix_len(&self) -> usize {
        self.context.state.lock().max_prefix_len()
    }

    /// Number of loggers from this registry that are still alive.
    pub fn logger_count(&self) -> usize {
        self.loggers
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Get the counters shared by every logger of this registry
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.context.metrics
    }

    /// Wait until every deferred write issued so far has reached its sink.
    ///
    /// # Errors
    ///
    /// [`LoggerError::FlushTimeout`](super::LoggerError::FlushTimeout) if the
    /// writer does not catch up in time.
    pub fn flush(&self) -> Result<()> {
        self.context.writer.flush(self.context.flush_timeout)
    }

    /// Drain and stop the background writer. Deferred loggers write inline
    /// afterwards. Returns `false` if draining did not finish in `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.context.writer.shutdown(timeout)
    }

    fn for_each_logger(&self, apply: impl Fn(&LoggerInner)) {
        let mut loggers = self.loggers.lock();
        loggers.retain(|weak| match weak.upgrade() {
            Some(logger) => {
                apply(&logger);
                true
            }
            None => false,
        });
    }
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoggerRegistry {
    fn drop(&mut self) {
        self.context.writer.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

fn caller_name(location: &Location<'_>) -> Option<String> {
    Path::new(location.file())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Builder for [`LoggerRegistry`]
///
/// # Example
/// ```
/// use fm_log::prelude::*;
/// use std::sync::Arc;
///
/// let registry = LoggerRegistry::builder()
///     .min_level(LogLevel::Info)
///     .colors(false)
///     .sync(false)
///     .locator(Arc::new(TrackCallerLocator))
///     .build();
///
/// assert_eq!(registry.min_level(), LogLevel::Info);
/// ```
pub struct RegistryBuilder {
    config: RegistryConfig,
    locator: Option<Arc<dyn CallerLocator>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            locator: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.config.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn silent(mut self, silent: bool) -> Self {
        self.config.silent = silent;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn colors(mut self, colors: bool) -> Self {
        self.config.colors = colors;
        self
    }

    /// Default write mode for new loggers
    #[must_use = "builder methods return a new value"]
    pub fn sync(mut self, sync: bool) -> Self {
        self.config.sync = sync;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.config.flush_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replace the default [`BacktraceLocator`].
    #[must_use = "builder methods return a new value"]
    pub fn locator(mut self, locator: Arc<dyn CallerLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn build(self) -> LoggerRegistry {
        let locator = self.locator.unwrap_or_else(|| Arc::new(BacktraceLocator));
        LoggerRegistry::from_parts(self.config, locator)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
