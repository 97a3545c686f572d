//! # fm_log
//!
//! A leveled console logger with aligned prefixes, repeat collapsing and
//! optional call-site tracing.
//!
//! ## Features
//!
//! - **Aligned output**: every logger's `(prefix)` block is right-aligned to
//!   the longest prefix seen, and multi-line messages stay in one column
//! - **Deduplication**: identical consecutive messages collapse into a
//!   `Last message repeated N times.` summary
//! - **Call-site tracing**: `function@file:line:column` after each message
//! - **Deferred writes**: an ordered background writer per registry
//!
//! ```
//! use fm_log::prelude::*;
//!
//! let registry = LoggerRegistry::builder().colors(false).build();
//! let sink = MemorySink::new();
//! let db = registry.create_named(Some("db"), Some(sink.clone().into()));
//!
//! db.info("connected");
//! db.warn("slow query\ntook 3s");
//!
//! let lines = sink.lines();
//! assert!(lines[0].ends_with("[INFO  ] (db) connected"));
//! assert!(lines[2].ends_with("              took 3s"));
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

use once_cell::sync::Lazy;

pub mod prelude {
    pub use crate::core::{
        BacktraceLocator, CallSite, CallerLocator, ErrorLike, LocationTag, LogLevel, LogValue,
        Logger, LoggerError, LoggerMetrics, LoggerRegistry, RegistryBuilder, RegistryConfig,
        Result, SharedValue, Subject, TrackCallerLocator, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{MemorySink, Sink, SinkHandle, StderrSink, StdoutSink, StreamSink};
}

pub use crate::core::{
    BacktraceLocator, CallSite, CallerLocator, ErrorLike, LocationTag, LogLevel, LogValue, Logger,
    LoggerError, LoggerMetrics, LoggerRegistry, RegistryBuilder, RegistryConfig, Result,
    SharedValue, Subject, TrackCallerLocator, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::sinks::{MemorySink, Sink, SinkHandle, StderrSink, StdoutSink, StreamSink};

static GLOBAL: Lazy<LoggerRegistry> = Lazy::new(LoggerRegistry::new);

static DEFAULT_LOGGER: Lazy<Logger> = Lazy::new(|| GLOBAL.create(None, None));

/// Process-wide registry used by [`logger`], [`module`] and [`to`].
///
/// It is never dropped; call [`LoggerRegistry::flush`] before exit when
/// loggers of this registry write in deferred mode.
pub fn global() -> &'static LoggerRegistry {
    &GLOBAL
}

/// Shared unprefixed logger of the global registry.
pub fn logger() -> Logger {
    DEFAULT_LOGGER.clone()
}

/// Logger of the global registry named `name`, or after the calling file
/// when `name` is `None`.
#[track_caller]
pub fn module(name: Option<&str>) -> Logger {
    GLOBAL.create_named(name, None)
}

/// Unprefixed logger of the global registry writing every level to `sink`.
pub fn to(sink: impl Into<SinkHandle>) -> Logger {
    GLOBAL.create(None, Some(sink.into()))
}
