//! Logging macros with printf-style arguments.
//!
//! Arguments may be any `serde::Serialize` value and are substituted into
//! `%s %d %i %f %j %o %O` directives in order. Arguments without a matching
//! directive are appended, separated by spaces.
//!
//! # Examples
//!
//! ```
//! use fm_log::prelude::*;
//! use fm_log::{info, warn};
//!
//! let registry = LoggerRegistry::builder().colors(false).build();
//! let sink = MemorySink::new();
//! let logger = registry.create(None, Some(sink.clone().into()));
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port %d", port);
//!
//! // Structured values
//! warn!(logger, "Slow request %j", serde_json::json!({ "ms": 900 }));
//!
//! assert!(sink.lines()[1].ends_with("Server listening on port 8080"));
//! assert!(sink.lines()[2].ends_with(r#"Slow request {"ms":900}"#));
//! ```

/// Log at an explicit level.
///
/// # Examples
///
/// ```
/// # use fm_log::prelude::*;
/// # let logger = LoggerRegistry::new().create(None, Some(MemorySink::new().into()));
/// use fm_log::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: %d", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $subject:expr $(,)?) => {
        $logger.log($level, $subject)
    };
    ($logger:expr, $level:expr, $subject:expr, $($arg:expr),+ $(,)?) => {
        $logger.log_args(
            $level,
            $subject,
            &[$($crate::LogValue::from_serialize(&$arg)),+],
        )
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a notice-level message.
#[macro_export]
macro_rules! notice {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Notice, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message.
///
/// ```
/// # use fm_log::prelude::*;
/// # let logger = LoggerRegistry::new().create(None, Some(MemorySink::new().into()));
/// use fm_log::critical;
/// critical!(logger, "Shutting down: %s", "out of memory");
/// ```
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}
