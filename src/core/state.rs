//! Shared pipeline state
//!
//! All loggers of one registry share a [`SharedContext`]. Its
//! [`PipelineState`] holds everything a log call reads and then writes back:
//! the last emission, the repeat counter and the widest prefix seen. One
//! mutex guards all three.

use super::location::CallerLocator;
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::writer::DeferredWriter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// The (level, logger, message) triple of the most recent emission.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LastEmission {
    level: LogLevel,
    logger: u64,
    is_error: bool,
    message: String,
}

/// Outcome of checking a call against the last emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Exact repeat; emit nothing.
    Repeat,
    /// New message. `summary` carries the level and count of repeats held
    /// back for the previous message, if any.
    Fresh { summary: Option<(LogLevel, u64)> },
}

#[derive(Debug, Default)]
pub struct PipelineState {
    last: Option<LastEmission>,
    repeated: u64,
    max_prefix_len: usize,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a call with the last emission and record it.
    ///
    /// A repeat only bumps the counter. Anything else becomes the new last
    /// emission and hands back the pending repeat count, which is reset.
    pub fn observe(
        &mut self,
        level: LogLevel,
        logger: u64,
        is_error: bool,
        message: &str,
    ) -> Observation {
        if let Some(last) = &self.last {
            if last.level == level
                && last.logger == logger
                && last.is_error == is_error
                && last.message == message
            {
                self.repeated += 1;
                return Observation::Repeat;
            }
        }

        let summary = match (&self.last, self.repeated) {
            (Some(last), count) if count > 0 => Some((last.level, count)),
            _ => None,
        };
        self.repeated = 0;
        self.last = Some(LastEmission {
            level,
            logger,
            is_error,
            message: message.to_string(),
        });

        Observation::Fresh { summary }
    }

    /// Repeats held back for the current last emission.
    pub fn repeat_count(&self) -> u64 {
        self.repeated
    }

    /// Widen the alignment width if `name` is longer than any before it.
    /// The width never shrinks.
    pub fn note_prefix(&mut self, name: &str) -> usize {
        self.max_prefix_len = self.max_prefix_len.max(name.chars().count());
        self.max_prefix_len
    }

    pub fn max_prefix_len(&self) -> usize {
        self.max_prefix_len
    }
}

/// Everything the loggers of one registry share.
pub(crate) struct SharedContext {
    pub(crate) state: Mutex<PipelineState>,
    pub(crate) writer: DeferredWriter,
    pub(crate) locator: Arc<dyn CallerLocator>,
    pub(crate) metrics: Arc<LoggerMetrics>,
    pub(crate) colors: bool,
    pub(crate) flush_timeout: Duration,
}

impl SharedContext {
    pub(crate) fn new(
        locator: Arc<dyn CallerLocator>,
        colors: bool,
        flush_timeout: Duration,
    ) -> Self {
        let metrics = Arc::new(LoggerMetrics::new());
        Self {
            state: Mutex::new(PipelineState::new()),
            writer: DeferredWriter::new(Arc::clone(&metrics)),
            locator,
            metrics,
            colors,
            flush_timeout,
        }
    }
}
