//! Logger implementation
//!
//! A [`Logger`] is a cheap handle: clones share one identity, one prefix and
//! one set of switches. All loggers created by the same registry share the
//! pipeline state, so deduplication and prefix alignment span every logger
//! of that registry.

use super::{
    formatter::{format_subject, format_timestamp, generate_log_stack, render_subject},
    location::LocationTag,
    log_level::LogLevel,
    state::{Observation, PipelineState, SharedContext},
    subject::{LogValue, Subject},
    writer::{deliver, PendingWrite},
};
use crate::sinks::{SinkHandle, SinkSelector};
use chrono::Local;
use parking_lot::RwLock;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

pub(crate) struct LoggerInner {
    id: u64,
    prefix: Option<String>,
    pub(crate) enabled: AtomicBool,
    pub(crate) min_level: RwLock<LogLevel>,
    selector: RwLock<SinkSelector>,
    sync: AtomicBool,
    trace_calls: AtomicBool,
    context: Arc<SharedContext>,
}

/// Initial switches for a new logger, taken from its registry.
pub(crate) struct LoggerSeed {
    pub(crate) id: u64,
    pub(crate) prefix: Option<String>,
    pub(crate) enabled: bool,
    pub(crate) min_level: LogLevel,
    pub(crate) sync: bool,
    pub(crate) sink: Option<SinkHandle>,
}

impl Logger {
    pub(crate) fn new(seed: LoggerSeed, context: Arc<SharedContext>) -> Self {
        let selector = match seed.sink {
            Some(sink) => SinkSelector::Fixed(sink),
            None => SinkSelector::Console,
        };

        Self {
            inner: Arc::new(LoggerInner {
                id: seed.id,
                prefix: seed.prefix.filter(|p| !p.is_empty()),
                enabled: AtomicBool::new(seed.enabled),
                min_level: RwLock::new(seed.min_level),
                selector: RwLock::new(selector),
                sync: AtomicBool::new(seed.sync),
                trace_calls: AtomicBool::new(false),
                context,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<LoggerInner> {
        Arc::downgrade(&self.inner)
    }

    /// Identity used for deduplication. Clones share it.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the prefix, `None` for an unprefixed logger
    pub fn prefix(&self) -> Option<&str> {
        self.inner.prefix.as_deref()
    }

    /// Pin every level to `sink`, replacing the stdout/stderr split.
    pub fn bind_sink(&self, sink: impl Into<SinkHandle>) -> &Self {
        *self.inner.selector.write() = SinkSelector::Fixed(sink.into());
        self
    }

    /// `true` writes inline; `false` hands writes to the registry's
    /// background writer, which keeps call order.
    ///
    /// Deferred lines are only guaranteed to reach their sink after
    /// [`LoggerRegistry::flush`](crate::LoggerRegistry::flush), an explicit
    /// shutdown, or the registry being dropped. The process-wide registry
    /// behind [`logger`](crate::logger), [`module`](crate::module) and
    /// [`to`](crate::to) is never dropped, so call `global().flush()` before
    /// exiting or queued lines are lost.
    pub fn set_sync(&self, sync: bool) -> &Self {
        self.inner.sync.store(sync, Ordering::Relaxed);
        self
    }

    /// Check whether writes happen inline
    pub fn is_sync(&self) -> bool {
        self.inner.sync.load(Ordering::Relaxed)
    }

    /// Follow every message with a `function@file:line:column` line.
    pub fn with_source(&self, enabled: bool) -> &Self {
        self.inner.trace_calls.store(enabled, Ordering::Relaxed);
        self
    }

    /// Same as [`Logger::with_source`].
    pub fn enable_trace(&self, enabled: bool) -> &Self {
        self.with_source(enabled)
    }

    /// Check whether call-site lines are emitted
    pub fn is_tracing(&self) -> bool {
        self.inner.trace_calls.load(Ordering::Relaxed)
    }

    /// Enable regardless of registry silence.
    pub fn on(&self) -> &Self {
        self.set_enabled(true)
    }

    /// Disable regardless of registry silence.
    pub fn off(&self) -> &Self {
        self.set_enabled(false)
    }

    /// Enable or disable this logger
    pub fn set_enabled(&self, enabled: bool) -> &Self {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
        self
    }

    /// Check whether this logger writes anything at all
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Set the lowest level this logger writes
    pub fn set_min_level(&self, level: LogLevel) -> &Self {
        *self.inner.min_level.write() = level;
        self
    }

    /// Get the lowest level this logger writes
    pub fn min_level(&self) -> LogLevel {
        *self.inner.min_level.read()
    }

    #[track_caller]
    pub fn debug(&self, subject: impl Into<Subject>) {
        self.dispatch(LogLevel::Debug, subject.into(), &[], Location::caller());
    }

    #[track_caller]
    pub fn info(&self, subject: impl Into<Subject>) {
        self.dispatch(LogLevel::Info, subject.into(), &[], Location::caller());
    }

    #[track_caller]
    pub fn notice(&self, subject: impl Into<Subject>) {
        self.dispatch(LogLevel::Notice, subject.into(), &[], Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, subject: impl Into<Subject>) {
        self.dispatch(LogLevel::Warn, subject.into(), &[], Location::caller());
    }

    #[track_caller]
    pub fn error(&self, subject: impl Into<Subject>) {
        self.dispatch(LogLevel::Error, subject.into(), &[], Location::caller());
    }

    #[track_caller]
    pub fn critical(&self, subject: impl Into<Subject>) {
        self.dispatch(LogLevel::Critical, subject.into(), &[], Location::caller());
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, subject: impl Into<Subject>) {
        self.dispatch(level, subject.into(), &[], Location::caller());
    }

    /// Log `subject` with printf-style arguments (`%s %d %i %f %j %o %O %%`).
    /// Surplus arguments are appended, separated by spaces.
    #[track_caller]
    pub fn log_args(&self, level: LogLevel, subject: impl Into<Subject>, args: &[LogValue]) {
        self.dispatch(level, subject.into(), args, Location::caller());
    }

    fn accepts(&self, level: LogLevel) -> bool {
        self.is_enabled() && level.weight() >= self.min_level().weight()
    }

    fn dispatch(
        &self,
        level: LogLevel,
        subject: Subject,
        args: &[LogValue],
        caller: &'static Location<'static>,
    ) {
        if !self.accepts(level) {
            return;
        }

        let subject = format_subject(subject, args);
        let mut staged = Vec::new();
        {
            let mut state = self.inner.context.state.lock();
            self.emit(&mut state, &mut staged, level, subject, caller);
        }

        // Sinks run unlocked, so a sink may log through this registry
        let context = &self.inner.context;
        for write in staged {
            match write {
                Staged::Inline(w) => deliver(&w.sink, &w.text, w.lines, &context.metrics),
                Staged::Deferred(w) => context.writer.enqueue(w.sink, w.text, w.lines),
            }
        }
    }

    fn emit(
        &self,
        state: &mut PipelineState,
        staged: &mut Vec<Staged>,
        level: LogLevel,
        subject: Subject,
        caller: &'static Location<'static>,
    ) {
        let context = &self.inner.context;
        let body = render_subject(&subject);

        if !subject.is_location() {
            match state.observe(level, self.id(), subject.is_error(), &body) {
                Observation::Repeat => {
                    context.metrics.record_repeat();
                    return;
                }
                Observation::Fresh { summary: Some((previous, count)) } => {
                    if self.accepts(previous) {
                        let tag = LocationTag::repeat_summary(count);
                        self.emit(state, staged, previous, Subject::Location(tag), caller);
                    }
                }
                Observation::Fresh { summary: None } => {}
            }
        }

        let trace = if self.is_tracing() && !subject.is_location() {
            context
                .locator
                .locate(caller)
                .map(|site| LocationTag::call_site(&site))
        } else {
            None
        };

        if subject.is_error() {
            let tag = LocationTag::new(body);
            self.emit(state, staged, level, Subject::Location(tag), caller);
        } else {
            let lines = generate_log_stack(
                level.weight(),
                self.prefix(),
                &body,
                state.max_prefix_len(),
                |line| {
                    if context.colors {
                        level.colorize(line)
                    } else {
                        line.to_string()
                    }
                },
            );
            self.stage(staged, level, &lines);
        }

        if let Some(tag) = trace {
            self.emit(state, staged, level, Subject::Location(tag), caller);
        }
    }

    fn stage(&self, staged: &mut Vec<Staged>, level: LogLevel, lines: &[String]) {
        let timestamp = format_timestamp(&Local::now());
        let mut text = String::new();
        for line in lines {
            text.push_str(&timestamp);
            text.push(' ');
            text.push_str(line);
            text.push('\n');
        }

        let write = PendingWrite {
            sink: self.inner.selector.read().select(level),
            text,
            lines: lines.len() as u64,
        };

        if self.is_sync() {
            // One sink write per call and sink keeps a message in one piece
            match staged.last_mut() {
                Some(Staged::Inline(last)) if last.sink.ptr_eq(&write.sink) => {
                    last.append(write);
                }
                _ => staged.push(Staged::Inline(write)),
            }
        } else if staged.iter().any(|s| matches!(s, Staged::Deferred(_))) {
            staged.push(Staged::Deferred(write));
        } else if let Some(write) = self.inner.context.writer.try_enqueue(write) {
            staged.push(Staged::Deferred(write));
        }
    }
}

/// A write decided while the pipeline state was locked.
enum Staged {
    /// Performed by the calling thread once the lock is released.
    Inline(PendingWrite),
    /// Queue was full or closed; handed to the deferred writer after the
    /// lock is released.
    Deferred(PendingWrite),
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("id", &self.id())
            .field("prefix", &self.prefix())
            .field("enabled", &self.is_enabled())
            .field("min_level", &self.min_level())
            .field("sync", &self.is_sync())
            .field("trace", &self.is_tracing())
            .finish()
    }
}
