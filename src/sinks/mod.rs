//! Sinks: destinations for finished log lines

pub mod console;
pub mod memory;
pub mod stream;

pub use console::{StderrSink, StdoutSink};
pub use memory::MemorySink;
pub use stream::StreamSink;

use crate::core::{LogLevel, Result};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// A write destination.
///
/// Every `write` receives one or more complete, newline-terminated lines.
pub trait Sink: Send {
    fn write(&mut self, text: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}

/// Shareable handle to a sink. Clones refer to the same sink.
#[derive(Clone)]
pub struct SinkHandle(Arc<Mutex<dyn Sink>>);

impl SinkHandle {
    pub fn new<S: Sink + 'static>(sink: S) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }

    /// Lock the sink for a write or flush.
    pub fn lock(&self) -> MutexGuard<'_, dyn Sink> {
        self.0.lock()
    }

    /// Whether both handles refer to the same sink.
    pub fn ptr_eq(&self, other: &SinkHandle) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn name(&self) -> String {
        self.0.lock().name().to_string()
    }
}

impl<S: Sink + 'static> From<S> for SinkHandle {
    fn from(sink: S) -> Self {
        SinkHandle::new(sink)
    }
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SinkHandle").field(&self.name()).finish()
    }
}

/// Chooses the sink for a line of a given level.
#[derive(Debug, Clone, Default)]
pub enum SinkSelector {
    /// `ERROR` and above to stderr, everything else to stdout.
    #[default]
    Console,
    /// Every level to one sink.
    Fixed(SinkHandle),
}

impl SinkSelector {
    pub fn select(&self, level: LogLevel) -> SinkHandle {
        match self {
            SinkSelector::Console if level.is_error_stream() => console::stderr(),
            SinkSelector::Console => console::stdout(),
            SinkSelector::Fixed(sink) => sink.clone(),
        }
    }
}
