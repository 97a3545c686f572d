//! Standard output and standard error sinks

use super::{Sink, SinkHandle};
use crate::core::{LoggerError, Result};
use once_cell::sync::Lazy;
use std::io::Write;

static STDOUT: Lazy<SinkHandle> = Lazy::new(|| SinkHandle::new(StdoutSink));
static STDERR: Lazy<SinkHandle> = Lazy::new(|| SinkHandle::new(StderrSink));

/// Process-wide stdout handle used by the default selector.
pub fn stdout() -> SinkHandle {
    STDOUT.clone()
}

/// Process-wide stderr handle used by the default selector.
pub fn stderr() -> SinkHandle {
    STDERR.clone()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn write(&mut self, text: &str) -> Result<()> {
        std::io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .map_err(|e| LoggerError::io_operation("writing to stdout", "write failed", e))
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl Sink for StderrSink {
    fn write(&mut self, text: &str) -> Result<()> {
        std::io::stderr()
            .lock()
            .write_all(text.as_bytes())
            .map_err(|e| LoggerError::io_operation("writing to stderr", "write failed", e))
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "stderr"
    }
}
