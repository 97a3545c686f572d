//! In-memory sink for capturing output in tests

use super::Sink;
use crate::core::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use strip_ansi_escapes::strip;

/// Captures every line written to it. Clones share the same buffer, so a
/// test can keep one clone and bind the other to a logger.
///
/// ```
/// use fm_log::{LoggerRegistry, MemorySink};
///
/// let registry = LoggerRegistry::new();
/// let sink = MemorySink::new();
/// let log = registry.create(Some("app"), Some(sink.clone().into()));
///
/// log.info("ready");
/// assert_eq!(sink.len(), 1);
/// assert!(sink.lines()[0].ends_with("[INFO  ] (app) ready"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<MemoryBuffer>>,
}

#[derive(Debug, Default)]
struct MemoryBuffer {
    /// Lines with ANSI codes stripped
    lines: Vec<String>,
    /// Lines as written
    raw_lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured lines, ANSI codes stripped
    pub fn lines(&self) -> Vec<String> {
        self.buffer.lock().lines.clone()
    }

    /// Captured lines with ANSI codes preserved
    pub fn raw_lines(&self) -> Vec<String> {
        self.buffer.lock().raw_lines.clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any captured line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.buffer.lock().lines.iter().any(|line| line.contains(needle))
    }

    pub fn clear(&self) {
        let mut buffer = self.buffer.lock();
        buffer.lines.clear();
        buffer.raw_lines.clear();
    }
}

impl Sink for MemorySink {
    fn write(&mut self, text: &str) -> Result<()> {
        let mut buffer = self.buffer.lock();
        for line in text.strip_suffix('\n').unwrap_or(text).split('\n') {
            buffer
                .lines
                .push(String::from_utf8_lossy(&strip(line)).into_owned());
            buffer.raw_lines.push(line.to_string());
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
