//! Sink over any `io::Write`

use super::Sink;
use crate::core::Result;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes lines to an arbitrary byte stream (a file, a socket, a pipe).
pub struct StreamSink<W: Write + Send> {
    writer: W,
    name: String,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            name: "stream".to_string(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl StreamSink<BufWriter<File>> {
    /// Open `path` for appending, creating it when missing.
    pub fn append_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)).with_name(path.display().to_string()))
    }
}

impl<W: Write + Send> Sink for StreamSink<W> {
    fn write(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<W: Write + Send> Drop for StreamSink<W> {
    fn drop(&mut self) {
        // Buffered writers lose data otherwise
        let _ = self.writer.flush();
    }
}
