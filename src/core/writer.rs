//! Deferred writer
//!
//! Background thread that performs sink writes for loggers in deferred mode.
//! Writes are queued in call order on one FIFO per registry, so output order
//! matches the order in which the pipeline emitted lines.

use super::error::{LoggerError, Result};
use super::metrics::LoggerMetrics;
use crate::sinks::SinkHandle;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default shutdown timeout for draining the queue (5 seconds)
///
/// Used when a registry is dropped without an explicit shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Queue capacity. A full queue blocks the caller rather than dropping lines.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

const BATCH_SIZE: usize = 64;

thread_local! {
    static ON_WRITER_THREAD: Cell<bool> = const { Cell::new(false) };
    #[allow(clippy::missing_const_for_thread_local)]
    static ACTIVE_SINKS: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

/// A sink write that has not been performed yet.
pub(crate) struct PendingWrite {
    pub(crate) sink: SinkHandle,
    pub(crate) text: String,
    pub(crate) lines: u64,
}

impl PendingWrite {
    /// Merge `other` into this write. Both must target the same sink.
    pub(crate) fn append(&mut self, other: PendingWrite) {
        self.text.push_str(&other.text);
        self.lines += other.lines;
    }
}

enum Command {
    Write(PendingWrite),
    Flush(Sender<()>),
}

pub struct DeferredWriter {
    sender: Mutex<Option<Sender<Command>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    metrics: Arc<LoggerMetrics>,
}

impl DeferredWriter {
    pub fn new(metrics: Arc<LoggerMetrics>) -> Self {
        Self {
            sender: Mutex::new(None),
            handle: Mutex::new(None),
            stopped: AtomicBool::new(false),
            metrics,
        }
    }

    /// Whether the background thread has been started
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Queue `text` for `sink`, blocking while the queue is full. Starts the
    /// worker on first use. After shutdown, or when called from the worker
    /// itself, the write happens inline.
    pub fn enqueue(&self, sink: SinkHandle, text: String, lines: u64) {
        let write = PendingWrite { sink, text, lines };
        if let Some(write) = self.send(write, true) {
            deliver(&write.sink, &write.text, write.lines, &self.metrics);
        }
    }

    /// Queue without blocking. Hands the write back if the queue is full or
    /// the worker cannot take it.
    pub(crate) fn try_enqueue(&self, write: PendingWrite) -> Option<PendingWrite> {
        self.send(write, false)
    }

    fn send(&self, write: PendingWrite, block: bool) -> Option<PendingWrite> {
        // The worker would wait on its own queue
        if ON_WRITER_THREAD.with(Cell::get) {
            return Some(write);
        }

        let mut sender = self.sender.lock();
        if sender.is_none() && !self.stopped.load(Ordering::Acquire) {
            *sender = self.start();
        }
        let Some(tx) = sender.as_ref() else {
            return Some(write);
        };

        let sent = if block {
            tx.send(Command::Write(write)).map_err(|e| e.into_inner())
        } else {
            tx.try_send(Command::Write(write)).map_err(|e| e.into_inner())
        };

        match sent {
            Ok(()) => {
                self.metrics.record_deferred();
                None
            }
            Err(Command::Write(write)) => Some(write),
            // Only writes are sent here
            Err(Command::Flush(_)) => None,
        }
    }

    fn start(&self) -> Option<Sender<Command>> {
        let (tx, rx) = bounded(DEFAULT_QUEUE_CAPACITY);
        let metrics = Arc::clone(&self.metrics);

        let spawned = thread::Builder::new()
            .name("fm-log-writer".to_string())
            .spawn(move || run(rx, metrics));

        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                Some(tx)
            }
            Err(e) => {
                eprintln!(
                    "[LOGGER ERROR] Failed to start deferred writer: {}. Writing synchronously.",
                    e
                );
                self.stopped.store(true, Ordering::Release);
                None
            }
        }
    }

    /// Block until every write queued before this call has reached its sink
    /// and the sink has been flushed.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        {
            let sender = self.sender.lock();
            let Some(tx) = sender.as_ref() else {
                return Ok(());
            };
            tx.send(Command::Flush(ack_tx))
                .map_err(|_| LoggerError::WriterStopped)?;
        }

        ack_rx.recv_timeout(timeout).map_err(|e| {
            if e.is_timeout() {
                LoggerError::FlushTimeout(timeout)
            } else {
                LoggerError::WriterStopped
            }
        })
    }

    /// Close the queue and wait for the worker to drain it.
    ///
    /// Returns `false` if the worker panicked or did not finish in time.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.stopped.store(true, Ordering::Release);
        drop(self.sender.lock().take());

        let Some(handle) = self.handle.lock().take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Deferred writer panicked during shutdown: {:?}", e);
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Deferred writer did not finish within {:?} timeout. \
                     Some lines may be lost.",
                    timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for DeferredWriter {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

fn run(receiver: Receiver<Command>, metrics: Arc<LoggerMetrics>) {
    ON_WRITER_THREAD.with(|flag| flag.set(true));
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    let mut dirty: Vec<SinkHandle> = Vec::new();

    loop {
        match receiver.recv() {
            Ok(command) => batch.push(command),
            Err(_) => break,
        }

        while batch.len() < BATCH_SIZE {
            match receiver.try_recv() {
                Ok(command) => batch.push(command),
                Err(_) => break,
            }
        }

        for command in batch.drain(..) {
            match command {
                Command::Write(write) => {
                    deliver(&write.sink, &write.text, write.lines, &metrics);
                    if !dirty.iter().any(|seen| seen.ptr_eq(&write.sink)) {
                        dirty.push(write.sink);
                    }
                }
                Command::Flush(ack) => {
                    flush_all(&mut dirty);
                    let _ = ack.send(());
                }
            }
        }

        flush_all(&mut dirty);
    }

    flush_all(&mut dirty);
}

fn flush_all(dirty: &mut Vec<SinkHandle>) {
    for sink in dirty.drain(..) {
        let result = catch_unwind(AssertUnwindSafe(|| sink.lock().flush()));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                eprintln!("[LOGGER ERROR] Sink '{}' flush failed: {}", sink.name(), e);
            }
            Err(panic_info) => {
                eprintln!(
                    "[LOGGER CRITICAL] Sink '{}' panicked during flush: {}",
                    sink.name(),
                    panic_message(&*panic_info)
                );
            }
        }
    }
}

/// Marks a sink as being written by the current thread.
struct ActiveSink(usize);

impl ActiveSink {
    /// `None` if this thread is already inside a write to `sink`.
    fn enter(sink: &SinkHandle) -> Option<Self> {
        let addr = sink.addr();
        ACTIVE_SINKS.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&addr) {
                None
            } else {
                active.push(addr);
                Some(ActiveSink(addr))
            }
        })
    }
}

impl Drop for ActiveSink {
    fn drop(&mut self) {
        let _ = ACTIVE_SINKS.try_with(|active| active.borrow_mut().retain(|addr| *addr != self.0));
    }
}

/// Write `text` to `sink`, isolating errors and panics.
///
/// Failures are reported on stderr and counted; they never reach the caller.
/// A write issued from inside the same sink's own `write` is dropped, since
/// the sink is still locked by the outer call.
pub(crate) fn deliver(sink: &SinkHandle, text: &str, lines: u64, metrics: &LoggerMetrics) {
    let Some(_active) = ActiveSink::enter(sink) else {
        eprintln!("[LOGGER ERROR] Sink re-entered from its own write. {} line(s) dropped.", lines);
        metrics.record_failure();
        return;
    };

    let result = catch_unwind(AssertUnwindSafe(|| sink.lock().write(text)));

    match result {
        Ok(Ok(())) => {
            metrics.record_written(lines);
        }
        Ok(Err(e)) => {
            eprintln!("[LOGGER ERROR] Sink '{}' failed: {}", sink.name(), e);
            metrics.record_failure();
        }
        Err(panic_info) => {
            eprintln!(
                "[LOGGER CRITICAL] Sink '{}' panicked: {}. Logging continues.",
                sink.name(),
                panic_message(&*panic_info)
            );
            metrics.record_failure();
        }
    }
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
