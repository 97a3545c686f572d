//! Integration tests for the logging pipeline
//!
//! These tests verify:
//! - Line layout with and without prefixes
//! - Prefix alignment across loggers of one registry
//! - Repeat collapsing and summaries
//! - Error rendering and call-site tracing
//! - Silence and level broadcasts
//! - Deferred, order-preserving writes
//! - Sinks that log through their own registry

use fm_log::prelude::*;
use parking_lot::Mutex;
use regex::Regex;
use std::panic::Location;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TIMESTAMP: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3} ";

fn registry() -> LoggerRegistry {
    LoggerRegistry::builder().colors(false).build()
}

/// Captured lines with the timestamp checked and removed.
fn bodies(sink: &MemorySink) -> Vec<String> {
    let timestamp = Regex::new(TIMESTAMP).unwrap();
    sink.lines()
        .iter()
        .map(|line| {
            assert!(timestamp.is_match(line), "missing timestamp: {:?}", line);
            timestamp.replace(line, "").into_owned()
        })
        .collect()
}

#[test]
fn test_unprefixed_logger() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(Some(""), Some(sink.clone().into()));

    log.info("!");
    log.info("!\n!");

    assert_eq!(bodies(&sink), vec!["[INFO  ] !", "[INFO  ] !", "         !"]);
}

#[test]
fn test_all_levels_are_indented() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(Some("foo"), Some(sink.clone().into()));

    log.debug("!");
    log.info("!");
    log.notice("!");
    log.warn("!");
    log.error("!");
    log.critical("!");

    assert_eq!(
        bodies(&sink),
        vec![
            "[DEBUG ] (foo) !",
            "[INFO  ] (foo) !",
            "[NOTICE] (foo) !",
            "[WARN  ] (foo) !",
            "[ERROR ] (foo) !",
            "[CRITIC] (foo) !",
        ]
    );
}

#[test]
fn test_prefixed_multiline() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(Some("foo"), Some(sink.clone().into()));

    log.info("!\n!");

    assert_eq!(bodies(&sink), vec!["[INFO  ] (foo) !", "               !"]);
}

#[test]
fn test_mixed_prefixes_align() {
    let registry = registry();
    let sink = MemorySink::new();
    registry.create_named(Some("module"), Some(sink.clone().into()));
    let foo = registry.create_named(Some("foo"), Some(sink.clone().into()));
    let plain = registry.create(None, Some(sink.clone().into()));

    foo.info("!\n!");
    plain.info("!\n!");

    assert_eq!(
        bodies(&sink),
        vec![
            "[INFO  ] (   foo) !",
            "                  !",
            "[INFO  ]          !",
            "                  !",
        ]
    );
}

#[test]
fn test_alignment_widens_retroactively() {
    let registry = registry();
    let sink = MemorySink::new();
    let foo = registry.create_named(Some("foo"), Some(sink.clone().into()));

    foo.info("before");
    registry.create_named(Some("something"), None);
    foo.info("after");

    assert_eq!(
        bodies(&sink),
        vec!["[INFO  ] (foo) before", "[INFO  ] (      foo) after"]
    );
}

#[test]
fn test_disabled_logger_writes_nothing() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));
    log.off();

    for level in LogLevel::ALL {
        log.log(level, "!");
    }

    assert!(sink.is_empty());
}

#[test]
fn test_disabled_logger_ignores_errors_and_objects() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(Some("off"), Some(sink.clone().into()));
    log.with_source(true);
    log.off();

    log.error(ErrorLike::new("x").with_stack("Error: x\n    at main"));
    log.info(serde_json::json!({ "a": 1, "b": [true] }));
    log.critical(None::<&str>);

    assert!(sink.is_empty());
    assert_eq!(registry.metrics().lines_written(), 0);
}

#[test]
fn test_below_min_level_error_is_not_traced() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));
    log.enable_trace(true);
    log.set_min_level(LogLevel::Critical);

    log.error(ErrorLike::new("x"));
    log.warn(serde_json::json!({ "ignored": true }));

    assert!(sink.is_empty());
}

#[test]
fn test_gated_call_leaves_repeat_tracking_alone() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));
    log.set_min_level(LogLevel::Info);

    log.info("!");
    log.debug("!");
    log.info("!");
    assert_eq!(bodies(&sink), vec!["[INFO  ] !"]);
    assert_eq!(registry.metrics().repeats_suppressed(), 1);

    log.info("?");
    assert_eq!(
        bodies(&sink),
        vec!["[INFO  ] !", "[INFO  ] Last message repeated 1 time.", "[INFO  ] ?"]
    );
}

#[test]
fn test_error_renders_cause_chain() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(Some("module"), Some(sink.clone().into()));

    let err = LoggerError::io_operation(
        "writing report",
        "write failed",
        std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
    );
    log.error(Subject::error(&err));

    assert_eq!(
        bodies(&sink),
        vec![
            "[ERROR ] (module) Error: IO error while writing report: write failed",
            "                      caused by: disk full",
        ]
    );
}

#[test]
fn test_error_without_text_uses_placeholder() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));

    log.error(ErrorLike::default());

    assert_eq!(bodies(&sink), vec!["[ERROR ] <invalid error>"]);
}

#[test]
fn test_source_tracing() {
    let registry = registry();
    let sink = MemorySink::new();
    registry.create_named(Some("module"), None);
    let log = registry.create_named(Some("foo"), Some(sink.clone().into()));
    log.with_source(true);

    fn source(log: &Logger) {
        log.info("!");
    }
    source(&log);

    let lines = bodies(&sink);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "[INFO  ] (   foo) !");

    let trace =
        Regex::new(r"^\[INFO  \] \(   foo\)   \S*source@\S*integration_tests\.rs:\d+:\d+$")
            .unwrap();
    assert!(trace.is_match(&lines[1]), "unexpected trace line: {:?}", lines[1]);
}

#[test]
fn test_trace_follows_error_stack() {
    let registry = LoggerRegistry::builder()
        .colors(false)
        .locator(Arc::new(TrackCallerLocator))
        .build();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));
    log.enable_trace(true);

    let line = Location::caller().line() + 1;
    log.error(ErrorLike::new("boom"));

    let lines = bodies(&sink);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "[ERROR ] boom");
    assert!(lines[1].starts_with("[ERROR ]   (unnamed)@"));
    assert!(lines[1].contains(&format!("integration_tests.rs:{}:", line)));
}

struct NoLocation;

impl CallerLocator for NoLocation {
    fn locate(&self, _caller: &'static Location<'static>) -> Option<CallSite> {
        None
    }
}

#[test]
fn test_unresolvable_location_still_logs() {
    let registry = LoggerRegistry::builder()
        .colors(false)
        .locator(Arc::new(NoLocation))
        .build();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));
    log.with_source(true);

    log.info("!");

    assert_eq!(bodies(&sink), vec!["[INFO  ] !"]);
}

#[test]
fn test_duplicates_are_omitted() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(Some("foo"), Some(sink.clone().into()));

    log.info("!");
    log.info("!");

    assert_eq!(bodies(&sink), vec!["[INFO  ] (foo) !"]);
    assert_eq!(registry.metrics().repeats_suppressed(), 1);
}

#[test]
fn test_duplicates_are_summarized() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(Some("foo"), Some(sink.clone().into()));

    log.info("!");
    log.info("!");
    log.info("!!");
    log.info("!!");
    log.info("!!");
    log.info("-");

    assert_eq!(
        bodies(&sink),
        vec![
            "[INFO  ] (foo) !",
            "[INFO  ] (foo) Last message repeated 1 time.",
            "[INFO  ] (foo) !!",
            "[INFO  ] (foo) Last message repeated 2 times.",
            "[INFO  ] (foo) -",
        ]
    );
}

#[test]
fn test_same_text_from_other_logger_is_not_a_repeat() {
    let registry = registry();
    let sink = MemorySink::new();
    let a = registry.create_named(Some("a"), Some(sink.clone().into()));
    let b = registry.create_named(Some("b"), Some(sink.clone().into()));

    a.info("!");
    b.info("!");
    a.info("!");

    assert_eq!(sink.len(), 3);
}

#[test]
fn test_structured_subjects() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));

    log.info(serde_json::json!({ "a": 1, "b": [true] }));
    log.info(None::<&str>);

    assert_eq!(
        bodies(&sink),
        vec![
            "[INFO  ] {",
            "           \"a\": 1,",
            "           \"b\": [",
            "             true",
            "           ]",
            "         }",
            "[INFO  ] undefined",
        ]
    );
}

#[test]
fn test_cyclic_value_is_elided() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));

    let node = SharedValue::new(LogValue::object([("name", LogValue::from("root"))]));
    node.insert("me", node.clone());
    log.info(node);

    assert_eq!(
        bodies(&sink),
        vec!["[INFO  ] {", "           \"name\": \"root\"", "         }"]
    );
}

#[test]
fn test_request_is_flattened() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));

    log.info(serde_json::json!({
        "method": "GET",
        "url": "/health",
        "headers": {},
        "socket": { "internal": true }
    }));

    assert!(sink.contains("\"method\": \"GET\""));
    assert!(sink.contains("\"originalUrl\": \"undefined\""));
    assert!(!sink.contains("socket"));
}

#[test]
fn test_default_name_from_calling_file() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create_named(None, Some(sink.clone().into()));

    log.info("!");

    assert_eq!(bodies(&sink), vec!["[INFO  ] (integration_tests) !"]);
}

#[test]
fn test_silence() {
    let registry = registry();
    let sink = MemorySink::new();

    let off = registry.create(None, Some(sink.clone().into()));
    off.off();
    off.info("!");
    assert!(sink.is_empty());

    registry.silence(true);
    let silenced = registry.create(None, Some(sink.clone().into()));
    silenced.info("!");
    assert!(sink.is_empty());

    registry.silence(false);
    let fresh = registry.create(None, Some(sink.clone().into()));
    fresh.info("fresh");
    silenced.info("again");
    assert_eq!(bodies(&sink), vec!["[INFO  ] fresh", "[INFO  ] again"]);
}

#[test]
fn test_level_requirements() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));

    log.set_min_level(LogLevel::Error);
    log.debug("!");
    assert!(sink.is_empty());

    log.set_min_level(LogLevel::Debug);
    registry.set_min_level(LogLevel::Error);
    log.debug("!");
    assert!(sink.is_empty());

    log.critical("!");
    assert_eq!(bodies(&sink), vec!["[CRITIC] !"]);
}

#[test]
fn test_deferred_writes_keep_order_across_loggers() {
    let registry = LoggerRegistry::builder().colors(false).sync(false).build();
    let sink = MemorySink::new();
    let a = registry.create(Some("a"), Some(sink.clone().into()));
    let b = registry.create(Some("b"), Some(sink.clone().into()));

    for i in 0..20 {
        a.info(format!("a{}", i));
        b.info(format!("b{}", i));
    }
    registry.flush().expect("flush failed");

    let lines = bodies(&sink);
    assert_eq!(lines.len(), 40);
    for (i, pair) in lines.chunks(2).enumerate() {
        assert_eq!(pair[0], format!("[INFO  ] (a) a{}", i));
        assert_eq!(pair[1], format!("[INFO  ] (b) b{}", i));
    }
}

#[test]
fn test_mixed_write_modes() {
    let registry = registry();
    let sink = MemorySink::new();
    let log = registry.create(None, Some(sink.clone().into()));

    log.set_sync(false);
    log.info("deferred");
    registry.flush().expect("flush failed");
    log.set_sync(true);
    log.info("inline");

    assert_eq!(bodies(&sink), vec!["[INFO  ] deferred", "[INFO  ] inline"]);
}

struct BrokenSink;

impl Sink for BrokenSink {
    fn write(&mut self, _text: &str) -> Result<()> {
        Err(LoggerError::sink("broken", "device unplugged"))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "broken"
    }
}

#[test]
fn test_failing_sink_does_not_fail_the_call() {
    let registry = registry();
    let log = registry.create(None, Some(BrokenSink.into()));

    log.info("lost");
    log.error("also lost");

    assert_eq!(registry.metrics().write_failures(), 2);
    assert_eq!(registry.metrics().lines_written(), 0);
}

#[test]
fn test_stream_sink_to_file() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("app.log");

    let registry = registry();
    let sink = StreamSink::append_file(&path).expect("Failed to open log file");
    let log = registry.create_named(Some("file"), Some(sink.into()));
    log.notice("persisted");
    drop(log);
    drop(registry);

    let content = std::fs::read_to_string(&path).expect("Failed to read log file");
    assert!(content.ends_with("[NOTICE] (file) persisted\n"));
}

/// Sink that logs a line through another logger on every write.
struct RelaySink {
    relay: Logger,
}

impl Sink for RelaySink {
    fn write(&mut self, _text: &str) -> Result<()> {
        self.relay.info("relayed");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "relay"
    }
}

/// Run `f` on another thread and fail if it does not return in time.
fn returns_in_time(f: impl FnOnce() + Send + 'static) {
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        f();
        let _ = done_tx.send(());
    });
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("log call did not return");
}

#[test]
fn test_sink_may_log_through_its_own_registry() {
    let registry = registry();
    let sink = MemorySink::new();
    let relay = registry.create(Some("relay"), Some(sink.clone().into()));
    let log = registry.create(Some("outer"), Some(RelaySink { relay }.into()));

    returns_in_time(move || log.info("outer"));

    assert_eq!(bodies(&sink), vec!["[INFO  ] (relay) relayed"]);
    assert_eq!(registry.metrics().lines_written(), 2);
}

#[test]
fn test_deferred_sink_may_log_through_its_own_registry() {
    let registry = LoggerRegistry::builder().colors(false).sync(false).build();
    let sink = MemorySink::new();
    let relay = registry.create(Some("relay"), Some(sink.clone().into()));
    let log = registry.create(Some("outer"), Some(RelaySink { relay }.into()));

    returns_in_time(move || log.info("outer"));
    registry.flush().expect("flush failed");

    assert_eq!(bodies(&sink), vec!["[INFO  ] (relay) relayed"]);
}

/// Sink that logs through a logger bound to itself.
struct EchoSink {
    lines: MemorySink,
    echo: Arc<Mutex<Option<Logger>>>,
}

impl Sink for EchoSink {
    fn write(&mut self, text: &str) -> Result<()> {
        self.lines.write(text)?;
        let echo = self.echo.lock().clone();
        if let Some(log) = echo {
            log.warn("echo");
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

#[test]
fn test_write_back_into_the_same_sink_is_dropped() {
    let registry = registry();
    let lines = MemorySink::new();
    let echo = Arc::new(Mutex::new(None));
    let sink = SinkHandle::new(EchoSink {
        lines: lines.clone(),
        echo: Arc::clone(&echo),
    });
    let log = registry.create(None, Some(sink));
    *echo.lock() = Some(log.clone());

    returns_in_time(move || log.info("outer"));

    assert_eq!(bodies(&lines), vec!["[INFO  ] outer"]);
    assert_eq!(registry.metrics().write_failures(), 1);
}
