//! Location tags and call-site capture
//!
//! A [`LocationTag`] marks text the logger produced itself: call-site
//! annotations, repeat summaries and unwrapped error stacks. Tagged subjects
//! are never traced again and never take part in deduplication.
//!
//! Call sites come from a [`CallerLocator`]. The default implementation reads
//! file, line and column from `#[track_caller]` and resolves the enclosing
//! function name from a captured backtrace. Any failure along the way means
//! "no location", never an error for the log call.

use once_cell::sync::Lazy;
use regex::Regex;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

/// Function name used when a frame has none.
pub const UNNAMED_FUNCTION: &str = "(unnamed)";

/// Frames skipped by [`analyze_stack`] before the caller's frame.
pub const DEFAULT_FRAME_SKIP: usize = 1;

/// Pre-formatted text that must not be traced or deduplicated again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationTag(String);

impl LocationTag {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Indented annotation emitted after a traced message.
    pub fn call_site(site: &CallSite) -> Self {
        Self(format!("  {}", site))
    }

    /// Summary for `count` suppressed repeats.
    pub fn repeat_summary(count: u64) -> Self {
        let unit = if count == 1 { "time" } else { "times" };
        Self(format!("Last message repeated {} {}.", count, unit))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `function@file:line:column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl CallSite {
    /// Call site from a `#[track_caller]` location, function unknown.
    pub fn from_location(location: &Location<'_>) -> Self {
        Self {
            function: UNNAMED_FUNCTION.to_string(),
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}:{}", self.function, self.file, self.line, self.column)
    }
}

/// Resolves where a log call came from.
pub trait CallerLocator: Send + Sync {
    /// `caller` is the location of the public log method's caller.
    /// Returning `None` suppresses the trace line for this call.
    fn locate(&self, caller: &'static Location<'static>) -> Option<CallSite>;
}

/// File, line and column from `#[track_caller]`; no function names.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackCallerLocator;

impl CallerLocator for TrackCallerLocator {
    fn locate(&self, caller: &'static Location<'static>) -> Option<CallSite> {
        Some(CallSite::from_location(caller))
    }
}

/// [`TrackCallerLocator`] plus the enclosing function name, looked up in a
/// freshly captured backtrace.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceLocator;

impl CallerLocator for BacktraceLocator {
    fn locate(&self, caller: &'static Location<'static>) -> Option<CallSite> {
        let mut site = CallSite::from_location(caller);
        let trace = Backtrace::force_capture().to_string();
        if let Some(function) = StackTrace::parse(&trace)
            .frames()
            .iter()
            .find(|frame| frame.is_at(caller))
            .and_then(|frame| frame.function.clone())
        {
            site.function = function;
        }
        Some(site)
    }
}

/// One frame of parsed stack text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl StackFrame {
    fn has_location(&self) -> bool {
        self.file.is_some() && self.line.is_some() && self.column.is_some()
    }

    fn is_at(&self, location: &Location<'_>) -> bool {
        let (Some(file), Some(line)) = (self.file.as_deref(), self.line) else {
            return false;
        };
        let wanted = location.file().trim_start_matches("./");
        line == location.line() && file.trim_start_matches("./").ends_with(wanted)
    }

    fn call_site(&self) -> Option<CallSite> {
        Some(CallSite {
            function: self
                .function
                .clone()
                .unwrap_or_else(|| UNNAMED_FUNCTION.to_string()),
            file: self.file.clone()?,
            line: self.line?,
            column: self.column?,
        })
    }
}

// `   3: crate::module::function::h0123456789abcdef`
static FRAME_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").expect("valid frame header pattern"));

// `             at ./src/main.rs:10:5`
static FRAME_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*at (.+):(\d+):(\d+)\s*$").expect("valid location pattern"));

// `    at name (file:line:column)`
static NAMED_SITE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at (.+?) \((.+):(\d+):(\d+)\)\s*$").expect("valid named site pattern")
});

static SYMBOL_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("valid symbol hash pattern"));

/// Stack text split into frames.
///
/// Understands the standard library's multi-line backtrace layout
/// (`N: symbol` followed by an optional `at file:line:col`) as well as
/// single-line `at name (file:line:col)` and anonymous `at file:line:col`
/// sites. Lines matching neither are ignored.
#[derive(Debug, Clone, Default)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn parse(text: &str) -> Self {
        let mut frames: Vec<StackFrame> = Vec::new();
        let mut awaiting_location = false;

        for line in text.lines() {
            if let Some(caps) = NAMED_SITE.captures(line) {
                frames.push(StackFrame {
                    function: clean_symbol(&caps[1]),
                    file: Some(caps[2].to_string()),
                    line: caps[3].parse().ok(),
                    column: caps[4].parse().ok(),
                });
                awaiting_location = false;
            } else if let Some(caps) = FRAME_AT.captures(line) {
                let located = StackFrame {
                    function: None,
                    file: Some(caps[1].to_string()),
                    line: caps[2].parse().ok(),
                    column: caps[3].parse().ok(),
                };
                let pending = if awaiting_location { frames.last_mut() } else { None };
                if let Some(frame) = pending {
                    frame.file = located.file;
                    frame.line = located.line;
                    frame.column = located.column;
                } else {
                    frames.push(located);
                }
                awaiting_location = false;
            } else if let Some(caps) = FRAME_HEADER.captures(line) {
                frames.push(StackFrame {
                    function: clean_symbol(&caps[1]),
                    ..StackFrame::default()
                });
                awaiting_location = true;
            }
        }

        Self { frames }
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Frames that carry a file, line and column.
    pub fn sites(&self) -> impl Iterator<Item = &StackFrame> {
        self.frames.iter().filter(|frame| frame.has_location())
    }
}

/// Extract the call site `skip` located frames below the top of `stack`.
///
/// Returns `None` when the text has too few parsable frames.
pub fn analyze_stack(stack: &str, skip: usize) -> Option<CallSite> {
    StackTrace::parse(stack).sites().nth(skip)?.call_site()
}

fn clean_symbol(raw: &str) -> Option<String> {
    let symbol = SYMBOL_HASH.replace(raw.trim(), "");
    match symbol.as_ref() {
        "" | "<unknown>" | "<anonymous>" => None,
        name => Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE_TRACE: &str = "   0: fm_log::core::location::BacktraceLocator::locate
             at ./src/core/location.rs:101:21
   1: fm_log::core::logger::Logger::emit::h0123456789abcdef
             at ./src/core/logger.rs:210:13
   2: demo::handler
             at ./src/bin/demo.rs:14:5
   3: <unknown>
             at ./src/bin/demo.rs:30:9
   4: std::rt::lang_start_internal
";

    #[test]
    fn test_repeat_summary_pluralization() {
        assert_eq!(
            LocationTag::repeat_summary(1).as_str(),
            "Last message repeated 1 time."
        );
        assert_eq!(
            LocationTag::repeat_summary(2).as_str(),
            "Last message repeated 2 times."
        );
    }

    #[test]
    fn test_tag_renders_contained_text() {
        let tag = LocationTag::new("foo");
        assert_eq!(tag.as_str(), "foo");
        assert_eq!(tag.to_string(), "foo");
    }

    #[test]
    fn test_parse_native_trace() {
        let trace = StackTrace::parse(NATIVE_TRACE);
        assert_eq!(trace.frames().len(), 5);
        assert_eq!(
            trace.frames()[1].function.as_deref(),
            Some("fm_log::core::logger::Logger::emit")
        );
        assert_eq!(trace.frames()[3].function, None);
        assert_eq!(trace.sites().count(), 4);
    }

    #[test]
    fn test_analyze_stack_skips_internal_frames() {
        let site = analyze_stack(NATIVE_TRACE, 2).unwrap();
        assert_eq!(site.to_string(), "demo::handler@./src/bin/demo.rs:14:5");

        let site = analyze_stack(NATIVE_TRACE, DEFAULT_FRAME_SKIP).unwrap();
        assert_eq!(site.line, 210);
    }

    #[test]
    fn test_anonymous_frames_are_unnamed() {
        let site = analyze_stack(NATIVE_TRACE, 3).unwrap();
        assert_eq!(site.to_string(), "(unnamed)@./src/bin/demo.rs:30:9");
    }

    #[test]
    fn test_single_line_grammars() {
        let text = concat!(
            "Error\n",
            "    at Logger.preLog (/app/lib/Logger.js:10:3)\n",
            "    at source (/app/test.js:5:7)\n",
            "    at /app/test.js:9:1",
        );
        assert_eq!(
            analyze_stack(text, 1).unwrap().to_string(),
            "source@/app/test.js:5:7"
        );
        assert_eq!(
            analyze_stack(text, 2).unwrap().to_string(),
            "(unnamed)@/app/test.js:9:1"
        );
    }

    #[test]
    fn test_unparsable_trace_yields_nothing() {
        assert_eq!(analyze_stack("", 0), None);
        assert_eq!(analyze_stack("disabled backtrace", 0), None);
        assert_eq!(analyze_stack(NATIVE_TRACE, 10), None);
    }

    #[test]
    fn test_track_caller_locator() {
        let location = Location::caller();
        let site = TrackCallerLocator.locate(location).unwrap();
        assert_eq!(site.function, UNNAMED_FUNCTION);
        assert!(site.file.ends_with("location.rs"));
        assert_eq!(site.line, location.line());
    }

    #[test]
    fn test_backtrace_locator_keeps_caller_position() {
        let location = Location::caller();
        let site = BacktraceLocator.locate(location).unwrap();
        assert!(site.file.ends_with("location.rs"));
        assert_eq!(site.line, location.line());
        assert_eq!(site.column, location.column());
        assert!(!site.function.is_empty());
    }
}
