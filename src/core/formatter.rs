//! Message formatting
//!
//! Stateless helpers that turn a subject into the physical lines a sink
//! receives: printf-style interpolation, request flattening, cycle-safe
//! JSON serialization, padding, timestamps and prefix-aligned line
//! assembly.

use super::log_level::padded_label_of;
use super::subject::{LogValue, Subject};
use chrono::{DateTime, TimeZone};
use std::collections::HashSet;
use std::fmt::Display;

/// Timestamp layout prepended to every line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const INDENT: &str = "  ";

/// Fields kept when a request-shaped object is logged.
const REQUEST_FIELDS: [&str; 22] = [
    "httpVersion",
    "headers",
    "trailers",
    "method",
    "url",
    "statusCode",
    "body",
    "params",
    "query",
    "cookies",
    "signedCookies",
    "ip",
    "ips",
    "path",
    "host",
    "fresh",
    "stale",
    "xhr",
    "protocol",
    "secure",
    "subdomains",
    "originalUrl",
];

/// Prepare a subject for the pipeline: interpolate text, flatten requests.
///
/// Text is interpolated when arguments were supplied or when it contains a
/// placeholder. Other subjects ignore `args`.
pub fn format_subject(subject: Subject, args: &[LogValue]) -> Subject {
    match subject {
        Subject::Text(text) if !args.is_empty() || has_placeholders(&text) => {
            Subject::Text(interpolate(&text, args))
        }
        Subject::Structured(value) => Subject::Structured(flatten_request(value)),
        other => other,
    }
}

/// Whether `format` contains a `%s`-style directive or `%%`.
pub fn has_placeholders(format: &str) -> bool {
    format
        .as_bytes()
        .windows(2)
        .any(|pair| pair[0] == b'%' && b"sdifjoO%".contains(&pair[1]))
}

/// printf-style substitution.
///
/// Supports `%s %d %i %f %j %o %O` and `%%`. A directive without a matching
/// argument is left in place; arguments without a directive are appended,
/// separated by spaces.
pub fn interpolate(format: &str, args: &[LogValue]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut remaining = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(directive @ ('s' | 'd' | 'i' | 'f' | 'j' | 'o' | 'O')) => {
                chars.next();
                match remaining.next() {
                    Some(arg) => out.push_str(&substitute(directive, arg)),
                    None => {
                        out.push('%');
                        out.push(directive);
                    }
                }
            }
            _ => out.push('%'),
        }
    }

    for arg in remaining {
        out.push(' ');
        out.push_str(&inspect(arg));
    }
    out
}

fn substitute(directive: char, arg: &LogValue) -> String {
    match directive {
        's' => inspect(arg),
        'd' => to_number(arg).map_or_else(|| "NaN".to_string(), js_float),
        'i' => to_number(arg).map_or_else(|| "NaN".to_string(), |n| js_float(n.trunc())),
        'f' => to_number(arg).map_or_else(|| "NaN".to_string(), js_float),
        'j' => serialize_compact(arg),
        _ => inspect(arg),
    }
}

/// Inline rendering: strings raw, scalars as literals, composites as
/// compact JSON.
fn inspect(value: &LogValue) -> String {
    match value {
        LogValue::Undefined => "undefined".to_string(),
        LogValue::Null => "null".to_string(),
        LogValue::Bool(b) => b.to_string(),
        LogValue::Number(n) => js_number(n),
        LogValue::String(s) => s.clone(),
        _ => serialize_compact(value),
    }
}

fn to_number(value: &LogValue) -> Option<f64> {
    match value {
        LogValue::Number(n) => n.as_f64(),
        LogValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        LogValue::Null => Some(0.0),
        LogValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn js_number(n: &serde_json::Number) -> String {
    if n.is_f64() {
        n.as_f64().map_or_else(|| n.to_string(), js_float)
    } else {
        n.to_string()
    }
}

// Integral floats print without a fraction.
fn js_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

/// Project a request-shaped object onto a fixed allow-list of fields.
///
/// An object counts as a request when it has `method`, `url` and `headers`.
/// `host` prefers `hostname`. Anything else is returned unchanged.
pub fn flatten_request(value: LogValue) -> LogValue {
    if !(value.has_key("method") && value.has_key("url") && value.has_key("headers")) {
        return value;
    }

    let field = |key: &str| value.get(key).unwrap_or_default();
    LogValue::Object(
        REQUEST_FIELDS
            .iter()
            .map(|&key| {
                let projected = if key == "host" {
                    Some(field("hostname"))
                        .filter(LogValue::is_truthy)
                        .unwrap_or_else(|| field("host"))
                } else {
                    field(key)
                };
                (key.to_string(), projected)
            })
            .collect(),
    )
}

/// JSON with two-space indentation.
///
/// `Undefined` renders as the string `"undefined"`. A shared node that was
/// already written earlier in the document is dropped: its object key is
/// omitted, its array slot becomes `null`.
pub fn serialize(value: &LogValue) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    if !write_value(&mut out, value, Some(INDENT), 0, &mut seen) {
        out.push_str("null");
    }
    out
}

/// Like [`serialize`] without whitespace.
pub fn serialize_compact(value: &LogValue) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    if !write_value(&mut out, value, None, 0, &mut seen) {
        out.push_str("null");
    }
    out
}

/// Returns `false` when the value was elided as a repeated reference.
fn write_value(
    out: &mut String,
    value: &LogValue,
    indent: Option<&str>,
    depth: usize,
    seen: &mut HashSet<usize>,
) -> bool {
    match value {
        LogValue::Undefined => out.push_str("\"undefined\""),
        LogValue::Null => out.push_str("null"),
        LogValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        LogValue::Number(n) => out.push_str(&js_number(n)),
        LogValue::String(s) => out.push_str(&quote(s)),
        LogValue::Shared(shared) => {
            if !seen.insert(shared.id()) {
                return false;
            }
            let inner = shared.read();
            return write_value(out, &inner, indent, depth, seen);
        }
        LogValue::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| {
                    let mut slot = String::new();
                    if !write_value(&mut slot, item, indent, depth + 1, seen) {
                        slot.push_str("null");
                    }
                    slot
                })
                .collect();
            write_container(out, '[', ']', &rendered, indent, depth);
        }
        LogValue::Object(entries) => {
            let mut rendered = Vec::with_capacity(entries.len());
            for (key, entry) in entries {
                let mut slot = String::new();
                if write_value(&mut slot, entry, indent, depth + 1, seen) {
                    let separator = if indent.is_some() { ": " } else { ":" };
                    rendered.push(format!("{}{}{}", quote(key), separator, slot));
                }
            }
            write_container(out, '{', '}', &rendered, indent, depth);
        }
    }
    true
}

fn write_container(
    out: &mut String,
    open: char,
    close: char,
    items: &[String],
    indent: Option<&str>,
    depth: usize,
) {
    out.push(open);
    if !items.is_empty() {
        match indent {
            Some(unit) => {
                let inner = unit.repeat(depth + 1);
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push('\n');
                    out.push_str(&inner);
                    out.push_str(item);
                }
                out.push('\n');
                out.push_str(&unit.repeat(depth));
            }
            None => out.push_str(&items.join(",")),
        }
    }
    out.push(close);
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Render a formatted subject as the text that gets split into lines.
pub fn render_subject(subject: &Subject) -> String {
    match subject {
        Subject::Text(text) => text.clone(),
        Subject::Structured(LogValue::Undefined) => "undefined".to_string(),
        Subject::Structured(LogValue::Null) => "null".to_string(),
        Subject::Structured(LogValue::String(s)) => s.clone(),
        Subject::Structured(value) => serialize(value),
        Subject::Error(error) => error.render(),
        Subject::Location(tag) => tag.as_str().to_string(),
    }
}

/// Pad `value` to `width` characters with `fill`.
///
/// Fills on the left (right-aligning the value) unless `pad_end` is set.
/// Values already at least `width` long are returned unchanged.
pub fn pad(value: &str, width: usize, fill: char, pad_end: bool) -> String {
    let len = value.chars().count();
    if len >= width {
        return value.to_string();
    }
    let padding: String = std::iter::repeat(fill).take(width - len).collect();
    if pad_end {
        format!("{}{}", value, padding)
    } else {
        format!("{}{}", padding, value)
    }
}

/// `YYYY-MM-DD HH:mm:ss.mmm`
pub fn format_timestamp<Tz>(instant: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// The parenthesized, right-aligned prefix block without its trailing space.
///
/// Empty when this logger has no prefix and no logger was ever named.
/// Continuation lines and unprefixed loggers get blanks of the same width.
pub fn construct_prefix(prefix: Option<&str>, max_prefix_len: usize, continuation: bool) -> String {
    match prefix.filter(|p| !p.is_empty()) {
        None if max_prefix_len == 0 => String::new(),
        None => " ".repeat(max_prefix_len + 2),
        Some(name) => {
            // Names never registered for alignment may exceed the width
            let width = max_prefix_len.max(name.chars().count());
            if continuation {
                " ".repeat(width + 2)
            } else {
                format!("({})", pad(name, width, ' ', false))
            }
        }
    }
}

/// `message` behind its prefix block, if there is one.
pub fn prefix_message(
    prefix: Option<&str>,
    message: &str,
    max_prefix_len: usize,
    continuation: bool,
) -> String {
    let block = construct_prefix(prefix, max_prefix_len, continuation);
    if block.is_empty() {
        message.to_string()
    } else {
        format!("{} {}", block, message)
    }
}

/// Split a rendered message into colorized lines.
///
/// The first line reads `[LABEL ] (prefix) text`. Later lines blank out both
/// the label and the prefix block so every line's text starts in the same
/// column.
pub fn generate_log_stack<F>(
    weight: i32,
    prefix: Option<&str>,
    body: &str,
    max_prefix_len: usize,
    colorize: F,
) -> Vec<String>
where
    F: Fn(&str) -> String,
{
    let label = format!("[{}]", padded_label_of(weight));
    let blank_label = " ".repeat(label.chars().count());

    body.split('\n')
        .enumerate()
        .map(|(index, line)| {
            let continuation = index > 0;
            let head = if continuation { &blank_label } else { &label };
            colorize(&format!(
                "{} {}",
                head,
                prefix_message(prefix, line, max_prefix_len, continuation)
            ))
        })
        .collect()
}
