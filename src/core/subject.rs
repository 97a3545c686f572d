//! Loggable subjects
//!
//! Every log call converts its argument into a [`Subject`] once, at the call
//! boundary. Formatting code matches on the variant instead of probing the
//! value again.

use super::location::LocationTag;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Rendered for error subjects that carry neither a stack nor a message.
pub const INVALID_ERROR: &str = "<invalid error>";

/// JSON-like value with an explicit `Undefined` and identity-carrying
/// shared nodes.
///
/// Plain variants form a tree. [`LogValue::Shared`] points at a node that
/// may be referenced from several places, including from inside itself, so
/// graphs with repeated or circular references can be logged.
#[derive(Debug, Clone, Default)]
pub enum LogValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<LogValue>),
    /// Entries keep insertion order.
    Object(Vec<(String, LogValue)>),
    Shared(SharedValue),
}

impl LogValue {
    /// Convert anything serde can serialize.
    ///
    /// Serialization failures (for instance maps with non-string keys) are
    /// rendered into the value instead of being returned.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => json.into(),
            Err(e) => LogValue::String(format!("<unserializable: {}>", e)),
        }
    }

    /// Build an object from `(key, value)` pairs, keeping their order.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<LogValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        LogValue::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Look up a key on an object (following a shared node).
    pub fn get(&self, key: &str) -> Option<LogValue> {
        match self {
            LogValue::Object(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            LogValue::Shared(shared) => shared.read().get(key),
            _ => None,
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        match self {
            LogValue::Object(entries) => entries.iter().any(|(k, _)| k == key),
            LogValue::Shared(shared) => shared.read().has_key(key),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, LogValue::Undefined)
    }

    /// JavaScript-style truthiness, used when picking between fallbacks.
    pub fn is_truthy(&self) -> bool {
        match self {
            LogValue::Undefined | LogValue::Null => false,
            LogValue::Bool(b) => *b,
            LogValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            LogValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl From<serde_json::Value> for LogValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => LogValue::Null,
            serde_json::Value::Bool(b) => LogValue::Bool(b),
            serde_json::Value::Number(n) => LogValue::Number(n),
            serde_json::Value::String(s) => LogValue::String(s),
            serde_json::Value::Array(items) => {
                LogValue::Array(items.into_iter().map(LogValue::from).collect())
            }
            serde_json::Value::Object(map) => {
                LogValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for LogValue {
    fn from(value: &str) -> Self {
        LogValue::String(value.to_string())
    }
}

impl From<String> for LogValue {
    fn from(value: String) -> Self {
        LogValue::String(value)
    }
}

impl From<bool> for LogValue {
    fn from(value: bool) -> Self {
        LogValue::Bool(value)
    }
}

impl From<i64> for LogValue {
    fn from(value: i64) -> Self {
        LogValue::Number(value.into())
    }
}

impl From<i32> for LogValue {
    fn from(value: i32) -> Self {
        LogValue::Number(value.into())
    }
}

impl From<u64> for LogValue {
    fn from(value: u64) -> Self {
        LogValue::Number(value.into())
    }
}

impl From<f64> for LogValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(LogValue::Number)
            .unwrap_or(LogValue::Null)
    }
}

impl From<SharedValue> for LogValue {
    fn from(value: SharedValue) -> Self {
        LogValue::Shared(value)
    }
}

impl<T: Into<LogValue>> From<Option<T>> for LogValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(LogValue::Undefined, Into::into)
    }
}

impl<T: Into<LogValue>> From<Vec<T>> for LogValue {
    fn from(values: Vec<T>) -> Self {
        LogValue::Array(values.into_iter().map(Into::into).collect())
    }
}

/// A node with reference identity. Clones point at the same node.
#[derive(Clone, Default)]
pub struct SharedValue(Arc<RwLock<LogValue>>);

impl SharedValue {
    pub fn new(value: impl Into<LogValue>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, LogValue> {
        self.0.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, LogValue> {
        self.0.write()
    }

    /// Append an entry when the node holds an object.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<LogValue>) {
        if let LogValue::Object(entries) = &mut *self.0.write() {
            entries.push((key.into(), value.into()));
        }
    }

    /// Identity of the node, stable for its lifetime.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &SharedValue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedValue {
    // The node may contain itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedValue({:#x})", self.id())
    }
}

/// Something that failed, reduced to the text the logger prints for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLike {
    pub message: Option<String>,
    pub stack: Option<String>,
}

impl ErrorLike {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Render a `std::error::Error` and its `source()` chain.
    ///
    /// The first line is the error itself; each cause follows on its own
    /// indented line. Errors without a cause only get a message.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = err.to_string();
        let mut stack = format!("Error: {}", message);
        let mut source = err.source();
        let mut has_cause = false;
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(&cause.to_string());
            has_cause = true;
            source = cause.source();
        }

        Self {
            message: Some(message),
            stack: has_cause.then_some(stack),
        }
    }

    /// Stack, else message, else [`INVALID_ERROR`]. Empty strings count as
    /// absent.
    pub fn render(&self) -> String {
        self.stack
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.message.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(INVALID_ERROR)
            .to_string()
    }
}

/// The tagged input of every log call.
#[derive(Debug, Clone)]
pub enum Subject {
    Text(String),
    Structured(LogValue),
    Error(ErrorLike),
    Location(LocationTag),
}

impl Subject {
    pub fn error(err: &(dyn std::error::Error + 'static)) -> Self {
        Subject::Error(ErrorLike::from_error(err))
    }

    #[inline]
    pub fn is_location(&self) -> bool {
        matches!(self, Subject::Location(_))
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Subject::Error(_))
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Subject::Text(value.to_string())
    }
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        Subject::Text(value)
    }
}

impl From<&String> for Subject {
    fn from(value: &String) -> Self {
        Subject::Text(value.clone())
    }
}

impl From<LogValue> for Subject {
    fn from(value: LogValue) -> Self {
        match value {
            LogValue::String(s) => Subject::Text(s),
            other => Subject::Structured(other),
        }
    }
}

impl From<serde_json::Value> for Subject {
    fn from(value: serde_json::Value) -> Self {
        LogValue::from(value).into()
    }
}

impl From<SharedValue> for Subject {
    fn from(value: SharedValue) -> Self {
        Subject::Structured(LogValue::Shared(value))
    }
}

impl From<bool> for Subject {
    fn from(value: bool) -> Self {
        Subject::Structured(value.into())
    }
}

impl From<i64> for Subject {
    fn from(value: i64) -> Self {
        Subject::Structured(value.into())
    }
}

impl From<i32> for Subject {
    fn from(value: i32) -> Self {
        Subject::Structured(value.into())
    }
}

impl From<f64> for Subject {
    fn from(value: f64) -> Self {
        Subject::Structured(value.into())
    }
}

impl From<ErrorLike> for Subject {
    fn from(value: ErrorLike) -> Self {
        Subject::Error(value)
    }
}

impl From<LocationTag> for Subject {
    fn from(value: LocationTag) -> Self {
        Subject::Location(value)
    }
}

impl<T: Into<Subject>> From<Option<T>> for Subject {
    fn from(value: Option<T>) -> Self {
        value.map_or(Subject::Structured(LogValue::Undefined), Into::into)
    }
}
