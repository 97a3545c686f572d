//! Severity scale
//!
//! Levels carry a numeric weight and a label of at most six characters.
//! Weights are not contiguous: everything between `ERROR` (3) and
//! `CRITICAL` (10) renders with an empty label.

use super::error::LoggerError;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width every rendered label is padded to.
pub const LABEL_WIDTH: usize = 6;

/// Labels indexed by `weight + 1`. Slots without a level stay empty.
const LABELS: [&str; 12] = [
    "DEBUG", "INFO", "NOTICE", "WARN", "ERROR", "", "", "", "", "", "", "CRITIC",
];

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum LogLevel {
    #[default]
    Debug = -1,
    Info = 0,
    Notice = 1,
    Warn = 2,
    Error = 3,
    Critical = 10,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Notice,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    #[inline]
    pub fn weight(&self) -> i32 {
        *self as i32
    }

    /// The unpadded label, e.g. `"INFO"` or `"CRITIC"`.
    pub fn to_str(&self) -> &'static str {
        label_of(self.weight())
    }

    pub fn from_weight(weight: i32) -> Option<Self> {
        LogLevel::ALL.into_iter().find(|level| level.weight() == weight)
    }

    /// Apply this level's terminal color to a composed line.
    pub fn colorize(&self, line: &str) -> String {
        match self {
            LogLevel::Debug => line.bright_black().to_string(),
            LogLevel::Info => line.cyan().to_string(),
            LogLevel::Notice => line.green().to_string(),
            LogLevel::Warn => line.yellow().to_string(),
            LogLevel::Error => line.red().to_string(),
            LogLevel::Critical => line.red().bold().to_string(),
        }
    }

    /// Whether the default selector routes this level to stderr.
    #[inline]
    pub fn is_error_stream(&self) -> bool {
        self.weight() >= LogLevel::Error.weight()
    }
}

/// Label for an arbitrary weight. Gaps and out-of-range weights yield `""`.
pub fn label_of(weight: i32) -> &'static str {
    usize::try_from(weight.saturating_add(1))
        .ok()
        .and_then(|index| LABELS.get(index))
        .copied()
        .unwrap_or("")
}

/// Label left-justified and blank-filled to [`LABEL_WIDTH`].
pub fn padded_label_of(weight: i32) -> String {
    format!("{:<width$}", label_of(weight), width = LABEL_WIDTH)
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "NOTICE" => Ok(LogLevel::Notice),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" | "CRITIC" => Ok(LogLevel::Critical),
            _ => Err(LoggerError::InvalidLevel(s.to_string())),
        }
    }
}
