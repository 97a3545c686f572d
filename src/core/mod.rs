//! Core logger types and traits

pub mod error;
pub mod formatter;
pub mod location;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod registry;
pub mod state;
pub mod subject;
pub mod writer;

pub use error::{LoggerError, Result};
pub use location::{
    analyze_stack, BacktraceLocator, CallSite, CallerLocator, LocationTag, StackFrame, StackTrace,
    TrackCallerLocator, DEFAULT_FRAME_SKIP, UNNAMED_FUNCTION,
};
pub use log_level::{label_of, padded_label_of, LogLevel, LABEL_WIDTH};
pub use logger::Logger;
pub use metrics::LoggerMetrics;
pub use registry::{LoggerRegistry, RegistryBuilder, RegistryConfig};
pub use state::{Observation, PipelineState};
pub use subject::{ErrorLike, LogValue, SharedValue, Subject, INVALID_ERROR};
pub use writer::{DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT};
