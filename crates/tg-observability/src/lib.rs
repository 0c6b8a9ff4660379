//! # tg-observability
//!
//! Logging infrastructure for Tenant Guard.
//!
//! This crate sets up structured logging with `tracing` and provides the
//! standards log, the per-tenant message trail every standard writes to.

pub mod logging;
pub mod standard_log;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use standard_log::{
    LogSeverity, MemoryStandardLogger, StandardLogEntry, StandardLogger, TracingStandardLogger,
};
