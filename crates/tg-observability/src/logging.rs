//! Logging infrastructure for Tenant Guard.
//!
//! Structured logging using the tracing ecosystem. `RUST_LOG` overrides the
//! configured level when set.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates whose events pass the default filter.
const CRATES: [&str; 5] = [
    "tg_core",
    "tg_connectors",
    "tg_standards",
    "tg_observability",
    "tenant_guard",
];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level.
    pub level: Level,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Whether to include span open/close events.
    pub include_spans: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose output for local runs.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            include_spans: true,
            include_location: true,
            include_target: true,
        }
    }

    /// JSON output for log shipping.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_location: false,
            include_target: true,
        }
    }

    /// Default filter directive for the configured level.
    pub fn filter_directive(&self) -> String {
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Initializes the logging system with default configuration.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Initializes the logging system with the given configuration. Events go
/// to stderr so command output on stdout stays machine readable. A
/// subscriber installed earlier is left in place.
pub fn init_logging_with_config(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(config.span_events())
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target)
    });
    let text_layer = (!config.json_format).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(config.span_events())
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}

/// Creates a span for one standard run against one tenant.
#[macro_export]
macro_rules! standard_span {
    ($standard:expr, $tenant:expr) => {
        tracing::info_span!("standard", standard = %$standard, tenant = %$tenant)
    };
}
