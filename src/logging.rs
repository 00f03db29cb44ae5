//! Logging setup for hosts that do not install their own `tracing`
//! subscriber.
//!
//! Every stage runs inside a `stage` span carrying `run_id` and `stage`
//! fields, so a formatted log line can always be traced back to one run.

use tracing::Level;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log levels supported by clinflow.
///
/// These map to the tracing level hierarchy: ERROR, WARN, INFO, DEBUG, TRACE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    /// Stage completions and run summaries
    Info,
    /// Gateway calls, retries and merge details
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Initialize logging with a specific log level.
///
/// Call once at program start.
///
/// # Examples
///
/// ```no_run
/// use clinflow::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Info);
/// tracing::info!("Application starting");
/// ```
///
/// # Environment Variable
///
/// `CLINFLOW_LOG` takes precedence over the level passed in:
///
/// ```bash
/// CLINFLOW_LOG=clinflow=debug cargo run
/// ```
pub fn init_logging(level: LogLevel) {
    let env_filter = EnvFilter::try_from_env("CLINFLOW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("clinflow={}", level.to_tracing_level())));

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("clinflow logging initialized at level: {:?}", level);
    }
}

/// Initialize logging with a custom filter directive.
///
/// # Examples
///
/// ```no_run
/// use clinflow::logging::init_logging_with_filter;
///
/// init_logging_with_filter("clinflow=info,clinflow::pipeline=debug");
/// ```
pub fn init_logging_with_filter(filter: &str) {
    let (env_filter, invalid) = filter_or_default(filter);

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .try_init()
        .is_ok();

    if installed {
        if let Some(e) = invalid {
            tracing::warn!(error = %e, "Invalid filter string: {}, using default (clinflow=info)", filter);
        }
        tracing::info!("clinflow logging initialized with custom filter: {}", filter);
    }
}

fn filter_or_default(filter: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(filter) {
        Ok(env_filter) => (env_filter, None),
        Err(e) => (EnvFilter::new("clinflow=info"), Some(e)),
    }
}
