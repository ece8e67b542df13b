//! Logging bootstrap for the relay services
//!
//! Console output uses a compact bracketed format:
//! `2025-12-02T00:50:44.809123Z [INFO] message`
//!
//! When a log directory is configured, records are also written to a
//! daily rolling file (`{service}.log.YYYY-MM-DD`) through a non-blocking
//! writer. The returned [`WorkerGuard`] must be kept alive for the
//! lifetime of the process, otherwise buffered records are lost.

use std::fs;
use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Service name, used as the file prefix and as the crate filter target
    pub service_name: String,
    /// Default level when `RUST_LOG` is not set
    pub level: String,
    /// Directory for the daily rolling file; console only when `None`
    pub log_dir: Option<PathBuf>,
    /// Write the file layer as JSON records
    pub enable_json: bool,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            level: "info".to_string(),
            log_dir: None,
            enable_json: false,
            ansi: true,
        }
    }
}

/// Filter directives for the subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies
/// globally and to the service's own target.
fn filter_directives(config: &LoggingConfig, rust_log: Option<String>) -> String {
    match rust_log {
        Some(env) if !env.trim().is_empty() => env,
        _ => format!(
            "{},{}={}",
            config.level,
            config.service_name.replace('-', "_"),
            config.level
        ),
    }
}

/// Install the global `tracing` subscriber.
///
/// Returns the file writer guard when file logging is enabled.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let directives = filter_directives(config, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives)?;

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = if config.enable_json {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_level(true)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Logging: {} ({})", config.service_name, directives);
    if let Some(dir) = &config.log_dir {
        tracing::debug!("Log file: {}/{}.log", dir.display(), config.service_name);
    }

    Ok(guard)
}
