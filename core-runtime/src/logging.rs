//! # Logging
//!
//! Installs the process-wide `tracing` subscriber for the sync core:
//!
//! ```text
//! tracing event ─► EnvFilter ─┬─► fmt layer (pretty | json | compact) ─► stdout
//!                             └─► host sink layer ─► LoggerSink
//! ```
//!
//! The default filter raises the workspace crates to the configured level and
//! keeps HTTP/TLS/SQL dependencies at `warn`. Fields whose names look like
//! credentials are redacted before they reach a host sink.
//!
//! ```ignore
//! use bridge_traits::time::{LogLevel, StderrLogger};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(StderrLogger::default())),
//! )?;
//! tracing::info!(target_id = 8, "Sync target ready");
//! ```

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::{Error, Result};

const WORKSPACE_CRATES: [&str; 8] = [
    "notes_sync_workspace",
    "core_runtime",
    "core_auth",
    "core_sync",
    "core_service",
    "provider_google_drive",
    "provider_local",
    "bridge_desktop",
];

const NOISY_CRATES: [&str; 5] = ["h2", "hyper", "reqwest", "rustls", "sqlx"];

/// Field-name fragments whose values never leave the process unredacted.
const SECRET_MARKERS: [&str; 7] = [
    "token",
    "secret",
    "password",
    "authorization",
    "bearer",
    "api_key",
    "auth_code",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// One JSON object per line
    Json,
    /// Single line per event
    Compact,
}

impl Default for LogFormat {
    /// Pretty in debug builds, JSON in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates by the default filter
    pub level: LogLevel,
    /// Replaces the default filter, e.g. `core_auth=trace,core_sync=debug`
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open/close for `#[instrument]`ed calls
    pub span_events: bool,
    pub thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            span_events: false,
            thread_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_thread_info(mut self, enabled: bool) -> Self {
        self.thread_info = enabled;
        self
    }

    fn filter_directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        WORKSPACE_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .chain(NOISY_CRATES.iter().map(|krate| format!("{}=warn", krate)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] for an invalid filter or when a global subscriber is
/// already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.filter_directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(config.thread_info)
        .with_thread_names(config.thread_info)
        .with_span_events(if config.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });
    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt_layer.pretty().boxed(),
        LogFormat::Json => fmt_layer.json().flatten_event(true).boxed(),
        LogFormat::Compact => fmt_layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(config.logger_sink.map(HostSinkLayer::new))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}

/// Mirrors events into a host [`LoggerSink`].
struct HostSinkLayer {
    sink: Arc<dyn LoggerSink>,
}

impl HostSinkLayer {
    fn new(sink: Arc<dyn LoggerSink>) -> Self {
        Self { sink }
    }

    fn deliver(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);

        // A multi-threaded runtime takes the write as a task. Anywhere else
        // (plain threads, current-thread runtimes) it completes inline.
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                handle.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("host log sink failed: {}", e);
                    }
                });
            }
            _ => {
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("host log sink failed: {}", e);
                }
            }
        }
    }
}

impl<S> Layer<S> for HostSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = to_log_level(metadata.level());
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields.message.unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (name, value) in fields.values {
            let value = redact_if_sensitive(&name, &value);
            entry = entry.with_field(name, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.in_span(span.name());
        }

        self.deliver(entry);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Vec<(String, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.values.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}

fn to_log_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Value of `field_name` as it may appear in a forwarded log record.
///
/// Credential-like field names are blanked entirely, bearer headers keep
/// only their scheme and e-mail addresses keep their first character.
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_ascii_lowercase();
    if SECRET_MARKERS.iter().any(|marker| name.contains(marker)) {
        return REDACTED.to_string();
    }
    if value.starts_with("Bearer ") {
        return format!("Bearer {}", REDACTED);
    }
    match value.split_once('@') {
        Some((local, domain)) if domain.contains('.') => match local.chars().next() {
            Some(first) => format!("{}***@{}", first, REDACTED),
            None => value.to_string(),
        },
        _ => value.to_string(),
    }
}
