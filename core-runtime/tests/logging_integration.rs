//! Integration tests for the global logging setup

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for RecordingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

// Only one global subscriber can exist per process, so everything that needs
// it lives in this single test.
#[test]
fn test_global_logging_forwards_to_sink_and_rejects_reinit() {
    let sink = Arc::new(RecordingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(target: "core_sync::delta", changes = 3, "page ready");
    tracing::debug!(target: "core_sync::delta", "below sink level");
    tracing::info!(target: "hyper", "filtered dependency noise");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "page ready");
        assert_eq!(entries[0].fields.get("changes"), Some(&"3".to_string()));
    }

    let again = init_logging(LoggingConfig::default());
    assert!(matches!(again, Err(Error::Config(_))));
}

#[test]
fn test_tokens_never_pass_through() {
    for field in ["access_token", "refresh_token", "client_secret", "Authorization"] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]");
    }
}
