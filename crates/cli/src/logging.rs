//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `PROVISION_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `warn`, so command output stays readable
//!
//! Logs go to stderr, or into the form's log pane while it owns the terminal.

use std::io;

use anyhow::{Result, anyhow};
use provision::log_sink::LogSink;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub(crate) const LOG_ENV: &str = "PROVISION_LOG";

/// Where formatted log lines end up
pub(crate) enum LogTarget {
    Stderr,
    Sink(LogSink),
}

/// Initialise the global logging subscriber. Call once at startup.
pub(crate) fn init_logging(cli_level: Option<LogLevel>, target: LogTarget) -> Result<()> {
    let level = resolve_level(cli_level, std::env::var(LOG_ENV).ok().as_deref());
    let builder = fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(io::stderr).try_init(),
        LogTarget::Sink(sink) => builder
            .with_ansi(false)
            .with_writer(move || SinkWriter::new(sink.clone()))
            .try_init(),
    };

    installed.map_err(|e| anyhow!("failed to install the log subscriber: {e}"))
}

fn resolve_level(cli_level: Option<LogLevel>, env_value: Option<&str>) -> tracing::Level {
    match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => env_value
            .and_then(parse_level_str)
            .unwrap_or(tracing::Level::WARN),
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

/// Buffers one formatted event and appends it to the sink line by line on drop.
struct SinkWriter {
    sink: LogSink,
    buf: Vec<u8>,
}

impl SinkWriter {
    fn new(sink: LogSink) -> Self {
        Self {
            sink,
            buf: Vec::new(),
        }
    }
}

impl io::Write for SinkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        self.sink.extend(text.lines().filter(|l| !l.is_empty()));
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_cli_level_wins_over_env() {
        assert_eq!(
            resolve_level(Some(LogLevel::Debug), Some("error")),
            tracing::Level::DEBUG
        );
    }

    #[test]
    fn test_env_level_is_used_without_flag() {
        assert_eq!(resolve_level(None, Some(" Info ")), tracing::Level::INFO);
        assert_eq!(resolve_level(None, Some("warning")), tracing::Level::WARN);
    }

    #[test]
    fn test_default_is_warn() {
        assert_eq!(resolve_level(None, None), tracing::Level::WARN);
        assert_eq!(resolve_level(None, Some("loud")), tracing::Level::WARN);
    }

    #[test]
    fn test_sink_writer_appends_lines_on_drop() {
        let sink = LogSink::new();
        {
            let mut writer = SinkWriter::new(sink.clone());
            write!(writer, "WARN provision: first\nsecond").unwrap();
            assert!(sink.is_empty());
        }

        assert_eq!(sink.snapshot(), vec!["WARN provision: first", "second"]);
    }
}
