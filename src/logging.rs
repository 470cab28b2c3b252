//! Logging Setup
//!
//! Installs the tracing subscriber selected by configuration.

use tracing::Subscriber;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `json` selects JSON; anything else is text.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Builds the filter directive for a configured level.
///
/// Unknown or empty levels fall back to `info`.
pub fn filter_for(level: &str) -> EnvFilter {
    let level = match level.to_ascii_lowercase().as_str() {
        "debug" => "debug",
        "error" => "error",
        _ => "info",
    };
    EnvFilter::new(format!("docserve={level},tower_http={level}"))
}

/// Builds a subscriber writing to `writer`.
pub fn build_subscriber<W>(
    writer: W,
    filter: EnvFilter,
    format: LogFormat,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => Box::new(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            ),
        ),
        LogFormat::Json => Box::new(
            registry.with(tracing_subscriber::fmt::layer().json().with_writer(writer)),
        ),
    }
}

/// Installs the global subscriber on stderr.
///
/// `RUST_LOG`, when set, overrides the configured level.
pub fn init(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(level));
    let subscriber = build_subscriber(std::io::stderr, filter, LogFormat::parse(format));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(level: &str, format: LogFormat, emit: impl FnOnce()) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = build_subscriber(move || writer.clone(), filter_for(level), format);
        tracing::subscriber::with_default(subscriber, emit);
        capture.contents()
    }

    #[test]
    fn test_info_hides_debug() {
        let output = capture("info", LogFormat::Text, || {
            tracing::info!("info message");
            tracing::debug!("debug message");
        });
        assert!(output.contains("info message"));
        assert!(!output.contains("debug message"));
    }

    #[test]
    fn test_debug_level_shows_debug() {
        let output = capture("debug", LogFormat::Text, || {
            tracing::debug!("debug message");
        });
        assert!(output.contains("debug message"));
    }

    #[test]
    fn test_json_format() {
        let output = capture("info", LogFormat::Json, || {
            tracing::info!(key = "val", "json message");
        });
        assert!(output.contains(r#""message":"json message""#));
        assert!(output.contains(r#""key":"val""#));
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let output = capture("unknown_level", LogFormat::Text, || {
            tracing::info!("info message");
            tracing::debug!("debug message");
        });
        assert!(output.contains("info message"));
        assert!(!output.contains("debug message"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
    }
}
