//! Subscriber construction.
//!
//! JSON lines with timestamps by default; `LOG_FORMAT=pretty` switches to the
//! human-readable formatter for local runs.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Unknown values fall back to JSON.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `info,allocation_infra=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(LogFormat::Json),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    /// Install the global subscriber. Returns false if one was already set.
    pub fn init(&self) -> bool {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_target(false);

        match self.format {
            LogFormat::Json => builder
                .json()
                .with_timer(tracing_subscriber::fmt::time::SystemTime)
                .try_init()
                .is_ok(),
            LogFormat::Pretty => builder.pretty().try_init().is_ok(),
        }
    }

    pub(crate) fn init_with_test_writer(&self) -> bool {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_test_writer()
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_to_json_at_info() {
        let config = LoggingConfig::from_lookup(|_| None);
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn reads_filter_and_format() {
        let env: HashMap<&str, &str> =
            HashMap::from([("RUST_LOG", "debug"), ("LOG_FORMAT", " Pretty ")]);
        let config = LoggingConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.filter, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn unknown_format_is_json() {
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn second_init_is_a_no_op() {
        crate::init_for_tests();
        assert!(!LoggingConfig::default().init());
    }
}
