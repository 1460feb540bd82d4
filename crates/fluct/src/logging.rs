//! Tracing subscriber setup for hosts that do not install their own.
//!
//! `FLUCT_LOG` takes an [`EnvFilter`] directive string (default
//! `fluct_core=warn`). `FLUCT_LOG_FORMAT` picks `pretty`, `compact` or
//! `json` (default `compact`).

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const FILTER_ENV: &str = "FLUCT_LOG";
pub const FORMAT_ENV: &str = "FLUCT_LOG_FORMAT";
pub const DEFAULT_FILTER: &str = "fluct_core=warn";

/// Errors from building or installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("unknown log format {0:?} (expected pretty, compact or json)")]
    Format(String),

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::Format(s.to_owned())),
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_owned(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Read `FLUCT_LOG` and `FLUCT_LOG_FORMAT` from the process environment.
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggingError> {
        let mut config = Self::default();
        if let Some(filter) = lookup(FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            config.filter = filter;
        }
        if let Some(format) = lookup(FORMAT_ENV).filter(|f| !f.trim().is_empty()) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        EnvFilter::try_new(&self.filter).map_err(|err| LoggingError::Filter {
            filter: self.filter.clone(),
            reason: err.to_string(),
        })
    }
}

/// Install a global `fmt` subscriber for `config`.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| LoggingError::Install(err.to_string()))?;
    tracing::debug!(message = "fluct.logging.installed", filter = %config.filter, format = %config.format);
    Ok(())
}

/// [`init`] with [`LoggingConfig::from_env`].
pub fn init_from_env() -> Result<(), LoggingError> {
    init(&LoggingConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = LoggingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LoggingConfig::default());
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn reads_filter_and_format() {
        let config = LoggingConfig::from_lookup(lookup(&[
            (FILTER_ENV, "fluct_core=trace"),
            (FORMAT_ENV, "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.filter, "fluct_core=trace");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            LoggingConfig::from_lookup(lookup(&[(FILTER_ENV, "  "), (FORMAT_ENV, "")])).unwrap();
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = LoggingConfig::from_lookup(lookup(&[(FORMAT_ENV, "xml")])).unwrap_err();
        assert!(matches!(err, LoggingError::Format(ref f) if f == "xml"));
        assert!(err.to_string().contains("expected pretty, compact or json"));
    }

    #[test]
    fn bad_filter_fails_before_install() {
        let config = LoggingConfig::default().with_filter("fluct_core=loudest");
        let err = init(&config).unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
    }

    #[test]
    fn format_round_trips_through_display() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[test]
    fn second_install_fails() {
        let config = LoggingConfig::default().with_format(LogFormat::Compact);
        let first = init(&config);
        let second = init(&config);
        // Another test binary thread may have won the first install.
        assert!(first.is_ok() || matches!(first, Err(LoggingError::Install(_))));
        assert!(matches!(second, Err(LoggingError::Install(_))));
    }
}
