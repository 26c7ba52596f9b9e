use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("invalid logging level `{0}`")]
    InvalidLevel(String),
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

/// Represents a custom time stamp format for logging, see
/// [chrono strftime](https://docs.rs/chrono/latest/chrono/format/strftime/index.html).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TimestampFormat(pub String);

impl Default for TimestampFormat {
    fn default() -> Self {
        Self("%Y-%m-%dT%H:%M:%S".to_string())
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct LoggingFormat {
    /// Include the target of each event.
    #[serde(default)]
    pub target: bool,
    #[serde(default)]
    pub timestamp: TimestampFormat,
    #[serde(default)]
    pub ansi_colors: bool,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LoggingConfig {
    /// Default level, `RUST_LOG` directives take precedence.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LoggingFormat,
}

fn default_level() -> String {
    LevelFilter::INFO.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LoggingFormat::default(),
        }
    }
}

impl LoggingConfig {
    pub fn logging_filter(&self) -> Result<EnvFilter, LoggingError> {
        let level = self
            .level
            .parse::<LevelFilter>()
            .map_err(|_| LoggingError::InvalidLevel(self.level.clone()))?;

        Ok(EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy())
    }

    /// Installs the global subscriber writing to stdout.
    pub fn try_init(&self) -> Result<(), LoggingError> {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(self.format.ansi_colors)
            .with_target(self.format.target)
            .with_timer(ChronoLocal::new(self.format.timestamp.0.clone()))
            .fmt_fields(PrettyFields::new())
            .with_filter(self.logging_filter()?);

        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|err| LoggingError::TryInitError(err.to_string()))
    }
}
