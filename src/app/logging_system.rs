use super::config::LogLevel;
use parking_lot::RwLock;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid directive '{input}', expected target=level")]
    InvalidDirective { input: String },
    #[error("Unknown log level '{0}'")]
    UnknownLevel(String),
    #[error("Logging initialization failed: {0}")]
    InitFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    pub target: String,
    pub level: LogLevel,
}

impl LogDirective {
    pub fn new(target: impl Into<String>, level: LogLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    pub fn parse(directive: &str) -> Result<Self, LoggingError> {
        let Some((target, level)) = directive.split_once('=') else {
            return Err(LoggingError::InvalidDirective {
                input: directive.to_string(),
            });
        };
        let target = target.trim();
        if target.is_empty() || level.contains('=') {
            return Err(LoggingError::InvalidDirective {
                input: directive.to_string(),
            });
        }
        Ok(Self::new(target, parse_level(level.trim())?))
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level.as_str())
    }
}

fn parse_level(level: &str) -> Result<LogLevel, LoggingError> {
    match level.to_ascii_lowercase().as_str() {
        "error" => Ok(LogLevel::Error),
        "warn" | "warning" => Ok(LogLevel::Warn),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "trace" => Ok(LogLevel::Trace),
        _ => Err(LoggingError::UnknownLevel(level.to_string())),
    }
}

/// Collects per-target filter directives and installs the global subscriber.
#[derive(Debug, Default)]
pub struct LoggingSystem {
    directives: RwLock<Vec<LogDirective>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `target=level` directive. Malformed directives are skipped with
    /// a warning on stderr; an unknown level falls back to `info`.
    pub fn add_directive(&self, directive: &str) {
        match LogDirective::parse(directive) {
            Ok(parsed) => self.directives.write().push(parsed),
            Err(LoggingError::UnknownLevel(level)) => {
                eprintln!("Warning: unknown level '{level}' in '{directive}', using info");
                let target = directive.split('=').next().unwrap_or_default().trim();
                self.directives
                    .write()
                    .push(LogDirective::new(target, LogLevel::Info));
            }
            Err(e) => eprintln!("Warning: {e}, skipping directive"),
        }
    }

    /// Quiets the HTTP stack below the application's own level.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["hyper", "hyper_util", "reqwest", "h2", "rustls"] {
            directives.push(LogDirective::new(target, LogLevel::Warn));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        std::iter::once(default_level.as_str().to_string())
            .chain(directives.iter().map(LogDirective::to_filter_string))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

    /// Installs a compact fmt subscriber. `RUST_LOG`, when set, replaces the
    /// built filter.
    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), LoggingError> {
        let filter = match std::env::var("RUST_LOG") {
            Ok(value) if !value.trim().is_empty() => value,
            _ => self.build_filter_string(default_level),
        };
        let env_filter = EnvFilter::try_new(&filter)
            .map_err(|e| LoggingError::InitFailed(format!("bad filter '{filter}': {e}")))?;

        let subscriber = tracing_subscriber::registry().with(env_filter).with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        );

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| LoggingError::InitFailed(e.to_string()))
    }
}

/// Installs logging once per process; later calls report whether the first
/// one succeeded.
pub fn setup_logging_safe(level: LogLevel) -> Result<(), LoggingError> {
    use std::sync::OnceLock;

    static INIT: OnceLock<Result<(), String>> = OnceLock::new();

    INIT.get_or_init(|| {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        logging_system
            .initialize_tracing(level)
            .map_err(|e| e.to_string())
    })
    .clone()
    .map_err(LoggingError::InitFailed)
}
