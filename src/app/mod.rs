pub mod config;
pub mod logging_system;

pub use config::{Config, ConfigError, LogLevel};
pub use logging_system::{LoggingSystem, setup_logging_safe};

use crate::domain::{AnalyticsError, EventRecord};
use crate::pipeline::{Collaborators, FlushCoordinator, FlushReport};
use crate::sender::HttpTransport;
use crate::storage::open_store;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Integration entry in the remote settings that carries collector overrides.
pub const COLLECTOR_INTEGRATION: &str = "Rask Analytics";

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub accepted: usize,
    pub invalid: usize,
    pub flush: FlushReport,
}

pub struct App {
    config: Config,
    coordinator: FlushCoordinator,
}

impl App {
    pub async fn from_args<I, T>(args: I) -> Result<Self, AnalyticsError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config).await
    }

    /// Builds the transport, applies remote settings when a CDN host is
    /// configured and starts the coordinator over the on-disk queue.
    pub async fn from_config(mut config: Config) -> Result<Self, AnalyticsError> {
        let transport = Arc::new(HttpTransport::new(config.client_config())?);

        if let Some(cdn_host) = config.cdn_host.clone() {
            match transport.fetch_settings(&cdn_host).await {
                Ok(settings) => {
                    if let Some(api_host) = settings.api_host(COLLECTOR_INTEGRATION) {
                        info!("Using collector host {} from remote settings", api_host);
                        config.api_host = api_host.to_string();
                    }
                }
                Err(e) => warn!("Could not fetch settings, keeping configured host: {}", e),
            }
        }

        let store = open_store(&config.storage_dir, config.queue_tag());
        let coordinator = FlushCoordinator::start(
            config.queue_config(),
            store,
            transport,
            Collaborators::default(),
        )?;

        info!(
            "Starting rask-analytics v{} (api_host={}, queue={}/{})",
            crate::VERSION,
            config.api_host,
            config.storage_dir.display(),
            config.queue_tag()
        );
        Ok(Self {
            config,
            coordinator,
        })
    }

    pub fn coordinator(&self) -> &FlushCoordinator {
        &self.coordinator
    }

    /// Enqueues every event read from the input, flushes and shuts down.
    pub async fn run(self) -> Result<RunSummary, AnalyticsError> {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &self.config.input {
            Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };
        let result = self.ingest(reader).await;

        // Queued events survive on disk even when ingestion failed
        self.coordinator.shutdown().await?;
        result
    }

    async fn ingest(
        &self,
        reader: Box<dyn AsyncBufRead + Unpin + Send>,
    ) -> Result<RunSummary, AnalyticsError> {
        let mut summary = RunSummary::default();
        let mut lines = reader.lines();
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event = serde_json::from_str::<serde_json::Value>(line)
                .map_err(|e| e.to_string())
                .and_then(|value| EventRecord::try_from(value).map_err(|e| e.to_string()));
            match event {
                Ok(event) => {
                    self.coordinator.enqueue(event)?;
                    summary.accepted += 1;
                }
                Err(e) => {
                    warn!("Skipping input line {}: {}", line_number, e);
                    summary.invalid += 1;
                }
            }
        }

        self.coordinator.sync().await?;
        summary.flush = self.coordinator.flush_now().await?;
        info!(
            "Accepted {} events ({} invalid), flush outcome {:?} with {} remaining",
            summary.accepted, summary.invalid, summary.flush.outcome, summary.flush.remaining
        );
        println!("{}", self.coordinator.stats());
        Ok(summary)
    }
}

pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(2);
        }
    };

    if let Err(e) = setup_logging_safe(config.log_level) {
        eprintln!("Warning: {e}");
    }

    let app = match App::from_config(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("Application error: {}", e);
        process::exit(1);
    }
    Ok(())
}
