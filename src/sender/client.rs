use super::connection::HttpConnection;
use super::error::TransportError;
use super::settings::Settings;
use super::{UploadConnection, UploadTransport};
use clap::ValueEnum;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Basic base64(<write key>:)`
    #[default]
    Basic,
    /// `Authorization: Bearer <write key>`
    Bearer,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub write_key: String,
    pub auth_scheme: AuthScheme,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
    pub max_connections: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            write_key: String::new(),
            auth_scheme: AuthScheme::Basic,
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(20),
            user_agent: format!("rask-analytics/{}", crate::VERSION),
            enable_compression: false,
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
}

#[derive(Debug, Default)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time: AtomicU64,
}

impl ClientStats {
    pub fn record_request(&self, success: bool, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// HTTP implementation of [`UploadTransport`] plus the settings fetch.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
    stats: Arc<ClientStats>,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        if config.write_key.trim().is_empty() {
            return Err(TransportError::InvalidConfiguration(
                "write key must not be empty".to_string(),
            ));
        }

        let client = ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                TransportError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn upload_url(&self, api_host: &str) -> Result<Url, TransportError> {
        endpoint(api_host, "batch")
    }

    pub fn settings_url(&self, cdn_host: &str) -> Result<Url, TransportError> {
        endpoint(
            cdn_host,
            &format!("projects/{}/settings", self.config.write_key),
        )
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.auth_scheme {
            AuthScheme::Basic => request.basic_auth(&self.config.write_key, None::<&str>),
            AuthScheme::Bearer => request.bearer_auth(&self.config.write_key),
        }
    }

    /// GETs the project settings. Anything but 200 is an error.
    pub async fn fetch_settings(&self, cdn_host: &str) -> Result<Settings, TransportError> {
        let url = self.settings_url(cdn_host)?;
        debug!("Fetching settings from {}", url);

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .timeout(self.config.read_timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_request(e, self.config.read_timeout))?;

        let status = response.status();
        self.stats
            .record_request(status == StatusCode::OK, start.elapsed());

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_request(e, self.config.read_timeout))?;
        Ok(Settings::from_json(&body)?)
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        let total_requests = self.stats.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.stats.total_response_time.load(Ordering::Relaxed);

        let average_response_time = if total_requests > 0 {
            Duration::from_millis(total_response_time / total_requests)
        } else {
            Duration::ZERO
        };

        ConnectionStats {
            total_requests,
            successful_requests: self.stats.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.stats.failed_requests.load(Ordering::Relaxed),
            average_response_time,
        }
    }
}

impl UploadTransport for HttpTransport {
    fn open(&self, api_host: &str) -> Result<Box<dyn UploadConnection>, TransportError> {
        let url = self.upload_url(api_host)?;
        Ok(Box::new(HttpConnection::new(self.clone(), url)))
    }
}

/// Hosts without a scheme are served over HTTPS.
pub(crate) fn host_url(host: &str) -> Result<Url, TransportError> {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(TransportError::InvalidConfiguration(
            "host must not be empty".to_string(),
        ));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&candidate)
        .map_err(|e| TransportError::InvalidConfiguration(format!("Invalid host '{host}': {e}")))
}

fn endpoint(host: &str, path: &str) -> Result<Url, TransportError> {
    let base = host_url(host)?;
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined)
        .map_err(|e| TransportError::InvalidConfiguration(format!("Invalid URL '{joined}': {e}")))
}
