//! Upload transport: authenticated batch POSTs and the settings fetch.

pub mod client;
pub mod connection;
pub mod error;
pub mod settings;

pub use client::{AuthScheme, ClientConfig, ConnectionStats, HttpTransport};
pub use connection::HttpConnection;
pub use error::TransportError;
pub use settings::Settings;

use async_trait::async_trait;
use std::io::Write;

/// Opens one upload per batch.
pub trait UploadTransport: Send + Sync {
    fn open(&self, api_host: &str) -> Result<Box<dyn UploadConnection>, TransportError>;
}

/// A single in-progress upload. The batch body is written through
/// [`Write`]; `close` sends it and reports the collector's verdict.
/// Closing twice is [`TransportError::AlreadyClosed`].
#[async_trait]
pub trait UploadConnection: Write + Send {
    async fn close(&mut self) -> Result<(), TransportError>;
}
