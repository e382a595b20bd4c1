use super::UploadConnection;
use super::client::HttpTransport;
use super::error::TransportError;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use std::io::{self, Write};
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

enum BodyWriter {
    Plain(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
}

impl BodyWriter {
    fn new(compress: bool) -> Self {
        if compress {
            BodyWriter::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
        } else {
            BodyWriter::Plain(Vec::new())
        }
    }

    fn is_compressed(&self) -> bool {
        matches!(self, BodyWriter::Gzip(_))
    }

    fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            BodyWriter::Plain(buf) => Ok(buf),
            BodyWriter::Gzip(encoder) => encoder.finish(),
        }
    }
}

impl Write for BodyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BodyWriter::Plain(inner) => inner.write(buf),
            BodyWriter::Gzip(inner) => inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BodyWriter::Plain(inner) => inner.flush(),
            BodyWriter::Gzip(inner) => inner.flush(),
        }
    }
}

/// One batch upload. The body is buffered in memory and sent on
/// [`UploadConnection::close`].
pub struct HttpConnection {
    transport: HttpTransport,
    url: Url,
    body: Option<BodyWriter>,
}

impl HttpConnection {
    pub(crate) fn new(transport: HttpTransport, url: Url) -> Self {
        let body = BodyWriter::new(transport.config().enable_compression);
        Self {
            transport,
            url,
            body: Some(body),
        }
    }
}

impl Write for HttpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.body.as_mut() {
            Some(body) => body.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "upload connection already closed",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.body.as_mut() {
            Some(body) => body.flush(),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UploadConnection for HttpConnection {
    async fn close(&mut self) -> Result<(), TransportError> {
        let body = self.body.take().ok_or(TransportError::AlreadyClosed)?;
        let compressed = body.is_compressed();
        let payload = body.finish()?;
        let bytes_sent = payload.len();
        let read_timeout = self.transport.config().read_timeout;

        let mut request = self
            .transport
            .client()
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .timeout(read_timeout);
        if compressed {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        let request = self.transport.authorize(request).body(payload);

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.transport.stats().record_request(false, start.elapsed());
                return Err(TransportError::from_request(e, read_timeout));
            }
        };
        let latency = start.elapsed();
        let status = response.status();
        self.transport
            .stats()
            .record_request(status.is_success(), latency);

        if status.is_success() {
            debug!(
                "Uploaded {} bytes to {} in {:?} (HTTP {})",
                bytes_sent,
                self.url,
                latency,
                status.as_u16()
            );
            return Ok(());
        }

        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("Could not read response body for rejected message: {e}"),
        };
        warn!("Upload to {} failed: HTTP {}", self.url, status.as_u16());
        Err(TransportError::Http {
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        })
    }
}
