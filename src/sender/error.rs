use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP {code} {message}: {body}")]
    Http {
        code: u16,
        message: String,
        body: String,
    },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid settings payload: {0}")]
    InvalidSettings(#[from] serde_json::Error),
    #[error("Connection already closed")]
    AlreadyClosed,
}

impl TransportError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Http { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 4xx other than 429: the collector will never accept this batch.
    pub fn is_client_rejection(&self) -> bool {
        matches!(self, TransportError::Http { code, .. } if (400..500).contains(code) && *code != 429)
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_client_rejection()
            && !matches!(
                self,
                TransportError::InvalidConfiguration(_) | TransportError::AlreadyClosed
            )
    }

    pub(crate) fn from_request(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(timeout)
        } else {
            TransportError::Network(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(code: u16) -> TransportError {
        TransportError::Http {
            code,
            message: String::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(http(400).is_client_rejection());
        assert!(http(413).is_client_rejection());
        assert!(!http(429).is_client_rejection());
        assert!(http(429).is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(TransportError::Timeout(Duration::from_secs(20)).is_retryable());
        assert_eq!(http(404).status_code(), Some(404));
    }
}
