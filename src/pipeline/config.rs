use super::error::CoordinatorError;
use std::time::Duration;

pub const DEFAULT_API_HOST: &str = "api.rask-analytics.io/v1";
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 32_000;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 475_000;
pub const DEFAULT_FLUSH_QUEUE_SIZE: usize = 20;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Collector host, with or without scheme.
    pub api_host: String,
    /// Record count ceiling; the oldest record is evicted beyond it.
    pub max_queue_size: usize,
    /// Largest accepted encoded event, in bytes.
    pub max_payload_size: usize,
    /// Ceiling on the stored bytes uploaded in one batch.
    pub max_batch_size: usize,
    /// Queue length that triggers a flush on enqueue.
    pub flush_queue_size: usize,
    pub flush_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            flush_queue_size: DEFAULT_FLUSH_QUEUE_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        let invalid = |msg: &str| Err(CoordinatorError::InvalidConfiguration(msg.to_string()));

        if self.api_host.trim().is_empty() {
            return invalid("api_host must not be empty");
        }
        if self.max_queue_size == 0 {
            return invalid("max_queue_size must be greater than 0");
        }
        if self.max_payload_size == 0 {
            return invalid("max_payload_size must be greater than 0");
        }
        if self.max_batch_size < self.max_payload_size {
            return invalid("max_batch_size must be at least max_payload_size");
        }
        if self.flush_queue_size == 0 {
            return invalid("flush_queue_size must be greater than 0");
        }
        if self.flush_interval.is_zero() {
            return invalid("flush_interval must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.max_payload_size, 32_000);
        assert_eq!(config.max_batch_size, 475_000);
        assert_eq!(config.flush_queue_size, 20);
        assert_eq!(config.flush_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_payload_larger_than_batch() {
        let config = QueueConfig {
            max_payload_size: 1000,
            max_batch_size: 999,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoordinatorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        for config in [
            QueueConfig {
                max_queue_size: 0,
                ..Default::default()
            },
            QueueConfig {
                flush_queue_size: 0,
                ..Default::default()
            },
            QueueConfig {
                flush_interval: Duration::ZERO,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }
}
