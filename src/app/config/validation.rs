use super::{Config, ConfigError};
use crate::sender::client::host_url;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write_key.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Write key must not be empty".to_string(),
            ));
        }

        let tag = self.queue_tag();
        if tag.contains(['/', '\\']) || tag == "." || tag == ".." {
            return Err(ConfigError::InvalidConfig(format!(
                "Queue tag '{tag}' must be a plain file name"
            )));
        }

        host_url(&self.api_host).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid API host '{}': {}", self.api_host, e))
        })?;
        if let Some(cdn_host) = &self.cdn_host {
            host_url(cdn_host).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid CDN host '{cdn_host}': {e}"))
            })?;
        }

        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        self.queue_config()
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config {
            write_key: "wk".to_string(),
            ..Config::default()
        };
        config.post_process().unwrap();
        config
    }

    #[test]
    fn test_default_with_key_is_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_rejects_path_like_tag() {
        let config = Config {
            tag: Some("../other".to_string()),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_payload_larger_than_batch() {
        let config = Config {
            max_payload_size: 500_000,
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let config = Config {
            read_timeout_secs: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }
}
