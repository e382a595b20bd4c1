use super::{ConfigError, LogLevel};
use crate::pipeline::QueueConfig;
use crate::pipeline::config::{
    DEFAULT_API_HOST, DEFAULT_FLUSH_QUEUE_SIZE, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_PAYLOAD_SIZE,
    DEFAULT_MAX_QUEUE_SIZE,
};
use crate::sender::{AuthScheme, ClientConfig};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Project write key used to authenticate uploads
    #[arg(long, env = "RASK_WRITE_KEY", default_value = "")]
    pub write_key: String,

    /// Collector host; https:// is assumed when no scheme is given
    #[arg(long, env = "RASK_API_HOST", default_value = DEFAULT_API_HOST)]
    pub api_host: String,

    /// Settings CDN host; settings are fetched only when set
    #[arg(long, env = "RASK_CDN_HOST")]
    pub cdn_host: Option<String>,

    /// Directory holding the queue files
    #[arg(long, env = "RASK_STORAGE_DIR", default_value = "/tmp/rask-analytics/queue")]
    pub storage_dir: PathBuf,

    /// Queue file name (defaults to the write key)
    #[arg(long, env = "RASK_QUEUE_TAG")]
    pub tag: Option<String>,

    /// Queue length that triggers a flush
    #[arg(long, env = "FLUSH_QUEUE_SIZE", default_value_t = DEFAULT_FLUSH_QUEUE_SIZE)]
    pub flush_queue_size: usize,

    /// Flush interval in milliseconds
    #[arg(long, env = "FLUSH_INTERVAL_MS", default_value = "30000")]
    pub flush_interval_ms: u64,

    /// Maximum number of queued events
    #[arg(long, env = "MAX_QUEUE_SIZE", default_value_t = DEFAULT_MAX_QUEUE_SIZE)]
    pub max_queue_size: usize,

    /// Maximum encoded event size in bytes
    #[arg(long, env = "MAX_PAYLOAD_SIZE", default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
    pub max_payload_size: usize,

    /// Maximum batch size in bytes
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub max_batch_size: usize,

    /// Authorization scheme for the write key
    #[arg(long, env = "RASK_AUTH_SCHEME", default_value = "basic")]
    pub auth_scheme: AuthScheme,

    /// Gzip request bodies
    #[arg(long, env = "ENABLE_COMPRESSION")]
    pub enable_compression: bool,

    /// Connect timeout in seconds
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value = "15")]
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds
    #[arg(long, env = "READ_TIMEOUT_SECS", default_value = "20")]
    pub read_timeout_secs: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Newline-delimited JSON events to send (stdin when omitted)
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub flush_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub connect_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_key: String::new(),
            api_host: DEFAULT_API_HOST.to_string(),
            cdn_host: None,
            storage_dir: PathBuf::from("/tmp/rask-analytics/queue"),
            tag: None,
            flush_queue_size: DEFAULT_FLUSH_QUEUE_SIZE,
            flush_interval_ms: 30_000,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            auth_scheme: AuthScheme::Basic,
            enable_compression: false,
            connect_timeout_secs: 15,
            read_timeout_secs: 20,
            log_level: LogLevel::Info,
            config_file: None,
            input: None,
            flush_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(20),
        }
    }
}

/// Keeps `cli` unless it still holds the default and the file says otherwise.
fn prefer_explicit<T: PartialEq>(cli: &mut T, file: T, default: &T) {
    if cli == default && &file != default {
        *cli = file;
    }
}

impl Config {
    /// Parses CLI arguments (with environment fallbacks). When a config file
    /// is given, its values fill in whatever the command line left at the
    /// default.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        if let Some(path) = config.config_file.clone() {
            let file = Self::read_file(&path)?;
            config.merge_file(file);
        }
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path.as_ref())?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn merge_file(&mut self, file: Config) {
        let d = Config::default();
        prefer_explicit(&mut self.write_key, file.write_key, &d.write_key);
        prefer_explicit(&mut self.api_host, file.api_host, &d.api_host);
        prefer_explicit(&mut self.cdn_host, file.cdn_host, &d.cdn_host);
        prefer_explicit(&mut self.storage_dir, file.storage_dir, &d.storage_dir);
        prefer_explicit(&mut self.tag, file.tag, &d.tag);
        prefer_explicit(&mut self.flush_queue_size, file.flush_queue_size, &d.flush_queue_size);
        prefer_explicit(&mut self.flush_interval_ms, file.flush_interval_ms, &d.flush_interval_ms);
        prefer_explicit(&mut self.max_queue_size, file.max_queue_size, &d.max_queue_size);
        prefer_explicit(&mut self.max_payload_size, file.max_payload_size, &d.max_payload_size);
        prefer_explicit(&mut self.max_batch_size, file.max_batch_size, &d.max_batch_size);
        prefer_explicit(&mut self.auth_scheme, file.auth_scheme, &d.auth_scheme);
        prefer_explicit(&mut self.enable_compression, file.enable_compression, &d.enable_compression);
        prefer_explicit(&mut self.connect_timeout_secs, file.connect_timeout_secs, &d.connect_timeout_secs);
        prefer_explicit(&mut self.read_timeout_secs, file.read_timeout_secs, &d.read_timeout_secs);
        prefer_explicit(&mut self.log_level, file.log_level, &d.log_level);
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.flush_interval = Duration::from_millis(self.flush_interval_ms);
        self.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        self.read_timeout = Duration::from_secs(self.read_timeout_secs);
        self.write_key = self.write_key.trim().to_string();
        Ok(())
    }

    /// Queue file name: the explicit tag, else the write key.
    pub fn queue_tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.write_key)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            api_host: self.api_host.clone(),
            max_queue_size: self.max_queue_size,
            max_payload_size: self.max_payload_size,
            max_batch_size: self.max_batch_size,
            flush_queue_size: self.flush_queue_size,
            flush_interval: self.flush_interval,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            write_key: self.write_key.clone(),
            auth_scheme: self.auth_scheme,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            enable_compression: self.enable_compression,
            ..ClientConfig::default()
        }
    }
}
