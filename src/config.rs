use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 10;
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const ERROR_PAUSE: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Watch the clipboard for images and upload each new one.
#[derive(Debug, Parser)]
#[command(
    name = "clipup",
    version,
    about = "Uploads clipboard images to an image service and copies the stored path back",
    after_help = "Examples:\n  clipup http://homeassistant.local:8123\n  clipup http://192.168.1.100:7680"
)]
pub struct Cli {
    /// Base URL of the image service
    #[arg(value_name = "SERVICE_URL")]
    pub url: String,

    /// Clipboard poll interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Upload request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_UPLOAD_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Skip images larger than this many megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    pub max_size_mb: usize,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn to_config(&self) -> anyhow::Result<MonitorConfig> {
        let parsed = reqwest::Url::parse(&self.url)
            .with_context(|| format!("'{}' is not a valid URL", self.url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("'{}' must use http or https", self.url);
        }

        Ok(MonitorConfig {
            base_url: self.url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(self.interval_ms),
            upload_timeout: Duration::from_secs(self.timeout_secs),
            max_upload_bytes: self.max_size_mb.saturating_mul(1024 * 1024),
            ..MonitorConfig::default()
        })
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Service base URL without a trailing slash.
    pub base_url: String,
    pub poll_interval: Duration,
    pub upload_timeout: Duration,
    pub probe_timeout: Duration,
    /// Pause after an unexpected cycle fault.
    pub error_pause: Duration,
    pub max_upload_bytes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            probe_timeout: PROBE_TIMEOUT,
            error_pause: ERROR_PAUSE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}
