use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "AviIngest";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_RECORDS_URL: &str = "http://localhost:9898";
const DEFAULT_VISION_URL: &str = "https://api.openai.com/v1";
const DEFAULT_VISION_MODEL: &str = "o4-mini";
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PERSIST_CONCURRENCY: usize = 4;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024; // 20 MB

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "avi_ingest_lib=info,tower_http=info"
}

/// Get the application data directory
/// ~/AviIngest/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default directory for raw uploads.
pub fn uploads_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Base URL of the downstream record-keeping service.
    pub records_base_url: String,
    /// Base URL of the OpenAI-compatible vision API.
    pub vision_base_url: String,
    pub vision_model: String,
    pub vision_api_key: Option<String>,
    pub upload_dir: PathBuf,
    pub extraction_timeout: Duration,
    pub write_timeout: Duration,
    /// Maximum number of in-flight sub-record writes per persistence operation.
    pub persist_concurrency: usize,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            records_base_url: DEFAULT_RECORDS_URL.into(),
            vision_base_url: DEFAULT_VISION_URL.into(),
            vision_model: DEFAULT_VISION_MODEL.into(),
            vision_api_key: None,
            upload_dir: uploads_dir(),
            extraction_timeout: Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            persist_concurrency: DEFAULT_PERSIST_CONCURRENCY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unset or empty variables fall back to defaults; present but
    /// unparsable values are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind_addr = parse_var(
            "AVI_BIND_ADDR",
            get("AVI_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
        )?;

        let extraction_timeout_secs: u64 = match get("AVI_EXTRACTION_TIMEOUT_SECS") {
            Some(v) => parse_var("AVI_EXTRACTION_TIMEOUT_SECS", v)?,
            None => DEFAULT_EXTRACTION_TIMEOUT_SECS,
        };
        let write_timeout_secs: u64 = match get("AVI_WRITE_TIMEOUT_SECS") {
            Some(v) => parse_var("AVI_WRITE_TIMEOUT_SECS", v)?,
            None => DEFAULT_WRITE_TIMEOUT_SECS,
        };
        let persist_concurrency: usize = match get("AVI_PERSIST_CONCURRENCY") {
            Some(v) => parse_var("AVI_PERSIST_CONCURRENCY", v)?,
            None => DEFAULT_PERSIST_CONCURRENCY,
        };
        let max_upload_bytes: usize = match get("AVI_MAX_UPLOAD_BYTES") {
            Some(v) => parse_var("AVI_MAX_UPLOAD_BYTES", v)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            bind_addr,
            records_base_url: trim_base_url(
                get("AVI_RECORDS_URL").unwrap_or(defaults.records_base_url),
            ),
            vision_base_url: trim_base_url(
                get("AVI_VISION_URL").unwrap_or(defaults.vision_base_url),
            ),
            vision_model: get("AVI_VISION_MODEL").unwrap_or(defaults.vision_model),
            vision_api_key: get("OPENAI_API_KEY"),
            upload_dir: get("AVI_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            extraction_timeout: Duration::from_secs(extraction_timeout_secs),
            write_timeout: Duration::from_secs(write_timeout_secs),
            persist_concurrency: persist_concurrency.max(1),
            max_upload_bytes,
        })
    }
}

fn parse_var<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            var,
            reason: e.to_string(),
            value,
        })
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
