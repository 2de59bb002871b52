use anyhow::Result;
use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,

    // Upstream
    pub base_url: String,
    pub api_key: String,

    // Timeouts
    pub request_timeout_secs: u64,
    /// Maximum silence between two upstream chunks while streaming; `0` disables it.
    pub stream_idle_timeout_secs: u64,

    // Logging
    pub debug: bool,
    pub verbose: bool,
    pub log_raw_json: bool,
}

impl Config {
    fn load_dotenv(custom_path: Option<PathBuf>) -> Option<PathBuf> {
        if let Some(path) = custom_path {
            if path.exists() && dotenvy::from_path(&path).is_ok() {
                return Some(path);
            }
            eprintln!("⚠️  WARNING: Custom config file not found: {}", path.display());
        }

        if let Ok(path) = dotenvy::dotenv() {
            return Some(path);
        }

        if let Ok(home) = env::var("HOME") {
            let home_config = PathBuf::from(home).join(".nim-proxy.env");
            if home_config.exists() && dotenvy::from_path(&home_config).is_ok() {
                return Some(home_config);
            }
        }

        let etc_config = PathBuf::from("/etc/nim-proxy/.env");
        if etc_config.exists() && dotenvy::from_path(&etc_config).is_ok() {
            return Some(etc_config);
        }

        None
    }

    pub fn from_env_with_path(custom_path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = Self::load_dotenv(custom_path) {
            eprintln!("📄 Loaded config from: {}", path.display());
        } else {
            eprintln!("ℹ️  No .env file found, using environment variables only");
        }

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let base_url = env::var("NIM_BASE_URL")
            .or_else(|_| env::var("UPSTREAM_BASE_URL"))
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        // An empty key is still sent; the upstream answers with an auth failure.
        let api_key = env::var("NIM_API_KEY")
            .or_else(|_| env::var("UPSTREAM_API_KEY"))
            .unwrap_or_default();

        let request_timeout_secs = parse_secs("REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECS must be greater than 0"));
        }

        let stream_idle_timeout_secs = parse_secs("STREAM_IDLE_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS);

        let debug = parse_flag("DEBUG");
        let verbose = parse_flag("VERBOSE");
        let log_raw_json = parse_flag("LOG_RAW_JSON");

        if base_url.trim_end_matches('/').ends_with("/v1") {
            eprintln!("⚠️  WARNING: NIM_BASE_URL ends with '/v1'");
            eprintln!("   This will result in URLs like: {}/v1/chat/completions", base_url);
            eprintln!("   Consider removing '/v1' from NIM_BASE_URL");
        }

        Ok(Config {
            port,
            base_url,
            api_key,
            request_timeout_secs,
            stream_idle_timeout_secs,
            debug,
            verbose,
            log_raw_json,
        })
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        match self.stream_idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn parse_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn parse_secs(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds, got {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}
