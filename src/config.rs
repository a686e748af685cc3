use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_UPLOAD_URL: &str = "https://images.oky.ac.cn/api/upload";
pub const DEFAULT_RETRIEVAL_PREFIX: &str = "https://images.oky.ac.cn/.netlify/images?url=";

const APP_DIR_NAME: &str = "okyimages";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub upload_url: String,
    pub retrieval_prefix: String,
    pub request_timeout_secs: u64,
    pub capture_initial_timeout_ms: u64,
    pub capture_settle_timeout_ms: u64,
    pub scratch_dir: Option<PathBuf>,
    pub helpers_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            retrieval_prefix: DEFAULT_RETRIEVAL_PREFIX.to_string(),
            request_timeout_secs: 120,
            capture_initial_timeout_ms: 15_000,
            capture_settle_timeout_ms: 2_000,
            scratch_dir: None,
            helpers_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn capture_initial_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_initial_timeout_ms)
    }

    pub fn capture_settle_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_settle_timeout_ms)
    }

    /// Directory holding clipboard scratch files.
    pub fn scratch_directory(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME))
    }

    /// Directory holding the platform capture helper scripts.
    pub fn helpers_directory(&self) -> PathBuf {
        if let Some(dir) = &self.helpers_dir {
            return dir.clone();
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|parent| parent.join("assets")))
            .unwrap_or_else(|| PathBuf::from("assets"))
    }

    pub fn env_filter_level(&self) -> log::LevelFilter {
        self.log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

pub fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join(APP_DIR_NAME);

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_config() -> AppResult<Config> {
    let config_path = get_config_path()?;

    if config_path.exists() {
        let config_str = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_str).unwrap_or_else(|e| {
            log::warn!("Failed to parse config file: {}. Using defaults.", e);
            Config::default()
        });

        validate_config(&config)?;

        Ok(config)
    } else {
        let default_config = Config::default();
        save_config(&default_config)?;
        Ok(default_config)
    }
}

pub fn save_config(config: &Config) -> AppResult<()> {
    validate_config(config)?;
    let config_path = get_config_path()?;

    if config_path.exists() {
        let backup_path = config_path.with_extension("json.bak");
        if let Err(e) = fs::copy(&config_path, &backup_path) {
            log::warn!("Failed to create config backup: {}", e);
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_str)?;

    log::info!("Configuration saved to {}", config_path.display());
    Ok(())
}

pub fn reset_config() -> AppResult<()> {
    save_config(&Config::default())?;
    log::info!("Configuration reset to defaults");
    Ok(())
}

pub fn validate_config(config: &Config) -> AppResult<()> {
    if !is_http_url(&config.upload_url) {
        return Err(AppError::validation("upload_url", "Must be an http(s) URL"));
    }

    if !is_http_url(&config.retrieval_prefix) {
        return Err(AppError::validation(
            "retrieval_prefix",
            "Must be an http(s) URL",
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(AppError::validation(
            "request_timeout_secs",
            "Must be greater than 0",
        ));
    }

    if config.capture_initial_timeout_ms == 0 {
        return Err(AppError::validation(
            "capture_initial_timeout_ms",
            "Must be greater than 0",
        ));
    }

    if config.capture_settle_timeout_ms == 0 {
        return Err(AppError::validation(
            "capture_settle_timeout_ms",
            "Must be greater than 0",
        ));
    }

    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(AppError::validation("log_level", "Must be a valid log level"));
    }

    Ok(())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}
