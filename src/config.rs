use crate::errors::{BanterError, BanterResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{env, sync::RwLock};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.9,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 2048,
            log_level: "info".to_string(),
        }
    }
}

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Builds the config from the environment and installs it globally.
///
/// `GEMINI_API_KEY` is required; `BANTER_MODEL`, `BANTER_BASE_URL` and
/// `BANTER_LOG` override the defaults.
pub fn initialize_config() -> BanterResult<()> {
    let mut config = Config::default();

    config.api_key = env::var("GEMINI_API_KEY")
        .map_err(|_| BanterError::config_error("GEMINI_API_KEY is not set"))?;

    if let Ok(model) = env::var("BANTER_MODEL") {
        if !model.trim().is_empty() {
            config.model = model.trim().to_string();
        }
    }

    if let Ok(url) = env::var("BANTER_BASE_URL") {
        if !url.trim().is_empty() {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
    }

    if let Ok(level) = env::var("BANTER_LOG") {
        if !level.trim().is_empty() {
            config.log_level = level.trim().to_string();
        }
    }

    validate_config(&config)?;

    *CONFIG.write().unwrap() = config;
    Ok(())
}

fn validate_config(config: &Config) -> BanterResult<()> {
    if config.api_key.is_empty() {
        return Err(BanterError::config_error("API key is required"));
    }

    if config.model.is_empty() {
        return Err(BanterError::config_error("model name is required"));
    }

    if config.base_url.is_empty() {
        return Err(BanterError::config_error("base URL is required"));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(BanterError::config_error(
            "temperature must be between 0.0 and 2.0",
        ));
    }

    if !(0.0..=1.0).contains(&config.top_p) {
        return Err(BanterError::config_error("top_p must be between 0.0 and 1.0"));
    }

    if config.max_output_tokens == 0 {
        return Err(BanterError::config_error(
            "max_output_tokens must be greater than 0",
        ));
    }

    Ok(())
}

pub fn get_config() -> Config {
    CONFIG.read().unwrap().clone()
}
