//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use script_engine_core::RateTable;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    pub data_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub script_model: String,
    pub audit_model: String,
    pub image_model: String,
    pub tts_model: String,
    pub tts_voice_en: String,
    pub tts_voice_es: String,
    pub video_model: String,
    pub video_poll_interval: Duration,
    pub rates: RateTable,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address = parse_var("BIND_ADDRESS", var("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var("CORS_ORIGIN", "http://localhost:3000");
        let data_dir = PathBuf::from(var("DATA_DIR", "./data"));

        // --- OpenAI Settings ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        let openai_api_base = lookup("OPENAI_API_BASE").filter(|base| !base.trim().is_empty());

        let script_model = var("SCRIPT_MODEL", "gpt-4o-mini");
        let audit_model = var("AUDIT_MODEL", "gpt-4o");
        let image_model = var("IMAGE_MODEL", "dall-e-3");
        let tts_model = var("TTS_MODEL", "tts-1");
        let tts_voice_en = var("TTS_VOICE_EN", "alloy");
        let tts_voice_es = var("TTS_VOICE_ES", "nova");
        let video_model = var("VIDEO_MODEL", "sora-2");
        let poll_secs: u64 = parse_var("VIDEO_POLL_SECS", var("VIDEO_POLL_SECS", "10"))?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "VIDEO_POLL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Cost Rates ---
        let defaults = RateTable::default();
        let rate = |key: &str, default: f64| -> Result<f64, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => {
                    let value: f64 = parse_var(key, raw)?;
                    if value.is_finite() && value >= 0.0 {
                        Ok(value)
                    } else {
                        Err(ConfigError::InvalidValue(
                            key.to_string(),
                            "must be a non-negative number".to_string(),
                        ))
                    }
                }
            }
        };
        let rates = RateTable {
            input_per_million_tokens: rate("COST_INPUT_PER_1M", defaults.input_per_million_tokens)?,
            output_per_million_tokens: rate(
                "COST_OUTPUT_PER_1M",
                defaults.output_per_million_tokens,
            )?,
            per_image: rate("COST_PER_IMAGE", defaults.per_image)?,
            per_video: rate("COST_PER_VIDEO", defaults.per_video)?,
            audio_per_million_chars: rate("COST_AUDIO_PER_1M", defaults.audio_per_million_chars)?,
        };

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            data_dir,
            openai_api_key,
            openai_api_base,
            script_model,
            audit_model,
            image_model,
            tts_model,
            tts_voice_en,
            tts_voice_es,
            video_model,
            video_poll_interval: Duration::from_secs(poll_secs),
            rates,
        })
    }

    /// The API key, which only the server binary requires.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
    }
}

fn parse_var<T>(key: &str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.script_model, "gpt-4o-mini");
        assert_eq!(config.tts_voice_es, "nova");
        assert_eq!(config.video_poll_interval, Duration::from_secs(10));
        assert_eq!(config.rates, RateTable::default());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn rates_can_be_overridden() {
        let config = config_with(&[("COST_PER_IMAGE", "0.04"), ("OPENAI_API_KEY", "sk-test")])
            .unwrap();
        assert_eq!(config.rates.per_image, 0.04);
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn invalid_values_are_reported_with_their_variable() {
        let err = config_with(&[("COST_PER_VIDEO", "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "COST_PER_VIDEO"));

        let err = config_with(&[("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "BIND_ADDRESS"));

        let err = config_with(&[("VIDEO_POLL_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "VIDEO_POLL_SECS"));
    }
}
