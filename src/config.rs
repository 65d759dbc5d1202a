// src/config.rs
use crate::errors::RestorationError;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub model_timeout: Duration,
    pub temp_retention: Duration,
    pub cleanup_interval: Duration,
    pub max_upload_bytes: usize,
    pub max_image_dimension: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, RestorationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RestorationError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gemini_api_key = var("GEMINI_API_KEY")
            .ok_or_else(|| RestorationError::Config("GEMINI_API_KEY must be set".to_string()))?;

        Ok(Self {
            gemini_api_key,
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: var("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 3001)?,
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            static_dir: var("STATIC_DIR").map(PathBuf::from),
            temperature: parse_or(&var, "MODEL_TEMPERATURE", 0.1)?,
            max_output_tokens: parse_or(&var, "MODEL_MAX_OUTPUT_TOKENS", 2048)?,
            model_timeout: Duration::from_secs(parse_or(&var, "MODEL_TIMEOUT_SECS", 120)?),
            temp_retention: Duration::from_secs(parse_or(&var, "TEMP_RETENTION_SECS", 3600)?),
            cleanup_interval: Duration::from_secs(parse_or(&var, "CLEANUP_INTERVAL_SECS", 600)?),
            max_upload_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            max_image_dimension: parse_or(&var, "MAX_IMAGE_DIMENSION", 4096)?,
        })
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, RestorationError>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| RestorationError::Config(format!("{} has invalid value `{}`: {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, RestorationError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = config_from(&[("GEMINI_API_KEY", "secret")]).unwrap();
        assert_eq!(config.gemini_model, "gemini-2.5-flash-image");
        assert_eq!(config.port, 3001);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.static_dir, None);
        assert_eq!(config.max_output_tokens, 2048);
        assert_eq!(config.temp_retention, Duration::from_secs(3600));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = config_from(&[("GEMINI_API_KEY", "  ")]).unwrap_err();
        assert!(matches!(err, RestorationError::Config(_)));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("PORT", "8080"),
            ("MODEL_TEMPERATURE", "0.4"),
            ("MODEL_TIMEOUT_SECS", "30"),
            ("STATIC_DIR", "frontend/dist"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!((config.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.model_timeout, Duration::from_secs(30));
        assert_eq!(config.static_dir, Some(PathBuf::from("frontend/dist")));
    }

    #[test]
    fn unparseable_numbers_are_errors() {
        let err = config_from(&[("GEMINI_API_KEY", "secret"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
