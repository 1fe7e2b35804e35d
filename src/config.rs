use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_TRANSLATION_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,

    // Translation provider
    pub translation_api_url: String,
    pub translation_api_key: Option<String>,
    pub translation_model: String,
    pub translation_temperature: f32,
    pub translation_max_tokens: u32,
    pub translation_timeout_secs: u64,

    // Pipeline
    pub source_locale: String,
    pub key_max_length: usize,
    pub max_page_size: u32,
}

/// The subset of configuration the phrase service itself needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Locale the source texts are written in
    pub source_locale: String,
    /// Maximum length of keys generated from extracted text
    pub key_max_length: usize,
    /// Upper bound for `limit` in paginated queries
    pub max_page_size: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source_locale: "en".to_string(),
            key_max_length: 50,
            max_page_size: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,

            translation_api_url: std::env::var("TRANSLATION_API_URL")
                .unwrap_or_else(|_| DEFAULT_TRANSLATION_API_URL.to_string()),
            translation_api_key: std::env::var("TRANSLATION_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            translation_model: std::env::var("TRANSLATION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            translation_temperature: parse_env("TRANSLATION_TEMPERATURE", 0.2)?,
            translation_max_tokens: parse_env("TRANSLATION_MAX_TOKENS", 2000)?,
            translation_timeout_secs: parse_env("TRANSLATION_TIMEOUT_SECS", 60)?,

            source_locale: std::env::var("SOURCE_LOCALE").unwrap_or_else(|_| "en".to_string()),
            key_max_length: parse_env("PHRASE_KEY_MAX_LENGTH", 50)?,
            max_page_size: parse_env("MAX_PAGE_SIZE", 200)?,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            source_locale: self.source_locale.clone(),
            key_max_length: self.key_max_length,
            max_page_size: self.max_page_size,
        }
    }

    pub fn translation_timeout(&self) -> Duration {
        Duration::from_secs(self.translation_timeout_secs)
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
/// A set but malformed value is an error rather than a silent default.
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
