use std::time::Duration;
use thiserror::Error;

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// Name the web dashboard's build exposes the key under; read when `GEMINI_API_KEY` is unset.
const PUBLIC_GEMINI_API_KEY: &str = "NEXT_PUBLIC_GEMINI_API_KEY";

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
const DEFAULT_TEMPERATURE: f32 = 0.4;
const DEFAULT_LOCATION: &str = "Banyuwangi";
const DEFAULT_MARKET_REGION: &str = "Jawa Timur";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_timeout_secs: u64,
    pub gemini_max_output_tokens: u32,
    pub gemini_temperature: f32,
    pub default_location: String,
    pub market_region: String,
    pub sentry_dsn: Option<String>,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            gemini_api_key: get(GEMINI_API_KEY).or_else(|| get(PUBLIC_GEMINI_API_KEY)),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_timeout_secs: parse_or(
                "GEMINI_TIMEOUT_SECS",
                get("GEMINI_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
            )?,
            gemini_max_output_tokens: parse_or(
                "GEMINI_MAX_OUTPUT_TOKENS",
                get("GEMINI_MAX_OUTPUT_TOKENS"),
                DEFAULT_MAX_OUTPUT_TOKENS,
            )?,
            gemini_temperature: parse_or(
                "GEMINI_TEMPERATURE",
                get("GEMINI_TEMPERATURE"),
                DEFAULT_TEMPERATURE,
            )?,
            default_location: get("DEFAULT_LOCATION")
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            market_region: get("MARKET_REGION")
                .unwrap_or_else(|| DEFAULT_MARKET_REGION.to_string()),
            sentry_dsn: get("SENTRY_DSN"),
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
        })
    }

    pub fn require_gemini_api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .ok_or(ConfigError::Missing(GEMINI_API_KEY))
    }

    pub fn gemini_config(&self) -> Result<GeminiConfig, ConfigError> {
        let api_key = self.require_gemini_api_key()?.to_string();
        Ok(GeminiConfig {
            api_key,
            base_url: self.gemini_base_url.clone(),
            model: self.gemini_model.clone(),
            timeout: Duration::from_secs(self.gemini_timeout_secs),
            max_output_tokens: self.gemini_max_output_tokens,
            temperature: self.gemini_temperature,
        })
    }

    pub fn prompt_context(&self) -> PromptContext {
        PromptContext {
            default_location: self.default_location.clone(),
            region: self.market_region.clone(),
        }
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Everything the Gemini client needs, validated once and handed over at construction.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Regional framing injected into every prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub default_location: String,
    pub region: String,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            default_location: DEFAULT_LOCATION.to_string(),
            region: DEFAULT_MARKET_REGION.to_string(),
        }
    }
}
