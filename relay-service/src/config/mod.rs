use service_core::config as core_config;
use service_core::error::AppError;
use service_core::middleware::RateWindow;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_KEEP_ALIVE_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub keep_alive: KeepAliveSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub generation: GenerationSettings,
}

/// Applied uniformly to every model call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeepAliveSettings {
    /// Self-ping target. No default: the loop is disabled when unset.
    pub url: Option<String>,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_minute: 10,
            per_hour: 50,
            per_day: 200,
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitSettings {
    pub fn windows(&self) -> Vec<RateWindow> {
        vec![
            RateWindow::per_minute(self.per_minute),
            RateWindow::per_hour(self.per_hour),
            RateWindow::per_day(self.per_day),
        ]
    }
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GenerationSettings::default();
        let rate_defaults = RateLimitSettings::default();

        Ok(RelayConfig {
            common,
            gemini: GeminiSettings {
                api_key: required(&lookup, "GEMINI_API_KEY")?,
                model: get_env(&lookup, "GEMINI_MODEL", DEFAULT_MODEL),
                api_base: get_env(&lookup, "GEMINI_API_BASE", DEFAULT_API_BASE)
                    .trim_end_matches('/')
                    .to_string(),
                timeout: Duration::from_secs(parsed(&lookup, "GEMINI_TIMEOUT_SECS", 120u64)?),
                generation: GenerationSettings {
                    temperature: parsed(&lookup, "GEMINI_TEMPERATURE", defaults.temperature)?,
                    top_p: parsed(&lookup, "GEMINI_TOP_P", defaults.top_p)?,
                    top_k: parsed(&lookup, "GEMINI_TOP_K", defaults.top_k)?,
                    max_output_tokens: parsed(
                        &lookup,
                        "GEMINI_MAX_OUTPUT_TOKENS",
                        defaults.max_output_tokens,
                    )?,
                    response_mime_type: get_env(
                        &lookup,
                        "GEMINI_RESPONSE_MIME_TYPE",
                        &defaults.response_mime_type,
                    ),
                },
            },
            keep_alive: KeepAliveSettings {
                url: lookup("KEEP_ALIVE_URL").filter(|v| !v.trim().is_empty()),
                interval: Duration::from_secs(parsed(
                    &lookup,
                    "KEEP_ALIVE_INTERVAL_SECS",
                    DEFAULT_KEEP_ALIVE_INTERVAL_SECS,
                )?),
            },
            rate_limit: RateLimitSettings {
                per_minute: rate_cap(&lookup, "RATE_LIMIT_PER_MINUTE", rate_defaults.per_minute)?,
                per_hour: rate_cap(&lookup, "RATE_LIMIT_PER_HOUR", rate_defaults.per_hour)?,
                per_day: rate_cap(&lookup, "RATE_LIMIT_PER_DAY", rate_defaults.per_day)?,
                trust_forwarded_for: parsed(
                    &lookup,
                    "RATE_LIMIT_TRUST_FORWARDED",
                    rate_defaults.trust_forwarded_for,
                )?,
            },
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required but not set",
            key
        ))),
    }
}

fn get_env<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

/// A request cap must admit at least one request.
fn rate_cap<F>(lookup: &F, key: &str, default: u32) -> Result<u32, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match parsed(lookup, key, default)? {
        0 => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be at least 1",
            key
        ))),
        cap => Ok(cap),
    }
}
