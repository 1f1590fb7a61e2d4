use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PROVIDER: &str = "anthropic";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173";
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} is not set; it is required for the {provider} provider")]
    MissingApiKey { provider: String, var: &'static str },

    #[error("{key} must be a positive number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("unknown provider {0:?} (expected one of: {list})", list = loom_suggest::engine::PROVIDERS.join(", "))]
    UnknownProvider(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
}

/// Environment variable holding the key for `provider`. Ollama runs locally
/// and needs none.
pub fn api_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "google" => Some("GOOGLE_API_KEY"),
        "groq" => Some("GROQ_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        _ => None,
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&values)
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        fn value<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
            values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
        }

        fn number<T: std::str::FromStr + PartialOrd + Default>(
            values: &HashMap<String, String>,
            key: &'static str,
            default: T,
        ) -> Result<T, ConfigError> {
            match value(values, key) {
                None => Ok(default),
                Some(raw) => raw
                    .parse::<T>()
                    .ok()
                    .filter(|n| *n > T::default())
                    .ok_or_else(|| ConfigError::InvalidNumber {
                        key,
                        value: raw.to_string(),
                    }),
            }
        }

        let provider = value(values, "LOOM_PROVIDER")
            .unwrap_or(DEFAULT_PROVIDER)
            .to_ascii_lowercase();
        if !loom_suggest::engine::PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::UnknownProvider(provider));
        }

        let api_key = match api_key_var(&provider) {
            Some(var) => Some(
                value(values, var)
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::MissingApiKey {
                        provider: provider.clone(),
                        var,
                    })?,
            ),
            None => None,
        };

        let allowed_origins = value(values, "ALLOWED_ORIGINS")
            .unwrap_or(DEFAULT_ALLOWED_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            model: value(values, "LOOM_MODEL").unwrap_or(DEFAULT_MODEL).to_string(),
            api_key,
            max_tokens: number(values, "LOOM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            port: number(values, "PORT", DEFAULT_PORT)?,
            allowed_origins,
            rate_limit_window: Duration::from_secs(number(
                values,
                "LOOM_RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?),
            rate_limit_max: number(values, "LOOM_RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?,
            provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = ServerConfig::from_map(&map(&[("ANTHROPIC_API_KEY", "sk-test")])).unwrap();
        assert_eq!(
            config,
            ServerConfig {
                provider: "anthropic".to_string(),
                model: DEFAULT_MODEL.to_string(),
                api_key: Some("sk-test".to_string()),
                max_tokens: 4096,
                port: 3001,
                allowed_origins: vec!["http://localhost:5173".to_string()],
                rate_limit_window: Duration::from_secs(900),
                rate_limit_max: 100,
            }
        );
    }

    #[test]
    fn missing_key_is_an_error() {
        assert_eq!(
            ServerConfig::from_map(&map(&[("LOOM_PROVIDER", "openai"), ("ANTHROPIC_API_KEY", "sk-test")])),
            Err(ConfigError::MissingApiKey {
                provider: "openai".to_string(),
                var: "OPENAI_API_KEY"
            })
        );
        assert!(ServerConfig::from_map(&map(&[("ANTHROPIC_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = ServerConfig::from_map(&map(&[("LOOM_PROVIDER", "Ollama"), ("LOOM_MODEL", "llama3.2")])).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServerConfig::from_map(&map(&[
            ("GROQ_API_KEY", "gsk"),
            ("LOOM_PROVIDER", "groq"),
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
            ("LOOM_RATE_LIMIT_WINDOW_SECS", "60"),
            ("LOOM_RATE_LIMIT_MAX", "5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.rate_limit_max, 5);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            ServerConfig::from_map(&map(&[("ANTHROPIC_API_KEY", "k"), ("PORT", "http")])),
            Err(ConfigError::InvalidNumber {
                key: "PORT",
                value: "http".to_string()
            })
        );
        assert!(ServerConfig::from_map(&map(&[("ANTHROPIC_API_KEY", "k"), ("LOOM_RATE_LIMIT_MAX", "0")])).is_err());
        assert_eq!(
            ServerConfig::from_map(&map(&[("LOOM_PROVIDER", "bard")])),
            Err(ConfigError::UnknownProvider("bard".to_string()))
        );
    }
}
