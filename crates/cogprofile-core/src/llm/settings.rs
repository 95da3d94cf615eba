use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

use super::ProviderKind;

/// Optional values layered over the environment (config file, CLI flags).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LlmOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

impl LlmOverrides {
    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: LlmOverrides) -> Self {
        Self {
            provider: self.provider.or(fallback.provider),
            model: self.model.or(fallback.model),
            endpoint: self.endpoint.or(fallback.endpoint),
            timeout_secs: self.timeout_secs.or(fallback.timeout_secs),
            max_retries: self.max_retries.or(fallback.max_retries),
        }
    }
}

/// Environment-driven configuration required for LLM adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
}

impl LlmSettings {
    const PROVIDER_ENV: &'static str = "COGPROFILE_PROVIDER";
    const ENDPOINT_ENV: &'static str = "COGPROFILE_ENDPOINT";
    const MODEL_ENV: &'static str = "COGPROFILE_MODEL";
    const TIMEOUT_ENV: &'static str = "COGPROFILE_TIMEOUT_SECS";
    const RETRIES_ENV: &'static str = "COGPROFILE_MAX_RETRIES";

    /// Load settings from environment variables.
    ///
    /// * `COGPROFILE_PROVIDER`: Provider identifier (default: `openai`).
    /// * `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `PERPLEXITY_API_KEY`,
    ///   `DEEPSEEK_API_KEY`: key for the selected provider (required unless `noop`).
    /// * `COGPROFILE_ENDPOINT`: Optional custom base URL.
    pub fn from_env() -> Result<Self> {
        Self::resolve(&LlmOverrides::default())
    }

    /// Load settings from the environment, preferring any value set in `overrides`.
    pub fn resolve(overrides: &LlmOverrides) -> Result<Self> {
        Self::from_map(std::env::vars().collect(), overrides)
    }

    fn from_map(vars: HashMap<String, String>, overrides: &LlmOverrides) -> Result<Self> {
        let non_blank = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider: ProviderKind = overrides
            .provider
            .clone()
            .or_else(|| non_blank(Self::PROVIDER_ENV))
            .unwrap_or_else(|| "openai".to_string())
            .parse()?;

        let api_key = match provider.api_key_env() {
            None => String::new(),
            Some(var) => non_blank(var).with_context(|| {
                format!("environment variable {var} must be set to use the {provider} provider")
            })?,
        };

        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| non_blank(Self::ENDPOINT_ENV));
        let model = overrides
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| non_blank(Self::MODEL_ENV));
        let timeout_secs = overrides.timeout_secs.or_else(|| {
            vars.get(Self::TIMEOUT_ENV)
                .and_then(|v| v.trim().parse::<u64>().ok())
        });
        let max_retries = overrides
            .max_retries
            .or_else(|| {
                vars.get(Self::RETRIES_ENV)
                    .and_then(|v| v.trim().parse::<u32>().ok())
            })
            .unwrap_or(2);

        Ok(Self {
            provider,
            api_key,
            endpoint,
            model,
            timeout_secs,
            max_retries,
        })
    }

    /// Settings for the offline client; never touches the environment.
    pub fn noop() -> Self {
        Self {
            provider: ProviderKind::Noop,
            api_key: String::new(),
            endpoint: None,
            model: None,
            timeout_secs: None,
            max_retries: 0,
        }
    }
}
