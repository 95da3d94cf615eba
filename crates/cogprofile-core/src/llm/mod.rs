mod anthropic;
mod chat_completions;
mod settings;

use std::{fmt, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::prompts::Prompt;

pub use anthropic::AnthropicClient;
pub use chat_completions::ChatCompletionsClient;
pub use settings::{LlmOverrides, LlmSettings};

pub(crate) const USER_AGENT: &str = "cogprofile/0.3";
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Hosted model vendors the adapter layer can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Perplexity,
    DeepSeek,
    Noop,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Perplexity,
        ProviderKind::DeepSeek,
        ProviderKind::Noop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Perplexity => "perplexity",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Noop => "noop",
        }
    }

    /// Environment variable holding this vendor's API key.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Perplexity => Some("PERPLEXITY_API_KEY"),
            ProviderKind::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ProviderKind::Noop => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown LLM provider `{0}` (expected openai, anthropic, perplexity, deepseek or noop)")]
pub struct ProviderParseError(pub String);

impl FromStr for ProviderKind {
    type Err = ProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "perplexity" => Ok(ProviderKind::Perplexity),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "noop" => Ok(ProviderKind::Noop),
            _ => Err(ProviderParseError(s.to_string())),
        }
    }
}

/// Client abstraction over a vendor's chat endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Vendor this client talks to.
    fn provider(&self) -> ProviderKind;

    /// Send the prompt and return the text of the first completion.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Offline client used when no provider is configured.
#[derive(Debug, Default, Clone)]
pub struct NoopLlmClient;

pub const NOOP_RESPONSE: &str =
    "LLM provider not configured; no assessment was produced for this text.";

#[async_trait]
impl LlmClient for NoopLlmClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Noop
    }

    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        Ok(NOOP_RESPONSE.to_string())
    }
}

/// Construct the client matching `settings.provider`.
pub fn build_client(settings: &LlmSettings) -> Result<Box<dyn LlmClient>> {
    Ok(match settings.provider {
        ProviderKind::Noop => Box::new(NoopLlmClient),
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(settings)?),
        ProviderKind::OpenAi | ProviderKind::Perplexity | ProviderKind::DeepSeek => {
            Box::new(ChatCompletionsClient::new(settings)?)
        }
    })
}

/// Send a request, retrying transport failures and non-success statuses with
/// exponential backoff. `build` is invoked once per attempt.
pub(crate) async fn send_with_retry<F>(
    vendor: &str,
    max_retries: u32,
    build: F,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0u32;
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                if attempt >= max_retries {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    bail!("{vendor} API error ({status}): {body}");
                }
                debug!(vendor, attempt, status = %response.status(), "retrying after error status");
            }
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err).with_context(|| format!("failed to call {vendor} API"));
                }
                debug!(vendor, attempt, error = %err, "retrying after transport error");
            }
        }
        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
        attempt += 1;
    }
}
