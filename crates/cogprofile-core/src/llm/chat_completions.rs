use super::{send_with_retry, LlmClient, LlmSettings, ProviderKind, USER_AGENT};
use crate::prompts::Prompt;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Client for the OpenAI-compatible chat-completions API shared by OpenAI,
/// Perplexity and DeepSeek.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: Client,
    provider: ProviderKind,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

struct VendorDefaults {
    label: &'static str,
    base: &'static str,
    path: &'static str,
    model: &'static str,
}

fn vendor_defaults(provider: ProviderKind) -> Result<VendorDefaults> {
    Ok(match provider {
        ProviderKind::OpenAi => VendorDefaults {
            label: "OpenAI",
            base: "https://api.openai.com",
            path: "/v1/chat/completions",
            model: "gpt-4o-mini",
        },
        ProviderKind::Perplexity => VendorDefaults {
            label: "Perplexity",
            base: "https://api.perplexity.ai",
            path: "/chat/completions",
            model: "sonar",
        },
        ProviderKind::DeepSeek => VendorDefaults {
            label: "DeepSeek",
            base: "https://api.deepseek.com",
            path: "/chat/completions",
            model: "deepseek-chat",
        },
        other => bail!("provider `{other}` does not speak the chat-completions protocol"),
    })
}

impl ChatCompletionsClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let defaults = vendor_defaults(settings.provider)?;
        if settings.api_key.trim().is_empty() {
            bail!(
                "{} API key must be provided via {}",
                defaults.label,
                settings.provider.api_key_env().unwrap_or_default()
            );
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| defaults.base.to_string());
        let url = format!("{}{}", base.trim_end_matches('/'), defaults.path);
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(60)))
            .build()
            .with_context(|| format!("failed to build {} HTTP client", defaults.label))?;
        Ok(Self {
            http,
            provider: settings.provider,
            url,
            api_key: settings.api_key.clone(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| defaults.model.to_string()),
            max_retries: settings.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    #[instrument(name = "chat_completion", skip_all, fields(provider = %self.provider, model = %self.model, kind = ?prompt.kind))]
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let label = vendor_defaults(self.provider)?.label;
        let response = send_with_retry(label, self.max_retries, || {
            self.http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&payload)
        })
        .await?;

        let chat: ChatCompletionResponse = response
            .json()
            .await
            .with_context(|| format!("failed to parse {label} response"))?;
        chat.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("{label} response missing message content"))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
