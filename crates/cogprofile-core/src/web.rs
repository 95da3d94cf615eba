//! Web lookups that feed text into the profiling pipeline: fetching a page as
//! plain text and Google Custom Search with concurrent content prefetch.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use html2text::render::text_renderer::TrivialDecorator;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::llm::USER_AGENT;
use crate::prompts::truncate;

pub const DEFAULT_MAX_PAGE_CHARS: usize = 20_000;
/// Bodies are read up to this many bytes; the rest is never downloaded.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const GOOGLE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

// Width handed to the renderer; wide enough that paragraphs are never wrapped.
const RENDER_WIDTH: usize = 10_000;

static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static NON_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(head|script|style|noscript)\b.*?</(head|script|style|noscript)\s*>").unwrap());

/// Plain-text rendition of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

/// A search result paired with its fetched content or the fetch error.
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchedResult {
    pub result: SearchResult,
    pub page: Option<FetchedPage>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebClient {
    http: Client,
    max_chars: usize,
    max_body_bytes: usize,
}

impl WebClient {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build web HTTP client")?;
        Ok(Self {
            http,
            max_chars,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes.max(1);
        self
    }

    /// Download `url` and reduce it to readable text.
    #[instrument(name = "fetch_url", skip(self))]
    pub async fn fetch_url_content(&self, url: &str) -> Result<FetchedPage> {
        let parsed = parse_web_url(url)?;
        let mut response = self
            .http
            .get(parsed.clone())
            .send()
            .await
            .with_context(|| format!("failed to fetch {parsed}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("fetching {parsed} returned {status}");
        }
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |ct| ct.contains("html"));
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("failed to read body of {parsed}"))?
        {
            let room = self.max_body_bytes - bytes.len();
            if chunk.len() >= room {
                bytes.extend_from_slice(&chunk[..room]);
                debug!(max_bytes = self.max_body_bytes, "body cap reached");
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = decode_body(&bytes);

        let (title, text) = if is_html {
            html_to_text(&body)
        } else {
            (None, body.trim().to_string())
        };
        debug!(chars = text.chars().count(), "fetched page");
        Ok(FetchedPage {
            url: parsed.to_string(),
            title,
            text: truncate(&text, self.max_chars),
        })
    }

    /// Fetch every result's page concurrently. Output order matches `results`.
    pub async fn prefetch_contents(&self, results: Vec<SearchResult>) -> Vec<PrefetchedResult> {
        let fetches = results.iter().map(|r| self.fetch_url_content(&r.url));
        let pages = join_all(fetches).await;
        results
            .into_iter()
            .zip(pages)
            .map(|(result, page)| match page {
                Ok(page) => PrefetchedResult {
                    result,
                    page: Some(page),
                    error: None,
                },
                Err(err) => {
                    warn!(url = %result.url, error = %format!("{err:#}"), "prefetch failed");
                    PrefetchedResult {
                        result,
                        page: None,
                        error: Some(format!("{err:#}")),
                    }
                }
            })
            .collect()
    }
}

fn parse_web_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).with_context(|| format!("invalid URL `{url}`"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => bail!("unsupported URL scheme `{other}` (expected http or https)"),
    }
}

/// Strip markup, returning the page title (if any) and the visible text.
pub fn html_to_text(html: &str) -> (Option<String>, String) {
    let title = TITLE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| render(m.as_str()).join(" "))
        .filter(|t| !t.is_empty());
    let body = NON_CONTENT.replace_all(html, " ");
    (title, render(&body).join("\n"))
}

/// Render HTML through `html2text` without decoration, one trimmed line per entry.
fn render(html: &str) -> Vec<String> {
    let decorator = TrivialDecorator::new();
    html2text::from_read_with_decorator(html.as_bytes(), RENDER_WIDTH, decorator)
        .replace('\u{a0}', " ")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Decode a possibly truncated body, dropping a trailing partial character.
fn decode_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) if err.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..err.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Google Custom Search JSON API client.
#[derive(Debug, Clone)]
pub struct GoogleSearchClient {
    http: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchClient {
    const API_KEY_ENV: &'static str = "GOOGLE_API_KEY";
    const ENGINE_ENV: &'static str = "GOOGLE_SEARCH_ENGINE_ID";

    pub fn from_env() -> Result<Self> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("environment variable {var} must be set to search"))
        };
        Self::new(read(Self::API_KEY_ENV)?, read(Self::ENGINE_ENV)?, None)
    }

    pub fn new(api_key: String, engine_id: String, endpoint: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build search HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.unwrap_or_else(|| GOOGLE_ENDPOINT.to_string()),
            api_key,
            engine_id,
        })
    }

    /// Run a query, returning at most `num` (clamped to 1..=10) results.
    #[instrument(name = "google_search", skip(self))]
    pub async fn search(&self, query: &str, num: u8) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            bail!("search query is empty");
        }
        let num = num.clamp(1, 10).to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query.trim()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .context("failed to call Google Custom Search API")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Google Custom Search API error ({status}): {body}");
        }
        let payload: GoogleResponse = response
            .json()
            .await
            .context("failed to parse Google Custom Search response")?;
        Ok(payload
            .items
            .into_iter()
            .map(|item| SearchResult {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Deserialize)]
struct GoogleItem {
    title: String,
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}
