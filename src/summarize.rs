use async_trait::async_trait;
use eyre::{Result, bail};
use log::debug;

use crate::Error;

const PROMPT_PREFIX: &str = "Summarize this transcript: ";

/// Anything that can turn transcript text into a summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript_text: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("gemini") {
            Provider::Gemini
        } else if model.starts_with("claude") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

pub fn build_prompt(transcript_text: &str) -> String {
    format!("{PROMPT_PREFIX}{transcript_text}")
}

/// Hosted LLM client, built once at startup and shared across requests
pub struct LlmSummarizer {
    client: reqwest::Client,
    provider: Provider,
    model: String,
    api_key: String,
}

impl LlmSummarizer {
    /// Missing or blank keys are a configuration error.
    pub fn new(client: reqwest::Client, model: &str, api_key: Option<String>) -> std::result::Result<Self, Error> {
        let provider = Provider::for_model(model);
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::ConfigMissing(provider.api_key_var().to_string()))?;
        Ok(Self {
            client,
            provider,
            model: model.to_string(),
            api_key,
        })
    }

    /// Read the provider's key from the environment
    pub fn from_env(client: reqwest::Client, model: &str) -> std::result::Result<Self, Error> {
        let var = Provider::for_model(model).api_key_var();
        Self::new(client, model, std::env::var(var).ok())
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, transcript_text: &str) -> Result<String> {
        let prompt = build_prompt(transcript_text);
        debug!(
            "Summarizing {} chars via {:?} with model {}",
            transcript_text.len(),
            self.provider,
            self.model
        );
        match self.provider {
            Provider::Gemini => summarize_gemini(&self.client, &self.api_key, &self.model, &prompt).await,
            Provider::Anthropic => summarize_anthropic(&self.client, &self.api_key, &self.model, &prompt).await,
            Provider::OpenAi => summarize_openai(&self.client, &self.api_key, &self.model, &prompt).await,
        }
    }
}

/// Send a provider request and return the JSON body, or the error body on a non-2xx status
async fn send_json(request: reqwest::RequestBuilder, provider: &str) -> Result<serde_json::Value> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{provider} API returned {status}: {body}");
    }
    Ok(resp.json().await?)
}

async fn summarize_gemini(client: &reqwest::Client, api_key: &str, model: &str, prompt: &str) -> Result<String> {
    let url = format!("https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent");
    let body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }]
    });

    let request = client.post(&url).header("x-goog-api-key", api_key).json(&body);
    extract_gemini_text(&send_json(request, "Gemini").await?)
}

/// Joined text parts of the first candidate
fn extract_gemini_text(json: &serde_json::Value) -> Result<String> {
    let text = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text")?.as_str())
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.is_empty() {
        bail!("unexpected Gemini API response format");
    }
    Ok(text)
}

async fn summarize_anthropic(client: &reqwest::Client, api_key: &str, model: &str, prompt: &str) -> Result<String> {
    let body = serde_json::json!({
        "model": model,
        "max_tokens": 1024,
        "messages": [{ "role": "user", "content": prompt }]
    });

    let request = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body);
    extract_anthropic_text(&send_json(request, "Anthropic").await?)
}

/// Text blocks of the message; tool and thinking blocks are ignored
fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    let text = json
        .get("content")
        .and_then(|c| c.as_array())
        .into_iter()
        .flatten()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text")?.as_str())
        .collect::<String>();
    if text.is_empty() {
        bail!("unexpected Anthropic API response format");
    }
    Ok(text)
}

async fn summarize_openai(client: &reqwest::Client, api_key: &str, model: &str, prompt: &str) -> Result<String> {
    let body = serde_json::json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }]
    });

    let request = client
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(api_key)
        .json(&body);
    extract_openai_text(&send_json(request, "OpenAI").await?)
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    match json.pointer("/choices/0/message/content").and_then(|t| t.as_str()) {
        Some(text) => Ok(text.to_string()),
        None => bail!("unexpected OpenAI API response format"),
    }
}
