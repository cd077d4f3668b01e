use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
/// Show notes are truncated before prompting; long feeds repeat sponsor
/// boilerplate far past this point.
pub const MAX_NOTES_CHARS: usize = 3000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm api key is empty")]
    MissingApiKey,
    #[error("llm model is empty")]
    MissingModel,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("response contained no text content")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Builds a config from the environment, or None when no API key is set.
pub fn config_from_env() -> Option<LlmConfig> {
    let api_key = std::env::var("CLAUDE_API_KEY").unwrap_or_default();
    if api_key.trim().is_empty() {
        return None;
    }
    let base_url = env_or("FEEDPOST_LLM_BASE_URL", DEFAULT_BASE_URL);
    let model = env_or("FEEDPOST_LLM_MODEL", DEFAULT_MODEL);
    Some(LlmConfig {
        base_url,
        api_key,
        model,
        max_tokens: 1024,
        timeout_secs: 30,
    })
}

pub fn validate_config(config: &LlmConfig) -> Result<(), LlmError> {
    if config.api_key.trim().is_empty() {
        return Err(LlmError::MissingApiKey);
    }
    if config.model.trim().is_empty() {
        return Err(LlmError::MissingModel);
    }
    Ok(())
}

/// Converts HTML show notes to plain text and truncates them for the prompt.
pub fn clean_show_notes(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 80);
    text.trim().chars().take(MAX_NOTES_CHARS).collect()
}

pub fn build_summary_prompt(show: &str, title: &str, notes: &str) -> String {
    format!(
        "Analyze this podcast episode and provide a detailed summary in bullet points.\n\n\
         Podcast: {show}\n\
         Title: {title}\n\n\
         Description/Show Notes:\n{notes}\n\n\
         Please provide:\n\
         1. 📌 Main topic (1-2 sentences)\n\
         2. 🔑 Key points (4-6 detailed bullet points)\n\
         3. 💡 Key insights/takeaways (2-3 bullet points)\n\n\
         Format everything with bullet points, be specific and detailed. Write in Korean."
    )
}

pub async fn call_messages(
    config: &LlmConfig,
    client: &reqwest::Client,
    prompt: &str,
) -> Result<String, LlmError> {
    validate_config(config)?;

    let request = MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
    };
    let endpoint = format!("{}/v1/messages", config.base_url.trim_end_matches('/'));
    let response = client
        .post(endpoint)
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .timeout(Duration::from_secs(config.timeout_secs))
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::HttpStatus {
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        });
    }

    let parsed: MessagesResponse = response.json().await?;
    parsed
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)
}

pub async fn summarize_episode(
    config: &LlmConfig,
    client: &reqwest::Client,
    show: &str,
    title: &str,
    notes_html: &str,
) -> Result<String, LlmError> {
    let notes = clean_show_notes(notes_html);
    let prompt = build_summary_prompt(show, title, &notes);
    call_messages(config, client, &prompt).await
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
