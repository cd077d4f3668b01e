use std::time::Duration;

/// Discord truncates at 2000 characters; stay under it with headroom.
pub const MAX_CHUNK_CHARS: usize = 1900;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    chunk_pause: Duration,
}

impl WebhookClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            chunk_pause: Duration::from_secs(1),
        }
    }

    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    /// Posts a message, splitting it into sequential chunks when it exceeds
    /// the Discord content limit. Success is any 2xx response (the webhook
    /// endpoint returns 204).
    pub async fn post(&self, content: &str) -> Result<(), WebhookError> {
        let chunks = split_chunks(content, MAX_CHUNK_CHARS);
        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.chunk_pause).await;
            }
            let response = self
                .client
                .post(&self.url)
                .json(&serde_json::json!({ "content": chunk }))
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(WebhookError::HttpStatus(status.as_u16()));
            }
        }
        Ok(())
    }
}

/// Splits on character boundaries so multi-byte text never lands on a seam.
pub fn split_chunks(content: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
