/// LLM Client — the single point of entry for chat-completion calls.
///
/// Targets an OpenAI-compatible `/chat/completions` endpoint (Volcengine Ark).
/// The client is constructed explicitly from configuration and injected where
/// needed; there is no process-wide instance.
///
/// Each call is a single attempt. Failures are classified into the `BookError`
/// taxonomy so the caller's `RetryPolicy` decides what to retry.
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{classify_status, BookError};

pub mod prompts;

const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.9;
const MAX_TOKENS: u32 = 1200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Text of the first choice plus the full response, kept for auditing.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub raw: serde_json::Value,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, BookError> {
        let api_key = api_key.into();
        let model = model.into();
        if api_key.trim().is_empty() {
            return Err(BookError::Configuration("ARK_API_KEY must be set".to_string()));
        }
        if model.trim().is_empty() {
            return Err(BookError::Configuration(
                "ARK_MODEL must name the chat endpoint to use".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BookError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One chat-completion round trip with a system and a user message.
    pub async fn chat(&self, system: &str, user: &str) -> Result<ChatCompletion, BookError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let text = response.text().await?;
        parse_completion(&text)
    }
}

/// Splits a raw response body into the message text and the raw JSON.
fn parse_completion(body: &str) -> Result<ChatCompletion, BookError> {
    let raw: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| BookError::MalformedResponse(format!("chat response is not JSON: {e}")))?;
    let parsed: ChatResponse = serde_json::from_value(raw.clone())
        .map_err(|e| BookError::MalformedResponse(format!("unexpected chat response shape: {e}")))?;

    if let Some(usage) = &parsed.usage {
        debug!(
            "Chat call succeeded: prompt_tokens={}, completion_tokens={}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| BookError::upstream("chat response contained no content"))?;

    Ok(ChatCompletion { content, raw })
}
