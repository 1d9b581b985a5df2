//! OpenAI API Provider
//!
//! Completion provider using OpenAI's Chat Completions API.
//! One request per call; no retries here (retry policy belongs to callers).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{Completion, CompletionProvider, CompletionRequest};
use crate::ai::credential::Credential;
use crate::constants::openai as openai_constants;
use crate::types::{GateError, Result};

/// OpenAI API Provider
///
/// Holds no credential: the key is supplied per request.
#[derive(Debug)]
pub struct OpenAiProvider {
    api_base: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(openai_constants::CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn build_request(request: &CompletionRequest) -> ChatCompletionRequest<'_> {
        ChatCompletionRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_completion_tokens: request.max_completion_tokens,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<Completion> {
        debug!(
            model = %request.model,
            max_completion_tokens = request.max_completion_tokens,
            "Sending request to OpenAI API"
        );

        let start_time = Instant::now();
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", credential.bearer())
            .header("Content-Type", "application/json")
            .json(&Self::build_request(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GateError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatCompletionResponse = response.json().await?;
        debug!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Received response from OpenAI"
        );

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            text,
            model: body.model.unwrap_or_else(|| request.model.clone()),
            total_tokens: body.usage.and_then(|u| u.total_tokens),
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageInfo>,
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
struct UsageInfo {
    total_tokens: Option<u32>,
}
