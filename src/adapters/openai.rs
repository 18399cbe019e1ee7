//! Chat-completions classifier (OpenAI or any API-compatible engine).

use crate::domain::policy::FRAMES_INSTRUCTION;
use crate::error::ModerationError;
use crate::ports::classifier::{Classification, ClassificationEngine};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
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
    total_tokens: u64,
}

/// Classifier backed by a `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClassifier {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClassifier {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

fn jpeg_data_url(bytes: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Instruction text followed by every frame, inline, in order.
async fn frames_content(frames: &[PathBuf]) -> Result<Vec<ContentPart>, ModerationError> {
    let mut content = Vec::with_capacity(frames.len() + 1);
    content.push(ContentPart::Text {
        text: FRAMES_INSTRUCTION.to_string(),
    });
    for frame in frames {
        let bytes = tokio::fs::read(frame).await?;
        content.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: jpeg_data_url(&bytes),
            },
        });
    }
    Ok(content)
}

fn into_classification(response: ChatResponse) -> Result<Classification, ModerationError> {
    let raw_text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ModerationError::Classification("response contained no message".into()))?;

    Ok(Classification {
        raw_text,
        total_tokens: response.usage.map(|u| u.total_tokens).unwrap_or(0),
    })
}

#[async_trait]
impl ClassificationEngine for OpenAiClassifier {
    async fn classify(
        &self,
        frames: &[PathBuf],
        policy_prompt: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<Classification, ModerationError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage::System {
                    content: policy_prompt,
                },
                ChatMessage::User {
                    content: frames_content(frames).await?,
                },
            ],
            max_tokens: max_output_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModerationError::Classification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError::Classification(format!("{}: {}", status, body)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModerationError::Classification(e.to_string()))?;
        into_classification(body)
    }
}
