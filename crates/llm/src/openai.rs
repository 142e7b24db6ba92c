use reqwest::Client;
use serde_json::Value;
use tracing::{info, instrument};
use url::Url;

use crate::prompt::{shape_query, system_prompt};
use crate::{non_blank, AnswerRequest, AnswerService, RemoteError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Answers conversational requests through the OpenAI Responses API.
#[derive(Debug, Clone)]
pub struct OpenAiResponder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiResponder {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(base_url)?;
        self.base_url = url.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(kind = request.kind.as_str(), language = %request.language))]
    pub async fn respond(&self, request: &AnswerRequest) -> Result<String, RemoteError> {
        let query = shape_query(&request.query);
        if query.is_empty() {
            return Err(RemoteError::EmptyAnswer);
        }

        let payload = serde_json::json!({
            "model": self.model,
            "input": [
                {
                    "role": "system",
                    "content": [
                        { "type": "input_text", "text": system_prompt(request.kind, &request.language) }
                    ]
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": query }
                    ]
                }
            ]
        });

        let response = self
            .client
            .post(self.responses_url())
            .bearer_auth(self.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| RemoteError::Malformed(err.to_string()))?;
        let text = extract_output_text(&body)
            .ok_or_else(|| RemoteError::Malformed("output text missing".to_string()))?;

        info!(model = %self.model, chars = text.len(), "llm answered");
        non_blank(&text)
    }
}

impl AnswerService for OpenAiResponder {
    async fn ask(&self, request: &AnswerRequest) -> Result<String, RemoteError> {
        self.respond(request).await
    }
}

/// Pulls the answer text out of a Responses API payload. Prefers the
/// aggregated `output_text` and otherwise joins every `output_text` part.
pub fn extract_output_text(payload: &Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(Value::as_str) {
        return Some(value.to_string());
    }

    let chunks = payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}
