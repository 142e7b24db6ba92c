mod endpoint;
mod openai;
pub mod prompt;

use std::future::Future;
use std::time::Duration;

use kisan_core::{Language, QueryKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use endpoint::ChatEndpointClient;
pub use openai::{extract_output_text, OpenAiResponder};

/// Body of a conversational request, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub query: String,
    #[serde(rename = "type", default)]
    pub kind: QueryKind,
    /// Human-readable language name, e.g. "Hindi".
    #[serde(default = "default_language_name")]
    pub language: String,
}

fn default_language_name() -> String {
    Language::En.display_name().to_string()
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>, kind: QueryKind, language: Language) -> Self {
        Self {
            query: query.into(),
            kind,
            language: language.display_name().to_string(),
        }
    }
}

/// Success or error shape returned by the conversational endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnswerReply {
    pub fn response(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            response: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("no remote conversational service is configured")]
    Unavailable,
    #[error("request to remote service failed")]
    Transport(#[from] reqwest::Error),
    #[error("remote service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("remote service reported an error: {0}")]
    Service(String),
    #[error("remote service returned a malformed payload: {0}")]
    Malformed(String),
    #[error("remote service returned an empty answer")]
    EmptyAnswer,
}

/// A remote source of natural-language answers.
pub trait AnswerService: Send + Sync {
    fn ask(
        &self,
        request: &AnswerRequest,
    ) -> impl Future<Output = Result<String, RemoteError>> + Send;
}

/// The configured remote backend.
#[derive(Debug, Clone)]
pub enum RemoteBackend {
    /// Posts to a `{query, type, language}` endpoint such as `/api/chat`.
    Endpoint(ChatEndpointClient),
    /// Calls the LLM directly.
    OpenAi(OpenAiResponder),
    /// Every call fails, so answers come from the local fallback table.
    Offline,
}

impl RemoteBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Endpoint(_) => "endpoint",
            Self::OpenAi(_) => "openai",
            Self::Offline => "offline",
        }
    }
}

impl AnswerService for RemoteBackend {
    async fn ask(&self, request: &AnswerRequest) -> Result<String, RemoteError> {
        match self {
            Self::Endpoint(client) => client.ask(request).await,
            Self::OpenAi(responder) => responder.respond(request).await,
            Self::Offline => Err(RemoteError::Unavailable),
        }
    }
}

/// Shared HTTP client with the connect and request timeouts used for every
/// outbound call.
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(20))
        .build()
}

/// Trims `text` and rejects it when nothing is left.
pub(crate) fn non_blank(text: &str) -> Result<String, RemoteError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(RemoteError::EmptyAnswer)
    } else {
        Ok(trimmed.to_string())
    }
}
