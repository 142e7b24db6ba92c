use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::{non_blank, AnswerReply, AnswerRequest, AnswerService, RemoteError};

/// Client for a `{query, type, language}` -> `{response}` endpoint.
#[derive(Debug, Clone)]
pub struct ChatEndpointClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl ChatEndpointClient {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            api_key: None,
        }
    }

    /// Sends `key` as `x-api-key` on every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn parse(client: Client, endpoint: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(client, Url::parse(endpoint)?))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl AnswerService for ChatEndpointClient {
    async fn ask(&self, request: &AnswerRequest) -> Result<String, RemoteError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.as_str());
        }
        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "chat endpoint replied");

        let reply = serde_json::from_str::<AnswerReply>(&body);
        if !status.is_success() {
            return Err(match reply {
                Ok(AnswerReply {
                    error: Some(message),
                    ..
                }) => RemoteError::Service(message),
                _ => RemoteError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        match reply.map_err(|err| RemoteError::Malformed(err.to_string()))? {
            AnswerReply {
                response: Some(text),
                ..
            } => non_blank(&text),
            AnswerReply {
                error: Some(message),
                ..
            } => Err(RemoteError::Service(message)),
            AnswerReply { .. } => Err(RemoteError::Malformed(
                "missing `response` field".to_string(),
            )),
        }
    }
}
