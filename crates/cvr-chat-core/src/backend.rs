use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChatError, ResetError};

/// The two endpoints the chat client talks to.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `POST /chat`, returning the reply text.
    async fn chat(&self, message: &str) -> Result<String, ChatError>;

    /// `POST /reset`. The response body is never inspected.
    async fn reset(&self) -> Result<(), ResetError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    reply: String,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn chat(&self, message: &str) -> Result<String, ChatError> {
        let url = format!("{}/chat", self.base_url);
        debug!(%url, "sending chat message");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let reply: ChatReply = serde_json::from_slice(&body)?;
        Ok(reply.reply)
    }

    async fn reset(&self) -> Result<(), ResetError> {
        let url = format!("{}/reset", self.base_url);
        debug!(%url, "resetting conversation");

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            return Err(ResetError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
