use async_trait::async_trait;

use crate::runtime::messaging::{LoadingRequest, ReplyRequest};

pub const LINE_REPLY_ENDPOINT: &str = "https://api.line.me/v2/bot/message/reply";
pub const LINE_LOADING_ENDPOINT: &str = "https://api.line.me/v2/bot/chat/loading/start";

/// Outbound side of the chat channel fronting the generator.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn start_loading(&self, chat_id: &str) -> Result<(), String>;

    async fn reply(&self, request: &ReplyRequest) -> Result<(), String>;
}

pub struct LineMessagingClient {
    http: reqwest::Client,
    access_token: String,
}

impl LineMessagingClient {
    pub fn new(http: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
        }
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: &(impl serde::Serialize + Sync),
    ) -> Result<(), String> {
        let response = self
            .http
            .post(endpoint)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|error| format!("request to {endpoint} failed: {error}"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(format!("{endpoint} responded {status}: {detail}"))
    }
}

#[async_trait]
impl MessagingChannel for LineMessagingClient {
    async fn start_loading(&self, chat_id: &str) -> Result<(), String> {
        let body = LoadingRequest {
            chat_id: chat_id.to_string(),
        };
        self.post_json(LINE_LOADING_ENDPOINT, &body).await
    }

    async fn reply(&self, request: &ReplyRequest) -> Result<(), String> {
        self.post_json(LINE_REPLY_ENDPOINT, request).await
    }
}
