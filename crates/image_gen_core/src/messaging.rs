use serde::{Deserialize, Serialize};

pub const APOLOGY_TEXT: &str = "ごめんなさい、画像を生成できませんでした。";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    pub fn user_id(&self) -> Option<&str> {
        self.source.as_ref()?.user_id.as_deref()
    }

    /// Text of a text message event, if it carries a non-blank one.
    pub fn text(&self) -> Option<&str> {
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        message
            .text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyMessage {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "originalContentUrl")]
        original_content_url: String,
        #[serde(rename = "previewImageUrl")]
        preview_image_url: String,
    },
}

impl ReplyMessage {
    pub fn image(url: &str) -> Self {
        Self::Image {
            original_content_url: url.to_string(),
            preview_image_url: url.to_string(),
        }
    }

    pub fn apology() -> Self {
        Self::Text {
            text: APOLOGY_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub reply_token: String,
    pub messages: Vec<ReplyMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadingRequest {
    pub chat_id: String,
}
