//! Test helpers: recording fakes behind the adapter traits and event builders.
//!
//! These are shared by unit tests and the crate's integration tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use crate::adapters::messaging::MessagingChannel;
use crate::adapters::model_service::ImageModel;
use crate::adapters::object_store::ArtifactStore;
use crate::runtime::messaging::ReplyRequest;
use crate::runtime::signature::sign_body;

/// Smallest byte string recognised as a PNG artifact.
pub fn sample_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    bytes.extend_from_slice(b"\0\0\0\rIHDR-test-image");
    bytes
}

/// Model-service response body carrying `image` as its only result.
pub fn titan_response(image: &[u8]) -> Vec<u8> {
    json!({"images": [STANDARD.encode(image)], "error": null})
        .to_string()
        .into_bytes()
}

/// HTTP API (payload v2) event for a POST with `body`.
pub fn http_post_event(body: &str) -> Value {
    json!({
        "version": "2.0",
        "routeKey": "POST /",
        "rawPath": "/",
        "headers": {"content-type": "application/json"},
        "requestContext": {"http": {"method": "POST", "path": "/"}},
        "body": body,
        "isBase64Encoded": false,
    })
}

/// Webhook event for `body`, signed with `channel_secret`.
pub fn signed_webhook_event(channel_secret: &str, body: &str) -> Value {
    let mut event = http_post_event(body);
    let signature = sign_body(channel_secret, body).expect("HMAC accepts any key length");
    event["headers"]["x-line-signature"] = Value::String(signature);
    event
}

/// Chat webhook body with one text message event.
pub fn text_message_body(reply_token: &str, user_id: &str, text: &str) -> String {
    json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "replyToken": reply_token,
            "source": {"type": "user", "userId": user_id},
            "message": {"id": "1", "type": "text", "text": text}
        }]
    })
    .to_string()
}

pub struct RecordingModel {
    response: Result<Vec<u8>, String>,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl RecordingModel {
    pub fn responding(raw: Vec<u8>) -> Self {
        Self {
            response: Ok(raw),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::responding(titan_response(&sample_png()))
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.bodies.lock().expect("poisoned mutex").len()
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl ImageModel for RecordingModel {
    async fn invoke(&self, body: Vec<u8>) -> Result<Vec<u8>, String> {
        self.bodies.lock().expect("poisoned mutex").push(body);
        self.response.clone()
    }
}

/// Model that never answers within `delay`.
pub struct StallingModel {
    delay: Duration,
}

impl StallingModel {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ImageModel for StallingModel {
    async fn invoke(&self, _body: Vec<u8>) -> Result<Vec<u8>, String> {
        tokio::time::sleep(self.delay).await;
        Ok(titan_response(&sample_png()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

pub struct RecordingStore {
    objects: Mutex<Vec<StoredObject>>,
    fail_writes: bool,
    fail_presign: bool,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            fail_writes: false,
            fail_presign: false,
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    /// Accepts writes but cannot sign download URLs.
    pub fn failing_presign() -> Self {
        Self {
            fail_presign: true,
            ..Self::new()
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().expect("poisoned mutex").clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects().into_iter().map(|object| object.key).collect()
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("https://bedrock-bucket-test.s3.amazonaws.com/{key}?X-Amz-Signature=test")
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), String> {
        if self.fail_writes {
            return Err("failed to write object to s3: AccessDenied".to_string());
        }
        let mut objects = self.objects.lock().expect("poisoned mutex");
        if objects.iter().any(|object| object.key == key) {
            return Err(format!("object {key} already exists"));
        }
        objects.push(StoredObject {
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> Result<String, String> {
        if self.fail_presign {
            return Err("failed to presign s3 object: credentials expired".to_string());
        }
        if !self.keys().iter().any(|stored| stored == key) {
            return Err(format!("object {key} was never written"));
        }
        Ok(self.url_for(key))
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    loading: Mutex<Vec<String>>,
    replies: Mutex<Vec<ReplyRequest>>,
    fail_loading: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_loading() -> Self {
        Self {
            fail_loading: true,
            ..Self::default()
        }
    }

    pub fn loading_chats(&self) -> Vec<String> {
        self.loading.lock().expect("poisoned mutex").clone()
    }

    pub fn replies(&self) -> Vec<ReplyRequest> {
        self.replies.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl MessagingChannel for RecordingMessenger {
    async fn start_loading(&self, chat_id: &str) -> Result<(), String> {
        if self.fail_loading {
            return Err("loading endpoint responded 500".to_string());
        }
        self.loading
            .lock()
            .expect("poisoned mutex")
            .push(chat_id.to_string());
        Ok(())
    }

    async fn reply(&self, request: &ReplyRequest) -> Result<(), String> {
        self.replies
            .lock()
            .expect("poisoned mutex")
            .push(request.clone());
        Ok(())
    }
}
