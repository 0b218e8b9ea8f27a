use std::time::Instant;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::adapters::messaging::MessagingChannel;
use crate::adapters::model_service::ImageModel;
use crate::adapters::object_store::ArtifactStore;
use crate::config::{GenerateConfig, LineChannelConfig};
use crate::edge::{
    error_response, route_event, success_response, validation_error_response,
    ApiGatewayResponse, EdgeRoute,
};
use crate::error::GenerateError;
use crate::handlers::generate::{invoke_model, store_artifact, StoredArtifact};
use crate::runtime::contract::{normalize_request, GenerationRequest, ValidationError};
use crate::runtime::messaging::{ReplyMessage, ReplyRequest, WebhookPayload};
use crate::runtime::signature::verify_signature;

const COMPONENT: &str = "line_webhook_handler";
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Handles one chat webhook delivery: verify, generate from the first text
/// message, store, and reply with the image URL.
pub async fn handle_line_webhook_event(
    event: Value,
    config: &GenerateConfig,
    channel: &LineChannelConfig,
    model: &dyn ImageModel,
    store: &dyn ArtifactStore,
    messenger: &dyn MessagingChannel,
) -> ApiGatewayResponse {
    let request = match route_event(event) {
        EdgeRoute::Dispatch(request) => request,
        EdgeRoute::Respond(response) => return response,
    };

    let signature_valid = request
        .header(SIGNATURE_HEADER)
        .is_some_and(|signature| {
            verify_signature(&channel.channel_secret, &request.body, signature)
        });
    if !signature_valid {
        warn!(component = COMPONENT, event = "signature_rejected");
        return error_response(
            401,
            "invalid_signature",
            "Webhook signature verification failed",
        );
    }
    info!(component = COMPONENT, event = "signature_verified");

    let payload: WebhookPayload = match serde_json::from_str(&request.body) {
        Ok(value) => value,
        Err(error) => {
            return validation_error_response(&format!("Malformed webhook payload: {error}"));
        }
    };

    let Some(first_event) = payload.events.first() else {
        return success_response(200, json!({"status": "no_events"}));
    };

    if let Some(user_id) = first_event.user_id() {
        if let Err(error) = messenger.start_loading(user_id).await {
            warn!(
                component = COMPONENT,
                event = "loading_indicator_failed",
                error = %error
            );
        }
    }

    let text = first_event.text();
    let started_at = Instant::now();
    info!(
        component = COMPONENT,
        event = "request_started",
        prompt_chars = text.map_or(0, |text| text.chars().count())
    );
    let outcome = generate_from_text(text, config, model, store).await;
    let reply_token = first_event.reply_token.as_deref();

    match outcome {
        Ok(stored) => {
            info!(
                component = COMPONENT,
                event = "request_completed",
                duration_ms = started_at.elapsed().as_millis() as u64,
                object_key = stored.object_key.as_str()
            );
            if let Some(reply_token) = reply_token {
                send_reply(
                    messenger,
                    reply_token,
                    ReplyMessage::image(&stored.presigned_url),
                )
                .await;
            }
            success_response(
                200,
                json!({
                    "presigned_url": stored.presigned_url,
                    "object_key": stored.object_key,
                }),
            )
        }
        Err(failure) => {
            error!(
                component = COMPONENT,
                event = "request_failed",
                duration_ms = started_at.elapsed().as_millis() as u64,
                error_code = failure.error_code(),
                error = %failure
            );
            if let Some(reply_token) = reply_token {
                send_reply(messenger, reply_token, ReplyMessage::apology()).await;
            }
            failure.to_response()
        }
    }
}

async fn generate_from_text(
    text: Option<&str>,
    config: &GenerateConfig,
    model: &dyn ImageModel,
    store: &dyn ArtifactStore,
) -> Result<StoredArtifact, GenerateError> {
    let text =
        text.ok_or_else(|| ValidationError::new("first event must be a text message"))?;
    let request = normalize_request(GenerationRequest::from_prompt(text))?;
    let image = invoke_model(&request, config, model).await?;
    store_artifact(image, &request.prompt, config, store).await
}

/// Reply failures are logged only: the reply token is single-use, so there
/// is nothing left to retry with.
async fn send_reply(messenger: &dyn MessagingChannel, reply_token: &str, message: ReplyMessage) {
    let request = ReplyRequest {
        reply_token: reply_token.to_string(),
        messages: vec![message],
    };
    if let Err(error) = messenger.reply(&request).await {
        error!(
            component = COMPONENT,
            event = "reply_failed",
            error = %error
        );
    }
}
