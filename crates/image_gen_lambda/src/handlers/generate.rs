use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::model_service::ImageModel;
use crate::adapters::object_store::ArtifactStore;
use crate::config::GenerateConfig;
use crate::edge::{route_event, success_response, ApiGatewayResponse, EdgeRoute};
use crate::error::GenerateError;
use crate::runtime::artifact::ImageFormat;
use crate::runtime::contract::{
    decode_first_image, normalize_request, GenerationRequest, GenerationResponse,
    TitanImageRequest, ValidatedRequest, ValidationError, MAX_SEED,
};
use crate::runtime::storage_keys::artifact_object_key;

const COMPONENT: &str = "generate_handler";
const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub seed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub object_key: String,
    pub presigned_url: String,
    pub content_type: &'static str,
}

/// Handles one POST to the generation endpoint.
///
/// `store` is `None` when no bucket is configured; requests that ask for
/// storage then fail before the model is called.
pub async fn handle_generate_event(
    event: Value,
    config: &GenerateConfig,
    model: &dyn ImageModel,
    store: Option<&dyn ArtifactStore>,
) -> ApiGatewayResponse {
    let request = match route_event(event) {
        EdgeRoute::Dispatch(request) => request,
        EdgeRoute::Respond(response) => return response,
    };

    let generation = match parse_generation_request(&request.body) {
        Ok(value) => value,
        Err(rejection) => {
            warn!(
                component = COMPONENT,
                event = "request_rejected",
                error = %rejection
            );
            return GenerateError::from(rejection).to_response();
        }
    };

    let started_at = Instant::now();
    info!(
        component = COMPONENT,
        event = "request_started",
        prompt_chars = generation.prompt.chars().count(),
        store = generation.store
    );

    match generate_artifact(&generation, config, model, store).await {
        Ok(response) => {
            info!(
                component = COMPONENT,
                event = "request_completed",
                duration_ms = started_at.elapsed().as_millis() as u64,
                object_key = response.object_key().unwrap_or_default()
            );
            success_response(200, response)
        }
        Err(failure) => {
            error!(
                component = COMPONENT,
                event = "request_failed",
                duration_ms = started_at.elapsed().as_millis() as u64,
                error_code = failure.error_code(),
                error = %failure
            );
            failure.to_response()
        }
    }
}

pub fn parse_generation_request(body: &str) -> Result<ValidatedRequest, ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::new("Request body is required"));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|error| ValidationError::new(format!("Malformed JSON body: {error}")))?;
    if !value.is_object() {
        return Err(ValidationError::new("Request body must be a JSON object"));
    }

    let payload: GenerationRequest = serde_json::from_value(value)
        .map_err(|error| ValidationError::new(format!("Malformed request: {error}")))?;
    normalize_request(payload)
}

/// Runs the full pipeline for a validated request: one model call, then at
/// most one object write.
pub async fn generate_artifact(
    request: &ValidatedRequest,
    config: &GenerateConfig,
    model: &dyn ImageModel,
    store: Option<&dyn ArtifactStore>,
) -> Result<GenerationResponse, GenerateError> {
    let store = if request.store {
        Some(store.ok_or_else(|| {
            GenerateError::Misconfiguration(
                "S3_BUCKET_NAME must be configured to store generated images".to_string(),
            )
        })?)
    } else {
        None
    };

    let image = invoke_model(request, config, model).await?;

    let Some(store) = store else {
        return Ok(GenerationResponse::inline(
            &image.bytes,
            image.format.content_type(),
            image.seed,
        ));
    };

    let seed = image.seed;
    let stored = store_artifact(image, &request.prompt, config, store).await?;
    Ok(GenerationResponse::Stored {
        object_key: stored.object_key,
        presigned_url: stored.presigned_url,
        expires_in_seconds: config.presigned_url_expiry.as_secs(),
        content_type: stored.content_type.to_string(),
        seed,
    })
}

/// Calls the model once, bounded by the configured ceiling. A timeout drops
/// the pending call; nothing is retried.
pub async fn invoke_model(
    request: &ValidatedRequest,
    config: &GenerateConfig,
    model: &dyn ImageModel,
) -> Result<GeneratedImage, GenerateError> {
    let seed = request.seed.unwrap_or_else(random_seed);
    let body = serde_json::to_vec(&TitanImageRequest::text_to_image(request, seed)).map_err(
        |error| GenerateError::ModelInvocation(format!("failed to encode model request: {error}")),
    )?;

    let raw = match tokio::time::timeout(config.model_timeout, model.invoke(body)).await {
        Ok(result) => result.map_err(GenerateError::ModelInvocation)?,
        Err(_) => return Err(GenerateError::ModelTimeout(config.model_timeout.as_secs())),
    };

    let bytes = decode_first_image(&raw)?;
    Ok(GeneratedImage {
        format: ImageFormat::detect(&bytes),
        bytes,
        seed,
    })
}

/// Writes the image under a fresh key and presigns a download URL for it.
pub async fn store_artifact(
    image: GeneratedImage,
    prompt: &str,
    config: &GenerateConfig,
    store: &dyn ArtifactStore,
) -> Result<StoredArtifact, GenerateError> {
    let object_key = artifact_object_key(
        &config.key_prefix,
        &Utc::now().format(KEY_TIMESTAMP_FORMAT).to_string(),
        &Uuid::new_v4().simple().to_string(),
        prompt,
        image.format,
    );
    let content_type = image.format.content_type();

    store
        .put_object(&object_key, image.bytes, content_type)
        .await
        .map_err(GenerateError::Storage)?;

    let presigned_url = store
        .presign_get(&object_key, config.presigned_url_expiry)
        .await
        .map_err(GenerateError::Presign)?;

    Ok(StoredArtifact {
        object_key,
        presigned_url,
        content_type,
    })
}

fn random_seed() -> u32 {
    rand::thread_rng().gen_range(0..=MAX_SEED)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::test_helpers::{
        http_post_event, sample_png, RecordingModel, RecordingStore, StallingModel,
    };

    fn stored_config() -> GenerateConfig {
        GenerateConfig {
            bucket: Some("bedrock-bucket-test".to_string()),
            ..GenerateConfig::default()
        }
    }

    #[tokio::test]
    async fn rejects_missing_prompt_without_calling_model() {
        let model = RecordingModel::succeeding();
        let store = RecordingStore::new();

        for body in [r#"{}"#, r#"{"prompt": "  "}"#, "not json", "", r#"["a red fox"]"#] {
            let response = handle_generate_event(
                http_post_event(body),
                &stored_config(),
                &model,
                Some(&store),
            )
            .await;

            assert_eq!(response.status_code, 400, "body {body:?}");
            assert_eq!(response.body_json()["error"], "validation_error");
        }
        assert_eq!(model.calls(), 0);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn stores_exactly_one_object_and_returns_its_key() {
        let model = RecordingModel::succeeding();
        let store = RecordingStore::new();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox", "seed": 7}"#),
            &stored_config(),
            &model,
            Some(&store),
        )
        .await;

        assert_eq!(response.status_code, 200);
        let body = response.body_json();
        let keys = store.keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(body["object_key"], keys[0].as_str());
        assert_eq!(body["presigned_url"], store.url_for(&keys[0]).as_str());
        assert_eq!(body["content_type"], "image/png");
        assert_eq!(body["expires_in_seconds"], 3600);
        assert_eq!(body["seed"], 7);
        assert!(keys[0].starts_with("generated_images/"));
        assert!(keys[0].ends_with("/image_a_red_fox.png"));

        let objects = store.objects();
        assert_eq!(objects[0].body, sample_png());
        assert_eq!(objects[0].content_type, "image/png");

        let sent: Value = serde_json::from_slice(&model.bodies()[0]).expect("model body");
        assert_eq!(sent["textToImageParams"]["text"], "a red fox");
        assert_eq!(sent["imageGenerationConfig"]["seed"], 7);
        assert_eq!(sent["imageGenerationConfig"]["numberOfImages"], 1);
    }

    #[tokio::test]
    async fn returns_inline_image_when_storage_is_not_requested() {
        let model = RecordingModel::succeeding();
        let store = RecordingStore::new();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox", "store": false}"#),
            &GenerateConfig::default(),
            &model,
            Some(&store),
        )
        .await;

        assert_eq!(response.status_code, 200);
        let body = response.body_json();
        assert!(body["image_base64"].as_str().is_some_and(|image| !image.is_empty()));
        assert!(body.get("object_key").is_none());
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn storage_without_bucket_fails_before_model_call() {
        let model = RecordingModel::succeeding();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox"}"#),
            &GenerateConfig::default(),
            &model,
            None,
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body_json()["error"], "misconfiguration");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_model_times_out_without_storing() {
        let model = StallingModel::new(Duration::from_secs(3_600));
        let store = RecordingStore::new();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox"}"#),
            &stored_config(),
            &model,
            Some(&store),
        )
        .await;

        assert_eq!(response.status_code, 504);
        assert_eq!(response.body_json()["error"], "model_timeout");
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn model_failure_is_a_server_error() {
        let model = RecordingModel::failing("ThrottlingException: rate exceeded");
        let store = RecordingStore::new();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox"}"#),
            &stored_config(),
            &model,
            Some(&store),
        )
        .await;

        assert_eq!(response.status_code, 502);
        assert_eq!(response.body_json()["error"], "model_invocation_failed");
        assert_eq!(model.calls(), 1);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn model_content_rejection_is_reported() {
        let model = RecordingModel::responding(
            json!({"images": [], "error": "blocked by content filters"})
                .to_string()
                .into_bytes(),
        );
        let store = RecordingStore::new();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox"}"#),
            &stored_config(),
            &model,
            Some(&store),
        )
        .await;

        assert_eq!(response.status_code, 502);
        assert_eq!(response.body_json()["error"], "model_response_invalid");
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_is_a_server_error() {
        let model = RecordingModel::succeeding();
        let store = RecordingStore::failing_writes();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox"}"#),
            &stored_config(),
            &model,
            Some(&store),
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body_json()["error"], "storage_failed");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn presign_failure_keeps_the_written_object() {
        let model = RecordingModel::succeeding();
        let store = RecordingStore::failing_presign();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox"}"#),
            &stored_config(),
            &model,
            Some(&store),
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body_json()["error"], "presign_failed");
        assert_eq!(model.calls(), 1);
        let objects = store.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].body, sample_png());
    }

    #[tokio::test]
    async fn random_seed_is_reported_and_sent_to_model() {
        let model = RecordingModel::succeeding();

        let response = handle_generate_event(
            http_post_event(r#"{"prompt": "a red fox", "store": false}"#),
            &GenerateConfig::default(),
            &model,
            None,
        )
        .await;

        let seed = response.body_json()["seed"].as_u64().expect("seed");
        assert!(seed <= u64::from(MAX_SEED));
        let sent: Value = serde_json::from_slice(&model.bodies()[0]).expect("model body");
        assert_eq!(sent["imageGenerationConfig"]["seed"].as_u64(), Some(seed));
    }
}
