use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PROMPT_CHARS: usize = 512;
pub const MIN_IMAGE_DIMENSION: u32 = 320;
pub const MAX_IMAGE_DIMENSION: u32 = 1408;
pub const IMAGE_DIMENSION_STEP: u32 = 64;
pub const DEFAULT_IMAGE_DIMENSION: u32 = 512;
pub const MIN_CFG_SCALE: f32 = 1.1;
pub const MAX_CFG_SCALE: f32 = 10.0;
pub const DEFAULT_CFG_SCALE: f32 = 8.0;
pub const MAX_SEED: u32 = 2_147_483_646;
pub const TEXT_IMAGE_TASK: &str = "TEXT_IMAGE";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    Premium,
}

/// Caller-supplied generation parameters, as posted to the endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    #[serde(default, alias = "input_text")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub cfg_scale: Option<f32>,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub seed: Option<u32>,
    #[serde(default)]
    pub store: Option<bool>,
}

impl GenerationRequest {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }
}

/// A request that passed validation with every default filled in except the
/// seed, which is drawn per invocation when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub cfg_scale: f32,
    pub quality: Quality,
    pub seed: Option<u32>,
    pub store: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn normalize_request(payload: GenerationRequest) -> Result<ValidatedRequest, ValidationError> {
    let prompt = payload
        .prompt
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if prompt.is_empty() {
        return Err(ValidationError::new("prompt is required"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ValidationError::new(format!(
            "prompt exceeds {MAX_PROMPT_CHARS} characters"
        )));
    }

    let negative_prompt = match payload.negative_prompt.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) if text.chars().count() > MAX_PROMPT_CHARS => {
            return Err(ValidationError::new(format!(
                "negative_prompt exceeds {MAX_PROMPT_CHARS} characters"
            )));
        }
        Some(text) => Some(text.to_string()),
    };

    let width = validate_dimension("width", payload.width)?;
    let height = validate_dimension("height", payload.height)?;

    let cfg_scale = payload.cfg_scale.unwrap_or(DEFAULT_CFG_SCALE);
    if !cfg_scale.is_finite() || !(MIN_CFG_SCALE..=MAX_CFG_SCALE).contains(&cfg_scale) {
        return Err(ValidationError::new(format!(
            "cfg_scale must be between {MIN_CFG_SCALE} and {MAX_CFG_SCALE}"
        )));
    }

    if let Some(seed) = payload.seed {
        if seed > MAX_SEED {
            return Err(ValidationError::new(format!(
                "seed must be between 0 and {MAX_SEED}"
            )));
        }
    }

    Ok(ValidatedRequest {
        prompt,
        negative_prompt,
        width,
        height,
        cfg_scale,
        quality: payload.quality.unwrap_or_default(),
        seed: payload.seed,
        store: payload.store.unwrap_or(true),
    })
}

fn validate_dimension(name: &str, value: Option<u32>) -> Result<u32, ValidationError> {
    let value = value.unwrap_or(DEFAULT_IMAGE_DIMENSION);
    if !(MIN_IMAGE_DIMENSION..=MAX_IMAGE_DIMENSION).contains(&value)
        || value % IMAGE_DIMENSION_STEP != 0
    {
        return Err(ValidationError::new(format!(
            "{name} must be a multiple of {IMAGE_DIMENSION_STEP} between {MIN_IMAGE_DIMENSION} and {MAX_IMAGE_DIMENSION}"
        )));
    }
    Ok(value)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TitanImageRequest {
    pub task_type: String,
    pub text_to_image_params: TextToImageParams,
    pub image_generation_config: ImageGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextToImageParams {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationConfig {
    pub number_of_images: u32,
    pub quality: Quality,
    pub cfg_scale: f32,
    pub height: u32,
    pub width: u32,
    pub seed: u32,
}

impl TitanImageRequest {
    /// Builds the single-image text-to-image body for `request`.
    pub fn text_to_image(request: &ValidatedRequest, seed: u32) -> Self {
        Self {
            task_type: TEXT_IMAGE_TASK.to_string(),
            text_to_image_params: TextToImageParams {
                text: request.prompt.clone(),
                negative_text: request.negative_prompt.clone(),
            },
            image_generation_config: ImageGenerationConfig {
                number_of_images: 1,
                quality: request.quality,
                cfg_scale: request.cfg_scale,
                height: request.height,
                width: request.width,
                seed,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TitanImageResponse {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelResponseError {
    #[error("model response is not valid JSON: {0}")]
    Malformed(String),
    #[error("model reported an error: {0}")]
    Rejected(String),
    #[error("model response contained no images")]
    NoImages,
    #[error("model image is not valid base64: {0}")]
    InvalidImageData(String),
}

/// Decodes the first image of a raw model-service response body.
pub fn decode_first_image(raw: &[u8]) -> Result<Vec<u8>, ModelResponseError> {
    let response: TitanImageResponse = serde_json::from_slice(raw)
        .map_err(|error| ModelResponseError::Malformed(error.to_string()))?;

    if let Some(message) = response.error.filter(|message| !message.trim().is_empty()) {
        return Err(ModelResponseError::Rejected(message));
    }

    let encoded = response
        .images
        .into_iter()
        .next()
        .ok_or(ModelResponseError::NoImages)?;
    let image = STANDARD
        .decode(encoded.trim())
        .map_err(|error| ModelResponseError::InvalidImageData(error.to_string()))?;
    if image.is_empty() {
        return Err(ModelResponseError::NoImages);
    }
    Ok(image)
}

/// Successful response body returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum GenerationResponse {
    Stored {
        object_key: String,
        presigned_url: String,
        expires_in_seconds: u64,
        content_type: String,
        seed: u32,
    },
    Inline {
        image_base64: String,
        content_type: String,
        seed: u32,
    },
}

impl GenerationResponse {
    pub fn inline(image: &[u8], content_type: &str, seed: u32) -> Self {
        Self::Inline {
            image_base64: STANDARD.encode(image),
            content_type: content_type.to_string(),
            seed,
        }
    }

    pub fn object_key(&self) -> Option<&str> {
        match self {
            Self::Stored { object_key, .. } => Some(object_key),
            Self::Inline { .. } => None,
        }
    }
}
