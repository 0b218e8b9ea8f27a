use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;

const JSON_CONTENT_TYPE: &str = "application/json";

/// One synchronous call to the external image model.
///
/// Takes the serialized request body and returns the raw response body.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn invoke(&self, body: Vec<u8>) -> Result<Vec<u8>, String>;
}

pub struct BedrockImageModel {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl BedrockImageModel {
    pub fn new(client: aws_sdk_bedrockruntime::Client, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ImageModel for BedrockImageModel {
    async fn invoke(&self, body: Vec<u8>) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type(JSON_CONTENT_TYPE)
            .accept(JSON_CONTENT_TYPE)
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|error| {
                format!(
                    "failed to invoke model {}: {}",
                    self.model_id,
                    aws_sdk_bedrockruntime::error::DisplayErrorContext(&error)
                )
            })?;
        Ok(response.body().as_ref().to_vec())
    }
}
