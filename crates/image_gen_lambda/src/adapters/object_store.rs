use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str)
        -> Result<(), String>;

    /// Time-limited GET URL for an object previously written with `put_object`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, String>;
}

pub struct S3ArtifactStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl S3ArtifactStore {
    pub fn new(bucket: impl Into<String>, s3_client: aws_sdk_s3::Client) -> Self {
        Self {
            bucket: bucket.into(),
            s3_client,
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), String> {
        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to write object to s3: {error}"))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|error| format!("invalid presigning expiry: {error}"))?;
        let request = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|error| format!("failed to presign s3 object: {error}"))?;
        Ok(request.uri().to_string())
    }
}
