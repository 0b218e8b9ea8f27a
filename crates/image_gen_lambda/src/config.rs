//! Cold-start configuration read from the function's environment.

use std::time::Duration;

use thiserror::Error;

use crate::runtime::storage_keys::DEFAULT_KEY_PREFIX;

pub const DEFAULT_MODEL_ID: &str = "amazon.titan-image-generator-v2:0";
pub const DEFAULT_BEDROCK_REGION: &str = "us-east-1";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_MODEL_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_PRESIGNED_URL_EXPIRY_SECONDS: u64 = 3_600;
/// Longest expiry S3 accepts for SigV4 presigned URLs.
pub const MAX_PRESIGNED_URL_EXPIRY_SECONDS: u64 = 604_800;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    pub bucket: Option<String>,
    pub key_prefix: String,
    pub model_id: String,
    pub bedrock_region: String,
    pub log_level: String,
    pub model_timeout: Duration,
    pub presigned_url_expiry: Duration,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            bedrock_region: DEFAULT_BEDROCK_REGION.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            model_timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECONDS),
            presigned_url_expiry: Duration::from_secs(DEFAULT_PRESIGNED_URL_EXPIRY_SECONDS),
        }
    }
}

impl GenerateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let model_timeout = parse_seconds(&lookup, "MODEL_TIMEOUT_SECONDS", 1, u64::MAX)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.model_timeout);
        let presigned_url_expiry = parse_seconds(
            &lookup,
            "PRESIGNED_URL_EXPIRY_SECONDS",
            1,
            MAX_PRESIGNED_URL_EXPIRY_SECONDS,
        )?
        .map(Duration::from_secs)
        .unwrap_or(defaults.presigned_url_expiry);

        Ok(Self {
            bucket: non_empty(&lookup, "S3_BUCKET_NAME"),
            key_prefix: non_empty(&lookup, "OBJECT_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            model_id: non_empty(&lookup, "MODEL_ID").unwrap_or(defaults.model_id),
            bedrock_region: non_empty(&lookup, "BEDROCK_REGION")
                .unwrap_or(defaults.bedrock_region),
            log_level: non_empty(&lookup, "LOG_LEVEL").unwrap_or(defaults.log_level),
            model_timeout,
            presigned_url_expiry,
        })
    }

    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        self.bucket
            .as_deref()
            .ok_or(ConfigError::Missing("S3_BUCKET_NAME"))
    }
}

/// Credentials for the chat channel webhook variant.
#[derive(Clone, PartialEq, Eq)]
pub struct LineChannelConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
}

impl std::fmt::Debug for LineChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineChannelConfig")
            .field("channel_secret", &"<redacted>")
            .field("channel_access_token", &"<redacted>")
            .finish()
    }
}

impl LineChannelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            channel_secret: non_empty(&lookup, "LINE_CHANNEL_SECRET")
                .ok_or(ConfigError::Missing("LINE_CHANNEL_SECRET"))?,
            channel_access_token: non_empty(&lookup, "LINE_CHANNEL_ACCESS_TOKEN")
                .ok_or(ConfigError::Missing("LINE_CHANNEL_ACCESS_TOKEN"))?,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    min: u64,
    max: u64,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = non_empty(lookup, name) else {
        return Ok(None);
    };
    let value = raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        value: raw.clone(),
        reason: error.to_string(),
    })?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: format!("must be between {min} and {max}"),
        });
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = GenerateConfig::from_lookup(lookup_from(&[])).expect("config should load");

        assert_eq!(config, GenerateConfig::default());
        assert_eq!(config.model_timeout, Duration::from_secs(60));
        assert_eq!(config.presigned_url_expiry, Duration::from_secs(3_600));
        assert_eq!(
            config.require_bucket(),
            Err(ConfigError::Missing("S3_BUCKET_NAME"))
        );
    }

    #[test]
    fn reads_overrides_and_ignores_blank_values() {
        let config = GenerateConfig::from_lookup(lookup_from(&[
            ("S3_BUCKET_NAME", "bedrock-bucket-123-us-east-1"),
            ("MODEL_ID", "amazon.titan-image-generator-v1"),
            ("MODEL_TIMEOUT_SECONDS", "30"),
            ("LOG_LEVEL", " "),
        ]))
        .expect("config should load");

        assert_eq!(config.require_bucket(), Ok("bedrock-bucket-123-us-east-1"));
        assert_eq!(config.model_id, "amazon.titan-image-generator-v1");
        assert_eq!(config.model_timeout, Duration::from_secs(30));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn rejects_invalid_durations() {
        let error = GenerateConfig::from_lookup(lookup_from(&[("MODEL_TIMEOUT_SECONDS", "0")]))
            .expect_err("zero timeout should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "MODEL_TIMEOUT_SECONDS",
                ..
            }
        ));

        assert!(GenerateConfig::from_lookup(lookup_from(&[(
            "PRESIGNED_URL_EXPIRY_SECONDS",
            "604801"
        )]))
        .is_err());
        assert!(
            GenerateConfig::from_lookup(lookup_from(&[("MODEL_TIMEOUT_SECONDS", "soon")])).is_err()
        );
    }

    #[test]
    fn line_channel_requires_both_credentials() {
        let error = LineChannelConfig::from_lookup(lookup_from(&[
            ("LINE_CHANNEL_SECRET", "secret"),
            ("LINE_CHANNEL_ACCESS_TOKEN", ""),
        ]))
        .expect_err("blank token should fail");
        assert_eq!(error, ConfigError::Missing("LINE_CHANNEL_ACCESS_TOKEN"));

        let config = LineChannelConfig::from_lookup(lookup_from(&[
            ("LINE_CHANNEL_SECRET", "s3cr3t-value"),
            ("LINE_CHANNEL_ACCESS_TOKEN", "t0ken-value"),
        ]))
        .expect("config should load");
        assert_eq!(config.channel_secret, "s3cr3t-value");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cr3t-value"));
        assert!(!rendered.contains("t0ken-value"));
    }
}
