use thiserror::Error;

use crate::edge::{error_response, ApiGatewayResponse};
use crate::runtime::contract::{ModelResponseError, ValidationError};

/// Why a single invocation failed. Every variant is surfaced to the caller;
/// none is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Misconfiguration(String),
    #[error("model did not respond within {0} seconds")]
    ModelTimeout(u64),
    #[error("{0}")]
    ModelInvocation(String),
    #[error(transparent)]
    ModelResponse(#[from] ModelResponseError),
    #[error("{0}")]
    Storage(String),
    #[error("{0}")]
    Presign(String),
}

impl GenerateError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Misconfiguration(_) | Self::Storage(_) | Self::Presign(_) => 500,
            Self::ModelInvocation(_) | Self::ModelResponse(_) => 502,
            Self::ModelTimeout(_) => 504,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Misconfiguration(_) => "misconfiguration",
            Self::ModelTimeout(_) => "model_timeout",
            Self::ModelInvocation(_) => "model_invocation_failed",
            Self::ModelResponse(_) => "model_response_invalid",
            Self::Storage(_) => "storage_failed",
            Self::Presign(_) => "presign_failed",
        }
    }

    pub fn to_response(&self) -> ApiGatewayResponse {
        error_response(self.status_code(), self.error_code(), &self.to_string())
    }
}
