use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scixplain::errors::ExplainError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Failure of a single API request
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Explain(#[from] ExplainError),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Explain(err) => match err {
                ExplainError::NotFound(_) => StatusCode::NOT_FOUND,
                ExplainError::AmbiguousTitle(_) => StatusCode::CONFLICT,
                ExplainError::PromptTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ExplainError::TermExtraction(_)
                | ExplainError::InvalidToolCall(_)
                | ExplainError::PageNotFound(_)
                | ExplainError::SectionNotFound { .. }
                | ExplainError::ToolLoopExceeded(_)
                | ExplainError::Upstream(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Timeout(_) => "timeout",
            ApiError::Explain(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "request failed: {}", self);
        } else {
            tracing::warn!(kind = self.kind(), "request rejected: {}", self);
        }

        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Map a config field path such as `provider.api_key` to the environment variable that sets it
pub fn to_env_var(field: &str) -> String {
    format!("SCIXPLAIN_{}", field.replace('.', "__").to_uppercase())
}
