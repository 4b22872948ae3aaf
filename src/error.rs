use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    models::common::ErrorResponse,
    services::{app_store_service::AppStoreError, google_play_service::GooglePlayError},
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Google Play error: {0}")]
    GooglePlay(#[from] GooglePlayError),

    #[error("App Store error: {0}")]
    AppStore(#[from] AppStoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// Whether this error already carries a caller-visible kind
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidArgument(_)
                | ApiError::FailedPrecondition(_)
                | ApiError::NotFound(_)
                | ApiError::Unauthenticated(_)
                | ApiError::Internal { .. }
        )
    }

    /// Classify an error at the handler boundary.
    ///
    /// Client-facing kinds pass through unchanged; anything else becomes
    /// `Internal` with `message` and the source's text as details.
    pub fn at_boundary(self, message: &str) -> ApiError {
        if self.is_client_facing() {
            return self;
        }

        ApiError::Internal {
            message: message.to_string(),
            details: Some(self.to_string()),
        }
    }

    /// Callable-protocol status name
    pub fn status_name(&self) -> &'static str {
        match self {
            ApiError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ApiError::FailedPrecondition(_) => "FAILED_PRECONDITION",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            _ => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_name = self.status_name();
        let (status, message, details) = match self {
            ApiError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::FailedPrecondition(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Internal { message, details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, details)
            }
            other => {
                tracing::error!("Unclassified error reached response: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse::new(status_name, message, details.map(serde_json::Value::from));

        (status, Json(body)).into_response()
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;
