use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::subscriptions::SubscriptionError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Upstream {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Client errors keep their own message; server-side failures are
    /// reported with `generic_message` only.
    pub fn from_subscription(err: SubscriptionError, generic_message: &str) -> Self {
        match err {
            SubscriptionError::InvalidPlanOrCurrency
            | SubscriptionError::SignatureMismatch
            | SubscriptionError::InvalidOrExpiredOrder => AppError::BadRequest(err.to_string()),
            SubscriptionError::NotFound => AppError::NotFound(err.to_string()),
            SubscriptionError::Forbidden => AppError::Forbidden(err.to_string()),
            SubscriptionError::UpstreamGatewayFailure(source)
            | SubscriptionError::Internal(source) => AppError::Upstream {
                message: generic_message.to_string(),
                source,
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Upstream failures are logged where they happen; internal detail
        // never reaches the client.
        if let AppError::Internal(source) = &self {
            error!(error = ?source, "request failed");
        }

        let body = Json(ErrorResponse {
            success: false,
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
