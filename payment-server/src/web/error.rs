//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{GatewayError, MailError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Missing configuration or an upstream gateway failure
    Internal {
        message: String,
        detail: Option<String>,
    },
    /// The email provider failed
    BadGateway {
        message: String,
        detail: Option<String>,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Internal { message, detail } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, detail)
            }
            ApiError::BadGateway { message, detail } => (StatusCode::BAD_GATEWAY, message, detail),
        };

        (status, Json(ErrorBody { message, detail })).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotConfigured => ApiError::Internal {
                message: "payment gateway is not configured".to_string(),
                detail: None,
            },
            other => ApiError::Internal {
                message: "failed to generate payment link".to_string(),
                detail: Some(other.to_string()),
            },
        }
    }
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        match e {
            MailError::NotConfigured => ApiError::Internal {
                message: "email provider is not configured".to_string(),
                detail: None,
            },
            other => ApiError::BadGateway {
                message: "failed to send email".to_string(),
                detail: Some(other.to_string()),
            },
        }
    }
}
