use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::{
    http::request::{FieldError, ValidationError},
    relay::SendError,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Send(#[from] SendError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(ValidationError(vec![FieldError::new(
            "body",
            rejection.body_text(),
        )]))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Send(SendError::Address { .. } | SendError::ContentType(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Send(SendError::Smtp(failure)) => StatusCode::from_u16(failure.kind().status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Send(SendError::Build(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        let body = match self {
            ApiError::Validation(ValidationError(details)) => ErrorBody {
                error: "validation failed".to_string(),
                details: Some(details),
            },
            ApiError::Send(error) => ErrorBody {
                error: error.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
