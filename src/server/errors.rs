use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    errors::{ErrorKind, ExchangeError},
    profile::ProfileError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("The service has encountered an unexpected internal state")]
    Internal,
}

/// JSON body returned with every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl AppError {
    /// Convenience function to log an unexpected failure and hide its details
    pub fn internal<E: fmt::Debug>(e: E) -> Self {
        tracing::error!("Service failure: {e:?}");
        AppError::Internal
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Exchange(e) => match e.kind() {
                ErrorKind::MalformedPayload | ErrorKind::UnrecognizedFormat => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ErrorKind::EncodingFailed => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Profile(ProfileError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Profile(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Exchange(e) => e.kind().as_str(),
            AppError::Profile(ProfileError::NotFound(_)) => "profile_not_found",
            AppError::Profile(_) => "profile_service",
            AppError::Internal => "internal",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Exchange(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {self}");
        }
        let body = ErrorBody {
            kind: self.kind().to_string(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
