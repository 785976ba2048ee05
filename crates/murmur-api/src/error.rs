//! Error taxonomy for the HTTP surface.
//!
//! Handlers return [`ApiError`]; every variant maps to one status code.
//! Domain failures from the auth core are expressed as [`AuthError`] and
//! converted at the boundary, so the status contract lives in one place.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use murmur_types::api::{ErrorResponse, FieldError};
use murmur_types::models::Role;

use crate::token::{TokenError, TokenKind};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation { message, errors } => ErrorResponse { message, errors },
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                ErrorResponse {
                    message: "Internal server error".to_string(),
                    errors: vec![],
                }
            }
            other => ErrorResponse {
                message: other.to_string(),
                errors: vec![],
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation {
            message: "Validation failed".to_string(),
            errors: vec![FieldError {
                field: "body".to_string(),
                message: rejection.body_text(),
            }],
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation {
            message: "Validation failed".to_string(),
            errors: vec![FieldError {
                field: "query".to_string(),
                message: rejection.body_text(),
            }],
        }
    }
}

/// Failures of the authentication gate and the session service.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{} is required", .0.label())]
    MissingToken(TokenKind),

    #[error("{0}")]
    InvalidToken(#[from] TokenError),

    #[error("token carries no identifier")]
    MissingTokenId,

    #[error("token has been revoked")]
    Revoked,

    #[error("token subject no longer exists")]
    UnknownSubject,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token already revoked")]
    AlreadyRevoked,

    #[error("role {0:?} required")]
    Forbidden(Role),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken(kind) => {
                ApiError::BadRequest(format!("{} is required", kind.label()))
            }
            AuthError::InvalidToken(TokenError::Expired) => {
                ApiError::Unauthorized("Token has expired".to_string())
            }
            AuthError::InvalidToken(_) => ApiError::Unauthorized("Invalid token".to_string()),
            AuthError::MissingTokenId => {
                ApiError::Unauthorized("Invalid token format: missing token ID".to_string())
            }
            AuthError::Revoked => ApiError::Unauthorized("Token has been revoked".to_string()),
            AuthError::UnknownSubject => ApiError::NotFound("User not found".to_string()),
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::AlreadyRevoked => {
                ApiError::BadRequest("User already signed out".to_string())
            }
            AuthError::Forbidden(role) => ApiError::Forbidden(format!(
                "Access denied. Required role: {}",
                role.as_str()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_contract_statuses() {
        let cases = [
            (AuthError::MissingToken(TokenKind::Access), StatusCode::BAD_REQUEST),
            (AuthError::InvalidToken(TokenError::Expired), StatusCode::UNAUTHORIZED),
            (AuthError::InvalidToken(TokenError::InvalidSignature), StatusCode::UNAUTHORIZED),
            (AuthError::MissingTokenId, StatusCode::UNAUTHORIZED),
            (AuthError::Revoked, StatusCode::UNAUTHORIZED),
            (AuthError::UnknownSubject, StatusCode::NOT_FOUND),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::AlreadyRevoked, StatusCode::BAD_REQUEST),
            (AuthError::Forbidden(Role::Admin), StatusCode::FORBIDDEN),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_token_message_names_the_header_class() {
        let err = ApiError::from(AuthError::MissingToken(TokenKind::Refresh));
        assert_eq!(err.to_string(), "Refresh token is required");
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = ApiError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
