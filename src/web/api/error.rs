use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::media::MediaError;
use crate::web::forms::FormErrors;
use crate::web::multipart::MultipartError;

/// Failures of the JSON API.
///
/// Validation failures render as `{field: [messages]}`, everything else as
/// `{"detail": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication credentials were not provided.")]
    Unauthorized,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("CSRF Failed: CSRF token missing or incorrect.")]
    Csrf,
    #[error("Not found.")]
    NotFound,
    #[error("Invalid page.")]
    InvalidPage,
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid input.")]
    Validation(FormErrors),
    #[error("Request body is too large.")]
    PayloadTooLarge,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::Csrf => StatusCode::FORBIDDEN,
            Self::NotFound | Self::InvalidPage => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A single-field validation error.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FormErrors::new();
        errors.add(name, message);
        Self::Validation(errors)
    }
}

impl From<FormErrors> for ApiError {
    fn from(errors: FormErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        match error {
            MultipartError::PayloadTooLarge => Self::PayloadTooLarge,
            MultipartError::Invalid(detail) => Self::BadRequest(detail),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::Io(e) => {
                Self::Internal(anyhow::Error::new(e).context("Media storage failed"))
            }
            other => Self::field("image", other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => json!(errors.into_map()),
            Self::Internal(e) => {
                tracing::error!("API request failed: {e:#}");
                json!({ "detail": "A server error occurred." })
            }
            other => {
                tracing::debug!(status = status.as_u16(), "API request rejected: {other}");
                json!({ "detail": other.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::field("blog", "Invalid pk").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_media_errors_become_image_field_errors() {
        let ApiError::Validation(errors) = ApiError::from(MediaError::InvalidImage) else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.field("image").len(), 1);
    }
}
