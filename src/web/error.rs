use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use maud::html;
use thiserror::Error;

use super::multipart::MultipartError;
use crate::components::{Alert, BaseLayout, Button};
use crate::media::MediaError;

/// Failures of the HTML handlers, rendered as an error page.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("Page not found")]
    NotFound,
    #[error("You do not have permission to do that")]
    Forbidden,
    #[error("The form has expired, please reload the page and try again")]
    Csrf,
    #[error("{0}")]
    BadRequest(String),
    #[error("The upload is too large")]
    PayloadTooLarge,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden | Self::Csrf => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Something went wrong on our side".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<MediaError> for WebError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::Io(e) => Self::Internal(anyhow::Error::new(e).context("Media storage failed")),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<MultipartError> for WebError {
    fn from(error: MultipartError) -> Self {
        match error {
            MultipartError::PayloadTooLarge => Self::PayloadTooLarge,
            MultipartError::Invalid(detail) => Self::BadRequest(detail),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(e) = &self {
            tracing::error!("Request failed: {e:#}");
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {self}");
        }

        let title = status.canonical_reason().unwrap_or("Error");
        let message = self.public_message();
        let content = html! {
            article class="error-page" {
                h1 { (status.as_u16()) " " (title) }
                (Alert::error(&message))
                (Button::outline("Back to the home page").href("/main/"))
            }
        };

        let page = BaseLayout::new(title, None).render(content);
        (status, Html(page.into_string())).into_response()
    }
}
