//! Buffered multipart form parsing shared by the HTML and API handlers.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("The upload is too large")]
    PayloadTooLarge,
    #[error("Invalid form data: {0}")]
    Invalid(String),
}

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub data: Bytes,
}

/// All parts of a multipart form, read into memory.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Read every part. File inputs left empty by the browser are skipped.
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();

        loop {
            match multipart.next_field().await {
                Ok(Some(field)) => {
                    let Some(name) = field.name().map(ToString::to_string) else {
                        continue;
                    };

                    if let Some(file_name) = field.file_name().map(ToString::to_string) {
                        let data = field.bytes().await.map_err(map_multipart_error)?;
                        if file_name.trim().is_empty() && data.is_empty() {
                            continue;
                        }
                        form.files.push(UploadedFile {
                            field: name,
                            file_name,
                            data,
                        });
                    } else {
                        let value = field.text().await.map_err(map_multipart_error)?;
                        form.fields.entry(name).or_default().push(value);
                    }
                }
                Ok(None) => break,
                Err(err) => return Err(map_multipart_error(err)),
            }
        }

        Ok(form)
    }

    /// First value of a text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a repeated text field, such as a group of checkboxes.
    #[must_use]
    pub fn texts(&self, name: &str) -> &[String] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }

    /// Files uploaded under one input name.
    pub fn files<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files.iter().filter(move |f| f.field == name)
    }

    #[must_use]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == name)
    }
}

fn map_multipart_error(err: axum::extract::multipart::MultipartError) -> MultipartError {
    let status = err.status();
    tracing::warn!(status = status.as_u16(), error = %err, "Failed to read multipart payload");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        MultipartError::PayloadTooLarge
    } else {
        MultipartError::Invalid(err.body_text())
    }
}
