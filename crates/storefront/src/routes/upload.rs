//! Multipart form reading for photo uploads.
//!
//! Parts with a file name become [`ImageFile`]s; every other part is kept as
//! text. An empty file input (no name, no bytes) is ignored.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use numisma_core::ImageFile;

use crate::error::{AppError, FieldErrors, Result};

/// Request body headroom for the text parts next to the photos.
pub const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed upload: {}", e.body_text()))
}

/// A fully read multipart form.
#[derive(Debug, Default)]
pub struct Upload {
    fields: HashMap<String, String>,
    images: Vec<(String, ImageFile)>,
}

impl Upload {
    /// Read every part.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed body and
    /// `AppError::Validation` keyed by part name for files that are not
    /// acceptable images.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut upload = Self::default();
        let mut errors = FieldErrors::new();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(ToString::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    match ImageFile::new(file_name, content_type, bytes.to_vec()) {
                        Ok(image) => upload.images.push((name, image)),
                        Err(e) => errors.add(name, e.to_string()),
                    }
                }
                None => {
                    let value = field.text().await.map_err(bad_multipart)?;
                    upload.fields.insert(name, value);
                }
            }
        }

        errors.into_result()?;
        Ok(upload)
    }

    /// A text part, trimmed; `None` when absent or blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Owned copy of [`Self::text`].
    #[must_use]
    pub fn string(&self, name: &str) -> Option<String> {
        self.text(name).map(ToString::to_string)
    }

    /// Parse a text part, recording a field error when it does not parse.
    pub fn parse<T: std::str::FromStr>(
        &self,
        name: &str,
        errors: &mut FieldErrors,
    ) -> Option<T> {
        let raw = self.text(name)?;
        raw.parse().map_or_else(
            |_| {
                errors.add(name, format!("`{raw}` is not a valid value"));
                None
            },
            Some,
        )
    }

    /// Remove and return the first image sent under `name`.
    pub fn take_image(&mut self, name: &str) -> Option<ImageFile> {
        let index = self.images.iter().position(|(n, _)| n == name)?;
        Some(self.images.remove(index).1)
    }

    /// Every image, in the order sent.
    #[must_use]
    pub fn into_images(self) -> Vec<ImageFile> {
        self.images.into_iter().map(|(_, image)| image).collect()
    }
}
