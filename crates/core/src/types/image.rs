//! In-memory image blobs awaiting upload.
//!
//! Avatars, listing photos and verification photographs arrive as multipart
//! parts and are held in memory until they are handed to the storage
//! collaborator.

use core::fmt;

/// Upload size cap (5 MB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Reasons an upload is refused before it reaches storage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Zero-length body.
    #[error("image file is empty")]
    Empty,
    /// Over [`MAX_IMAGE_BYTES`].
    #[error("image must be at most 5MB (got {size} bytes)")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
    },
    /// MIME type is not `image/*`.
    #[error("file must be an image (got {0})")]
    NotAnImage(String),
}

/// A validated image held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl ImageFile {
    /// Validate size and MIME type.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError`] when the blob is empty, larger than 5 MB or not
    /// an `image/*` type.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let content_type = content_type.into().trim().to_ascii_lowercase();

        if !content_type.starts_with("image/") {
            return Err(ImageError::NotAnImage(content_type));
        }
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge { size: bytes.len() });
        }

        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    /// Original file name as sent by the client.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Lowercased MIME type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a validated image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension derived from the MIME subtype (`jpeg` -> `jpg`).
    #[must_use]
    pub fn extension(&self) -> &str {
        match self.content_type.trim_start_matches("image/") {
            "jpeg" | "pjpeg" => "jpg",
            "svg+xml" => "svg",
            other => other,
        }
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_images() {
        let image = ImageFile::new("front.JPG", "Image/JPEG", vec![1, 2, 3]).unwrap();
        assert_eq!(image.content_type(), "image/jpeg");
        assert_eq!(image.extension(), "jpg");
        assert_eq!(image.len(), 3);
    }

    #[test]
    fn test_rejects_non_images() {
        assert_eq!(
            ImageFile::new("doc.pdf", "application/pdf", vec![1]),
            Err(ImageError::NotAnImage("application/pdf".to_string()))
        );
    }

    #[test]
    fn test_rejects_empty_and_large() {
        assert_eq!(
            ImageFile::new("a.png", "image/png", Vec::new()),
            Err(ImageError::Empty)
        );
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            ImageFile::new("a.png", "image/png", big),
            Err(ImageError::TooLarge { .. })
        ));
        assert!(ImageFile::new("a.png", "image/png", vec![0u8; MAX_IMAGE_BYTES]).is_ok());
    }

    #[test]
    fn test_debug_omits_bytes() {
        let image = ImageFile::new("a.png", "image/png", vec![7; 10]).unwrap();
        let debug = format!("{image:?}");
        assert!(debug.contains("len: 10"));
        assert!(!debug.contains("bytes"));
    }
}
