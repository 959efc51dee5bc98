//! Opaque image storage. The server never interprets image bytes beyond
//! picking a file extension from the declared content type; stored files are
//! served back verbatim under `/uploads`.

use axum::http::StatusCode;
use mime::Mime;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

pub const UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only PNG and JPEG uploads are supported.")]
    UnsupportedImageType,
    #[error("The upload exceeds the size limit.")]
    TooLarge,
    #[error("Writing the upload failed: {0}")]
    Write(std::io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::UnsupportedImageType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: Arc<PathBuf>,
}

impl UploadStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir: Arc::new(dir) }
    }

    fn extension(mime: &Mime) -> Option<&'static str> {
        match (mime.type_(), mime.subtype()) {
            (mime::IMAGE, mime::PNG) => Some("png"),
            (mime::IMAGE, mime::JPEG) => Some("jpg"),
            _ => None,
        }
    }

    /// Stores the bytes under a random name and returns the opaque path a
    /// client can later attach to content.
    pub async fn store(&self, mime: &Mime, bytes: &[u8]) -> Result<String, UploadError> {
        let extension = Self::extension(mime).ok_or(UploadError::UnsupportedImageType)?;
        if bytes.len() > UPLOAD_MAX_BYTES {
            return Err(UploadError::TooLarge);
        }

        let filename = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(self.dir.join(&filename), bytes)
            .await
            .map_err(UploadError::Write)?;

        Ok(format!("/uploads/{filename}"))
    }
}

#[cfg(test)]
mod tests {
    use crate::server::uploads::{UPLOAD_MAX_BYTES, UploadError, UploadStore};

    #[test]
    fn extension_for_supported_image_types() {
        assert_eq!(UploadStore::extension(&mime::IMAGE_PNG), Some("png"));
        assert_eq!(UploadStore::extension(&mime::IMAGE_JPEG), Some("jpg"));
        assert_eq!(UploadStore::extension(&mime::IMAGE_GIF), None);
        assert_eq!(UploadStore::extension(&mime::TEXT_PLAIN), None);
        assert_eq!(UploadStore::extension(&mime::APPLICATION_JSON), None);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_writing() {
        let store = UploadStore::new(std::env::temp_dir());
        let bytes = vec![0_u8; UPLOAD_MAX_BYTES + 1];

        let result = store.store(&mime::IMAGE_PNG, &bytes).await;
        assert!(matches!(result, Err(UploadError::TooLarge)));
    }

    #[tokio::test]
    async fn unsupported_image_type_is_rejected_before_writing() {
        let store = UploadStore::new(std::env::temp_dir());

        let result = store.store(&mime::IMAGE_GIF, &[0_u8; 4]).await;
        assert!(matches!(result, Err(UploadError::UnsupportedImageType)));
    }
}
