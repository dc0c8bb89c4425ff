//! Product image uploads to the media host (Cloudinary).
//!
//! Uploads are signed server-side so the API secret never leaves the backend.
//! The signature is the SHA-256 hex digest of the sorted signed parameters
//! followed by the API secret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::config::MediaConfig;

/// Media host upload API base URL.
const BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when uploading images.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The upload contained no bytes.
    #[error("uploaded file is empty")]
    Empty,

    /// The upload exceeds [`MAX_UPLOAD_BYTES`].
    #[error("file exceeds {max} bytes")]
    TooLarge { max: usize },

    /// The upload is not an image.
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl MediaError {
    /// Whether the error is the client's fault rather than the host's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::TooLarge { .. } | Self::UnsupportedType(_)
        )
    }
}

/// A stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    /// Public HTTPS URL.
    pub url: String,
    /// Host-side identifier.
    pub public_id: String,
}

/// An image file received from a client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

impl ImageUpload {
    /// Check size and type before anything leaves the process.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Empty`, `MediaError::TooLarge` or
    /// `MediaError::UnsupportedType`.
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(MediaError::TooLarge {
                max: MAX_UPLOAD_BYTES,
            });
        }
        if let Some(content_type) = &self.content_type
            && !content_type.starts_with("image/")
        {
            return Err(MediaError::UnsupportedType(content_type.clone()));
        }
        Ok(())
    }
}

/// Somewhere product images can be stored.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store an image and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `MediaError` if the upload is invalid or the host fails.
    async fn upload(&self, image: ImageUpload) -> Result<UploadedImage, MediaError>;
}

/// Cloudinary upload client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
    api_secret: SecretString,
}

impl CloudinaryClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MediaConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            upload_url: format!("{BASE_URL}/{}/auto/upload", config.cloud_name),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    #[instrument(skip_all, fields(file_name = %image.file_name, size = image.bytes.len()))]
    async fn upload(&self, image: ImageUpload) -> Result<UploadedImage, MediaError> {
        image.validate()?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params = [("timestamp", timestamp.as_str())];
        let signature = sign(&params, &self.api_secret);

        let mut file = Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(content_type) = &image.content_type {
            file = file.mime_str(content_type)?;
        }

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature)
            .part("file", file);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Media host rejected upload");
            return Err(MediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Parse(e.to_string()))?;

        tracing::info!(public_id = %body.public_id, bytes = body.bytes, "Image uploaded");
        Ok(UploadedImage {
            url: body.secure_url,
            public_id: body.public_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    bytes: u64,
}

/// Sign upload parameters: `k1=v1&k2=v2` sorted by key, then the secret.
fn sign(params: &[(&str, &str)], secret: &SecretString) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(key, _)| *key);
    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.expose_secret().as_bytes());
    hex::encode(hasher.finalize())
}

/// Image host that never leaves the process.
///
/// Returns deterministic URLs, or a host error when built with
/// [`StubImageHost::failing`].
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Default)]
pub struct StubImageHost {
    fail: bool,
    uploads: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(any(test, feature = "test-support"))]
impl StubImageHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that rejects every upload with a 500.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of uploads that reached the host.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ImageHost for StubImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<UploadedImage, MediaError> {
        image.validate()?;
        let n = self
            .uploads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        if self.fail {
            return Err(MediaError::Api {
                status: 500,
                message: "stub host failure".to_string(),
            });
        }
        Ok(UploadedImage {
            url: format!("https://media.test/{n}/{}", image.file_name),
            public_id: format!("stub-{n}"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn upload(bytes: usize, content_type: Option<&str>) -> ImageUpload {
        ImageUpload {
            bytes: vec![0xAB; bytes],
            file_name: "shoe.png".to_string(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_sign_sorts_params_and_appends_secret() {
        let secret = SecretString::from("abcd");
        let signature = sign(&[("timestamp", "1315060510"), ("public_id", "sample")], &secret);

        let mut hasher = Sha256::new();
        hasher.update(b"public_id=sample&timestamp=1315060510abcd");
        assert_eq!(signature, hex::encode(hasher.finalize()));
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_validate_upload() {
        assert!(upload(10, Some("image/png")).validate().is_ok());
        assert!(upload(10, None).validate().is_ok());
        assert!(matches!(upload(0, None).validate(), Err(MediaError::Empty)));
        assert!(matches!(
            upload(MAX_UPLOAD_BYTES + 1, None).validate(),
            Err(MediaError::TooLarge { .. })
        ));
        assert!(matches!(
            upload(10, Some("application/pdf")).validate(),
            Err(MediaError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn test_stub_host() {
        let host = StubImageHost::new();
        let image = host.upload(upload(10, Some("image/png"))).await.unwrap();
        assert!(image.url.ends_with("/shoe.png"));
        assert_eq!(host.upload_count(), 1);

        let failing = StubImageHost::failing();
        let err = failing.upload(upload(10, None)).await.unwrap_err();
        assert!(!err.is_client_error());
    }
}
