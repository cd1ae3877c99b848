//! Screenshot payload validation.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use regex::Regex;

/// Default cap on the decoded image size (10 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

static DATA_URL_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^data:(image/[a-zA-Z]+);base64,").ok());

/// Reasons an image payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image must be a base64 data URL with an image MIME type")]
    NotAnImageDataUrl,

    #[error("image payload is empty")]
    Empty,

    #[error("image payload is not valid base64")]
    InvalidBase64,

    #[error("image is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// A validated screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type from the data URL, e.g. `image/png`.
    pub mime: String,
    /// Decoded image bytes.
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Parses a `data:image/<type>;base64,<payload>` URL.
    pub fn from_data_url(data_url: &str, max_bytes: usize) -> Result<Self, ImageError> {
        let prefix = DATA_URL_PREFIX
            .as_ref()
            .ok_or(ImageError::NotAnImageDataUrl)?;
        let captures = prefix
            .captures(data_url)
            .ok_or(ImageError::NotAnImageDataUrl)?;
        let mime = captures
            .get(1)
            .map(|m| m.as_str().to_ascii_lowercase())
            .ok_or(ImageError::NotAnImageDataUrl)?;
        let encoded = captures
            .get(0)
            .map(|m| &data_url[m.end()..])
            .ok_or(ImageError::NotAnImageDataUrl)?
            .trim();

        if encoded.is_empty() {
            return Err(ImageError::Empty);
        }
        // Reject oversized payloads before decoding them.
        let estimated = encoded.len() / 4 * 3;
        if estimated > max_bytes + 3 {
            return Err(ImageError::TooLarge {
                size: estimated,
                limit: max_bytes,
            });
        }

        let bytes = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| ImageError::InvalidBase64)?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > max_bytes {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        Ok(Self { mime, bytes })
    }

    /// Re-encodes the image as a data URL for the upstream request.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64_STANDARD.encode(&self.bytes))
    }
}
