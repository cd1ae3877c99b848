//! Shared application state handed to every route.

use std::sync::Arc;

use crate::image::DEFAULT_MAX_IMAGE_BYTES;
use crate::pipeline::Pipeline;
use crate::quota::QuotaService;
use crate::store::ConversionStore;

/// Request-handling settings that are not part of any service.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Adds `Secure` to the session cookie.
    pub secure_cookies: bool,
    /// Largest accepted decoded screenshot.
    pub max_image_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secure_cookies: false,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Room for the data URL prefix and the JSON envelope around the payload.
const REQUEST_ENVELOPE_BYTES: usize = 64 * 1024;

impl Settings {
    /// Largest accepted conversion request body: the base64 form of the
    /// largest image plus its envelope.
    pub fn request_body_limit(&self) -> usize {
        self.max_image_bytes
            .div_ceil(3)
            .saturating_mul(4)
            .saturating_add(REQUEST_ENVELOPE_BYTES)
    }
}

/// Handles built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversionStore>,
    pub quota: Arc<dyn QuotaService>,
    pub pipeline: Arc<Pipeline>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ConversionStore>,
        quota: Arc<dyn QuotaService>,
        pipeline: Pipeline,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            quota,
            pipeline: Arc::new(pipeline),
            settings,
        }
    }
}
