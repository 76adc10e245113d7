//! External AI service clients.
//!
//! The pipeline only sees the two traits below; the concrete Stability and
//! Gemini clients live in their own modules, and tests swap in mocks.

mod gemini;
mod stability;

pub use gemini::{GeminiClient, GeminiSettings};
pub use stability::{StabilityClient, StabilitySettings};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::ProviderError;
use crate::normalize::NormalizedImage;
use crate::prompt::StylePrompt;

/// Image returned by the generation service.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Seed reported by the service, if any.
    pub seed: Option<u64>,
}

impl GeneratedImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/png".to_string(),
            seed: None,
        }
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Data URL the browser can use directly as an `<img>` source.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

/// Produces a stylized derivative of a normalized photo.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    async fn stylize(
        &self,
        image: &NormalizedImage,
        prompt: &StylePrompt,
    ) -> Result<GeneratedImage, ProviderError>;
}

/// Writes social-media copy for an image.
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    async fn caption(&self, image: &GeneratedImage, prompt: &str) -> Result<String, ProviderError>;
}

/// Cut an error body down to something fit for a log line.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let cut: String = body.chars().take(max_chars).collect();
    format!("{cut}...")
}
