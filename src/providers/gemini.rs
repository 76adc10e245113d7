//! Google Gemini caption client using the `generateContent` REST API.
//!
//! The caption prompt and the stylized image travel as two parts of a single
//! user turn; the image is inlined as base64.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{truncate_body, CaptionGenerator, GeneratedImage};
use crate::error::ProviderError;

const PROVIDER: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-pro".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct GeminiClient {
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Build the client; the HTTP client carries the configured timeout.
    pub fn new(settings: GeminiSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source,
            })?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.model
        )
    }
}

// --- Request types ---

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl CaptionGenerator for GeminiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn caption(&self, image: &GeneratedImage, prompt: &str) -> Result<String, ProviderError> {
        let start = Instant::now();

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type.clone(),
                            data: image.base64(),
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source: source.without_url(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %truncate_body(&text, 500), "Gemini returned an error");
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                body: truncate_body(&text, 500),
            });
        }

        let parsed: GenerateResponse =
            resp.json().await.map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: format!("failed to parse response: {}", e.without_url()),
            })?;

        let caption = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let caption = caption.trim().to_string();
        if caption.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "no caption text in response".to_string(),
            });
        }

        tracing::info!(
            model = %self.settings.model,
            chars = caption.chars().count(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Caption generated"
        );

        Ok(caption)
    }
}
