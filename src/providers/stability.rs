//! Stability AI image-to-image client (v1 generation API).
//!
//! Sends the normalized PNG as `init_image` in a multipart form together with
//! a weighted positive/negative prompt pair.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{truncate_body, GeneratedImage, ImageGenerator};
use crate::error::ProviderError;
use crate::normalize::NormalizedImage;
use crate::prompt::StylePrompt;

const PROVIDER: &str = "stability";

/// Connection and sampling parameters for the Stability client.
#[derive(Debug, Clone)]
pub struct StabilitySettings {
    pub api_key: String,
    pub api_host: String,
    pub engine: String,
    /// How much the init image shapes the result (0 = ignore, 1 = copy).
    pub image_strength: f32,
    pub cfg_scale: f32,
    pub steps: u32,
    pub timeout: Duration,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_host: "https://api.stability.ai".to_string(),
            engine: "stable-diffusion-xl-1024-v1-0".to_string(),
            image_strength: 0.35,
            cfg_scale: 7.0,
            steps: 30,
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct StabilityClient {
    settings: StabilitySettings,
    client: reqwest::Client,
}

impl StabilityClient {
    /// Build the client; the HTTP client carries the configured timeout.
    pub fn new(settings: StabilitySettings) -> Result<Self, ProviderError> {
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
            "{}/v1/generation/{}/image-to-image",
            self.settings.api_host.trim_end_matches('/'),
            self.settings.engine
        )
    }

    fn form(&self, image: &NormalizedImage, prompt: &StylePrompt) -> Result<Form, ProviderError> {
        let init_image = Part::bytes(image.bytes.clone())
            .file_name("init_image.png")
            .mime_str(NormalizedImage::MIME_TYPE)
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source,
            })?;

        Ok(Form::new()
            .part("init_image", init_image)
            .text("text_prompts[0][text]", prompt.positive.clone())
            .text("text_prompts[0][weight]", "1")
            .text("text_prompts[1][text]", prompt.negative.clone())
            .text("text_prompts[1][weight]", "-1")
            .text("init_image_mode", "IMAGE_STRENGTH")
            .text("image_strength", self.settings.image_strength.to_string())
            .text("cfg_scale", self.settings.cfg_scale.to_string())
            .text("samples", "1")
            .text("steps", self.settings.steps.to_string()))
    }
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerationResponse {
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
struct Artifact {
    base64: String,
    seed: Option<u64>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[async_trait]
impl ImageGenerator for StabilityClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn stylize(
        &self,
        image: &NormalizedImage,
        prompt: &StylePrompt,
    ) -> Result<GeneratedImage, ProviderError> {
        let start = Instant::now();
        let endpoint = self.endpoint();

        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.settings.api_key)
            .header("Accept", "application/json")
            .multipart(self.form(image, prompt)?)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %truncate_body(&body, 500), "Stability returned an error");
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                body: truncate_body(&body, 500),
            });
        }

        let parsed: GenerationResponse =
            resp.json().await.map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: format!("failed to parse response: {e}"),
            })?;

        let artifact = parsed
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "no artifacts in response".to_string(),
            })?;

        if artifact.finish_reason.as_deref() == Some("CONTENT_FILTERED") {
            tracing::warn!("Stability flagged the generated image as CONTENT_FILTERED");
        }

        let bytes = BASE64
            .decode(artifact.base64.trim())
            .map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: format!("artifact is not valid base64: {e}"),
            })?;

        tracing::info!(
            engine = %self.settings.engine,
            bytes = bytes.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Stylized image generated"
        );

        Ok(GeneratedImage {
            seed: artifact.seed,
            ..GeneratedImage::png(bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, Path};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Option<(String, HeaderMap, HashMap<String, Vec<u8>>)>>>;

    /// Start a stand-in for the Stability API that records the request and
    /// answers with `status` and `body`.
    async fn spawn_stub(status: StatusCode, body: serde_json::Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let sink = captured.clone();

        let app = Router::new().route(
            "/v1/generation/:engine/image-to-image",
            post(
                move |Path(engine): Path<String>, headers: HeaderMap, mut multipart: Multipart| {
                    let sink = sink.clone();
                    let body = body.clone();
                    async move {
                        let mut fields = HashMap::new();
                        while let Some(field) = multipart.next_field().await.unwrap() {
                            let name = field.name().unwrap().to_string();
                            fields.insert(name, field.bytes().await.unwrap().to_vec());
                        }
                        *sink.lock().unwrap() = Some((engine, headers, fields));
                        (status, Json(body))
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn client_for(host: &str) -> StabilityClient {
        StabilityClient::new(StabilitySettings {
            api_key: "sk-test".to_string(),
            api_host: host.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn sample_image() -> NormalizedImage {
        NormalizedImage {
            bytes: b"\x89PNG fake".to_vec(),
            width: 1024,
            height: 1024,
        }
    }

    #[tokio::test]
    async fn test_stylize_sends_form_and_decodes_artifact() {
        let (host, captured) = spawn_stub(
            StatusCode::OK,
            serde_json::json!({
                "artifacts": [{ "base64": "AQID", "seed": 42, "finishReason": "SUCCESS" }]
            }),
        )
        .await;

        let client = client_for(&host);
        let prompt = crate::prompt::style_prompt("oil painting");
        let image = client.stylize(&sample_image(), &prompt).await.unwrap();

        assert_eq!(image.bytes, vec![1, 2, 3]);
        assert_eq!(image.seed, Some(42));
        assert_eq!(image.mime_type, "image/png");

        let (engine, headers, fields) = captured.lock().unwrap().take().unwrap();
        assert_eq!(engine, "stable-diffusion-xl-1024-v1-0");
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(headers["accept"], "application/json");

        let text = |k: &str| String::from_utf8(fields[k].clone()).unwrap();
        assert_eq!(fields["init_image"], b"\x89PNG fake".to_vec());
        assert_eq!(text("text_prompts[0][text]"), prompt.positive);
        assert_eq!(text("text_prompts[1][text]"), prompt.negative);
        assert_eq!(text("text_prompts[1][weight]"), "-1");
        assert_eq!(text("init_image_mode"), "IMAGE_STRENGTH");
        assert_eq!(text("image_strength"), "0.35");
        assert_eq!(text("cfg_scale"), "7");
        assert_eq!(text("samples"), "1");
        assert_eq!(text("steps"), "30");
    }

    #[tokio::test]
    async fn test_stylize_surfaces_http_error() {
        let (host, _) = spawn_stub(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "message": "invalid key" }),
        )
        .await;

        let err = client_for(&host)
            .stylize(&sample_image(), &crate::prompt::style_prompt("x"))
            .await
            .unwrap_err();

        match err {
            ProviderError::Http { status, body, .. } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid key"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stylize_rejects_empty_artifacts() {
        let (host, _) = spawn_stub(StatusCode::OK, serde_json::json!({ "artifacts": [] })).await;

        let err = client_for(&host)
            .stylize(&sample_image(), &crate::prompt::style_prompt("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_stylize_rejects_invalid_base64() {
        let (host, _) = spawn_stub(
            StatusCode::OK,
            serde_json::json!({ "artifacts": [{ "base64": "not*base64!", "seed": 1 }] }),
        )
        .await;

        let err = client_for(&host)
            .stylize(&sample_image(), &crate::prompt::style_prompt("x"))
            .await
            .unwrap_err();
        match err {
            ProviderError::InvalidResponse { message, .. } => assert!(message.contains("base64")),
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stylize_passes_content_filtered_through() {
        let (host, _) = spawn_stub(
            StatusCode::OK,
            serde_json::json!({
                "artifacts": [{ "base64": "AQID", "seed": 9, "finishReason": "CONTENT_FILTERED" }]
            }),
        )
        .await;

        let image = client_for(&host)
            .stylize(&sample_image(), &crate::prompt::style_prompt("x"))
            .await
            .unwrap();
        assert_eq!(image.bytes, vec![1, 2, 3]);
        assert_eq!(image.seed, Some(9));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = client_for("https://api.stability.ai/");
        assert_eq!(
            client.endpoint(),
            "https://api.stability.ai/v1/generation/stable-diffusion-xl-1024-v1-0/image-to-image"
        );
    }
}
