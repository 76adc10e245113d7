//! The creative pipeline: normalize → stylize → caption.
//!
//! ```text
//! upload ──normalize──▶ PNG on SDXL canvas ──stylize──▶ stylized PNG ──caption──▶ text
//! ```
//!
//! Stages run strictly in sequence. The first failure aborts the run; there
//! are no retries and no partial results.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{NormalizeError, PipelineError};
use crate::normalize::normalize;
use crate::prompt::{caption_prompt, style_prompt};
use crate::providers::{CaptionGenerator, ImageGenerator};

/// Validated input for one pipeline run.
#[derive(Debug, Clone)]
pub struct CreativeRequest {
    pub title: String,
    pub style: String,
    pub categories: Vec<String>,
    pub image: Vec<u8>,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct CreativeOutput {
    /// Stylized image as a `data:` URL.
    pub image_data_url: String,
    pub caption: String,
    pub elapsed_ms: u64,
}

#[derive(Clone)]
pub struct CreativePipeline {
    generator: Arc<dyn ImageGenerator>,
    captioner: Arc<dyn CaptionGenerator>,
}

impl CreativePipeline {
    pub fn new(generator: Arc<dyn ImageGenerator>, captioner: Arc<dyn CaptionGenerator>) -> Self {
        Self {
            generator,
            captioner,
        }
    }

    pub async fn run(&self, request: CreativeRequest) -> Result<CreativeOutput, PipelineError> {
        let start = Instant::now();

        tracing::info!(bytes = request.image.len(), "Normalizing upload");
        // Decoding and Lanczos resizing are CPU-bound; keep them off the reactor.
        let upload = request.image;
        let normalized = tokio::task::spawn_blocking(move || normalize(&upload))
            .await
            .map_err(NormalizeError::Join)??;
        tracing::info!(
            width = normalized.width,
            height = normalized.height,
            bytes = normalized.bytes.len(),
            "Upload normalized"
        );

        tracing::info!(provider = self.generator.name(), "Requesting stylized image");
        let prompt = style_prompt(&request.style);
        let stylized = self
            .generator
            .stylize(&normalized, &prompt)
            .await
            .map_err(PipelineError::Generation)?;
        tracing::info!(
            bytes = stylized.bytes.len(),
            seed = ?stylized.seed,
            "Stylized image received"
        );

        tracing::info!(provider = self.captioner.name(), "Requesting caption");
        let prompt = caption_prompt(&request.title, &request.categories);
        let caption = self
            .captioner
            .caption(&stylized, &prompt)
            .await
            .map_err(PipelineError::Caption)?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(elapsed_ms, "Creative pipeline finished");

        Ok(CreativeOutput {
            image_data_url: stylized.data_url(),
            caption,
            elapsed_ms,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory providers for pipeline and handler tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::ProviderError;
    use crate::normalize::NormalizedImage;
    use crate::prompt::StylePrompt;
    use crate::providers::{CaptionGenerator, GeneratedImage, ImageGenerator};

    #[derive(Default)]
    pub struct MockGenerator {
        pub fail: bool,
        pub calls: AtomicUsize,
        pub last_prompt: Mutex<Option<StylePrompt>>,
        pub last_size: Mutex<Option<(u32, u32)>>,
    }

    #[async_trait]
    impl ImageGenerator for MockGenerator {
        fn name(&self) -> &str {
            "mock-generator"
        }

        async fn stylize(
            &self,
            image: &NormalizedImage,
            prompt: &StylePrompt,
        ) -> Result<GeneratedImage, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.clone());
            *self.last_size.lock().unwrap() = Some((image.width, image.height));
            if self.fail {
                return Err(ProviderError::Http {
                    provider: "mock-generator",
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(GeneratedImage::png(vec![7, 7, 7]))
        }
    }

    #[derive(Default)]
    pub struct MockCaptioner {
        pub fail: bool,
        pub calls: AtomicUsize,
        pub last_prompt: Mutex<Option<String>>,
        pub last_image: Mutex<Option<Vec<u8>>>,
    }

    #[async_trait]
    impl CaptionGenerator for MockCaptioner {
        fn name(&self) -> &str {
            "mock-captioner"
        }

        async fn caption(
            &self,
            image: &GeneratedImage,
            prompt: &str,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            *self.last_image.lock().unwrap() = Some(image.bytes.clone());
            if self.fail {
                return Err(ProviderError::InvalidResponse {
                    provider: "mock-captioner",
                    message: "empty".into(),
                });
            }
            Ok("A bold new look #style".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockCaptioner, MockGenerator};
    use super::*;
    use image::{DynamicImage, ImageOutputFormat};
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    fn png_upload(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn request(image: Vec<u8>) -> CreativeRequest {
        CreativeRequest {
            title: "Morning coffee".into(),
            style: "anime style".into(),
            categories: vec!["Cozy".into()],
            image,
        }
    }

    #[tokio::test]
    async fn test_run_chains_both_stages() {
        let generator = Arc::new(MockGenerator::default());
        let captioner = Arc::new(MockCaptioner::default());
        let pipeline = CreativePipeline::new(generator.clone(), captioner.clone());

        let output = pipeline.run(request(png_upload(30, 40))).await.unwrap();

        assert_eq!(output.image_data_url, "data:image/png;base64,BwcH");
        assert_eq!(output.caption, "A bold new look #style");

        let style = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert!(style.positive.starts_with("anime style, masterpiece"));
        assert_eq!(*generator.last_size.lock().unwrap(), Some((896, 1152)));

        // The captioner sees the stylized image, not the upload.
        assert_eq!(*captioner.last_image.lock().unwrap(), Some(vec![7, 7, 7]));
        let prompt = captioner.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("\"Morning coffee\""));
        assert!(prompt.contains("Cozy"));
    }

    #[tokio::test]
    async fn test_bad_upload_stops_before_generation() {
        let generator = Arc::new(MockGenerator::default());
        let captioner = Arc::new(MockCaptioner::default());
        let pipeline = CreativePipeline::new(generator.clone(), captioner.clone());

        let err = pipeline.run(request(b"nope".to_vec())).await.unwrap_err();

        assert!(matches!(err, PipelineError::Normalize(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_skips_caption() {
        let generator = Arc::new(MockGenerator {
            fail: true,
            ..Default::default()
        });
        let captioner = Arc::new(MockCaptioner::default());
        let pipeline = CreativePipeline::new(generator.clone(), captioner.clone());

        let err = pipeline.run(request(png_upload(8, 8))).await.unwrap_err();

        assert!(matches!(err, PipelineError::Generation(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_caption_failure_aborts() {
        let generator = Arc::new(MockGenerator::default());
        let captioner = Arc::new(MockCaptioner {
            fail: true,
            ..Default::default()
        });
        let pipeline = CreativePipeline::new(generator, captioner.clone());

        let err = pipeline.run(request(png_upload(8, 8))).await.unwrap_err();

        assert!(matches!(err, PipelineError::Caption(_)));
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 1);
    }
}
