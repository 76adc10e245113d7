//! Creative caption studio.
//!
//! Takes a photo, a style instruction and a title with optional tone
//! categories; returns a stylized version of the photo and a social-media
//! caption written for it.
//!
//! ```text
//! upload → normalize (SDXL canvas, PNG) → Stability image-to-image → Gemini caption → JSON
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod rate_limit;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ConfigError, NormalizeError, PipelineError, ProviderError};
pub use pipeline::{CreativeOutput, CreativePipeline, CreativeRequest};
pub use rate_limit::RateLimiter;
pub use server::{build_router, start_server, CreativeResponse, RouterOptions};
