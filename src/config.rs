//! Runtime configuration.
//!
//! Every setting is a command-line flag that falls back to an environment
//! variable, so a `.env` file (loaded by `main`) is enough to run the server.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;
use crate::providers::{GeminiSettings, StabilitySettings};

/// Largest accepted `max_upload_mb`; keeps the byte limit well inside `usize`.
pub const MAX_UPLOAD_MB_LIMIT: usize = 1024;

/// Stylize a photo and caption the result.
#[derive(Parser, Debug, Clone)]
#[command(name = "caption-studio", author, version, about, long_about = None)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Google Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Gemini model used for captions
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-pro")]
    pub gemini_model: String,

    #[arg(
        long,
        env = "GEMINI_API_BASE",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_api_base: String,

    /// Stability AI API key
    #[arg(long, env = "STABILITY_API_KEY", hide_env_values = true)]
    pub stability_api_key: String,

    /// Stability engine used for image-to-image
    #[arg(
        long,
        env = "STABILITY_ENGINE",
        default_value = "stable-diffusion-xl-1024-v1-0"
    )]
    pub stability_engine: String,

    #[arg(long, env = "STABILITY_API_HOST", default_value = "https://api.stability.ai")]
    pub stability_api_host: String,

    /// Influence of the uploaded photo on the result (0.0-1.0)
    #[arg(long, env = "IMAGE_STRENGTH", default_value_t = 0.35)]
    pub image_strength: f32,

    /// How strictly the image model follows the prompt (0-35)
    #[arg(long, env = "CFG_SCALE", default_value_t = 7.0)]
    pub cfg_scale: f32,

    /// Diffusion steps (10-50)
    #[arg(long, env = "STEPS", default_value_t = 30)]
    pub steps: u32,

    /// Maximum upload size in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 10)]
    pub max_upload_mb: usize,

    /// Requests allowed per client within one rate-limit window
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 5)]
    pub rate_limit_max: usize,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 60)]
    pub rate_limit_window_secs: u64,

    /// Timeout for each call to an external AI service
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Directory with the browser front-end
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long, env = "VERBOSE")]
    pub verbose: bool,

    /// Output logs in JSON format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Check value ranges that clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("GEMINI_API_KEY must not be empty".into()));
        }
        if self.stability_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "STABILITY_API_KEY must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.image_strength) {
            return Err(ConfigError::Invalid(
                "image_strength must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=35.0).contains(&self.cfg_scale) {
            return Err(ConfigError::Invalid(
                "cfg_scale must be between 0 and 35".into(),
            ));
        }
        if !(10..=50).contains(&self.steps) {
            return Err(ConfigError::Invalid("steps must be between 10 and 50".into()));
        }
        if self.max_upload_mb == 0 || self.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_upload_mb must be between 1 and {MAX_UPLOAD_MB_LIMIT}"
            )));
        }
        if self.rate_limit_max == 0 {
            return Err(ConfigError::Invalid("rate_limit_max must be > 0".into()));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit_window_secs must be > 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn stability_settings(&self) -> StabilitySettings {
        StabilitySettings {
            api_key: self.stability_api_key.clone(),
            api_host: self.stability_api_host.clone(),
            engine: self.stability_engine.clone(),
            image_strength: self.image_strength,
            cfg_scale: self.cfg_scale,
            steps: self.steps,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self.gemini_api_key.clone(),
            api_base: self.gemini_api_base.clone(),
            model: self.gemini_model.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
