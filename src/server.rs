//! HTTP surface: router construction and the generation endpoint.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::middleware;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::{ApiError, MISSING_FIELDS};
use crate::pipeline::{CreativePipeline, CreativeRequest};
use crate::rate_limit::{limit_by_ip, RateLimiter};

/// Room for the text fields and multipart framing on top of the image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: CreativePipeline,
}

/// Settings for [`build_router`].
pub struct RouterOptions {
    pub max_upload_bytes: usize,
    pub limiter: RateLimiter,
    /// Static front-end served for every non-API path.
    pub public_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreativeResponse {
    pub new_image_url: String,
    pub new_caption: String,
    pub processing_time_ms: u64,
}

/// Text and file fields collected from the multipart body.
#[derive(Default)]
struct CreativeForm {
    title: Option<String>,
    style_prompt: Option<String>,
    categories: Option<String>,
    image: Option<Vec<u8>>,
}

impl CreativeForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = CreativeForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                "stylePrompt" => form.style_prompt = Some(field.text().await?),
                "categories" => form.categories = Some(field.text().await?),
                "image" => form.image = Some(field.bytes().await?.to_vec()),
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    fn into_request(self) -> Result<CreativeRequest, ApiError> {
        let title = non_blank(self.title);
        let style = non_blank(self.style_prompt);
        let image = self.image.filter(|bytes| !bytes.is_empty());

        let (Some(title), Some(style), Some(image)) = (title, style, image) else {
            return Err(ApiError::BadRequest(MISSING_FIELDS.to_string()));
        };

        Ok(CreativeRequest {
            title,
            style,
            categories: parse_categories(self.categories.as_deref())?,
            image,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Categories arrive as a JSON array of strings; absent or blank means none.
fn parse_categories(raw: Option<&str>) -> Result<Vec<String>, ApiError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };
    let categories: Vec<String> = serde_json::from_str(raw).map_err(|_| {
        ApiError::BadRequest("categories must be a JSON array of strings.".to_string())
    })?;
    Ok(categories
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}

/// POST /api/generate-creative
///
/// Multipart fields `image`, `title`, `stylePrompt` and optional
/// `categories`. Responds with the stylized image as a data URL and its
/// caption.
pub async fn generate_creative(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CreativeResponse>, ApiError> {
    let request = CreativeForm::read(multipart?).await?.into_request()?;
    tracing::info!(
        title = %request.title,
        categories = request.categories.len(),
        "Creative request received"
    );

    let output = state.pipeline.run(request).await?;

    Ok(Json(CreativeResponse {
        new_image_url: output.image_data_url,
        new_caption: output.caption,
        processing_time_ms: output.elapsed_ms,
    }))
}

/// Build the full router: rate-limited API plus optional static front-end.
pub fn build_router(pipeline: CreativePipeline, options: RouterOptions) -> Router {
    let api_routes = Router::new()
        .route("/api/generate-creative", post(generate_creative))
        .route_layer(middleware::from_fn_with_state(options.limiter, limit_by_ip))
        .layer(DefaultBodyLimit::max(
            options.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES),
        ))
        .with_state(AppState { pipeline });

    let mut router = Router::new().merge(api_routes);

    if let Some(dir) = options.public_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(CorsLayer::permissive())
}

/// Bind `addr` and serve `router` in the background, returning the bound address.
pub async fn start_server(router: Router, addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;

    tokio::spawn(async move {
        let service = router.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            tracing::error!(error = %e, "Server stopped");
        }
    });

    Ok(bound)
}
