pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::pipeline::UploadPipeline;
use crate::services::pipeline::resolver::UrlResolver;
use crate::services::process::ToolRunner;
use crate::services::record_store::{RecordStore, SeaOrmRecordStore};
use crate::services::storage::StorageService;
use crate::services::thumbnails::ThumbnailService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::videos::create_video,
        api::handlers::videos::list_videos,
        api::handlers::videos::get_video,
        api::handlers::videos::upload_video,
        api::handlers::thumbnails::upload_thumbnail,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::videos::VideoResponse,
            api::handlers::videos::CreateVideoRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "videos", description = "Video records and uploads"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub records: Arc<dyn RecordStore>,
    pub pipeline: Arc<UploadPipeline>,
    pub thumbnails: Arc<ThumbnailService>,
    pub resolver: Arc<UrlResolver>,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the services around one database, object store and tool runner.
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        runner: Arc<dyn ToolRunner>,
        config: AppConfig,
    ) -> Self {
        let records: Arc<dyn RecordStore> = Arc::new(SeaOrmRecordStore::new(db.clone()));
        let pipeline = Arc::new(UploadPipeline::new(
            config.pipeline(),
            runner,
            storage.clone(),
            records.clone(),
        ));
        let thumbnails = Arc::new(ThumbnailService::new(
            config.assets_root.clone(),
            config.public_base_url.clone(),
            records.clone(),
        ));

        Self {
            db,
            storage,
            records,
            resolver: pipeline.resolver(),
            pipeline,
            thumbnails,
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    cors.allow_origin(origins)
}

pub fn create_app(state: AppState) -> Router {
    // Multipart framing adds a little on top of the file itself
    let video_body_limit = usize::try_from(state.config.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(1024 * 1024);
    let thumbnail_body_limit = usize::try_from(state.config.max_thumbnail_size)
        .unwrap_or(usize::MAX)
        .saturating_add(1024 * 1024);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .nest_service("/assets", ServeDir::new(&state.config.assets_root))
        .route(
            "/api/videos",
            get(api::handlers::videos::list_videos)
                .post(api::handlers::videos::create_video)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/api/videos/:id",
            get(api::handlers::videos::get_video).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/api/video_upload/:id",
            post(api::handlers::videos::upload_video)
                .layer(DefaultBodyLimit::max(video_body_limit))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/api/thumbnail_upload/:id",
            post(api::handlers::thumbnails::upload_thumbnail)
                .layer(DefaultBodyLimit::max(thumbnail_body_limit))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}
