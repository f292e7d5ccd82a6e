use axum::middleware::from_fn;
use clap::Parser;
use dotenvy::dotenv;
use rust_video_backend::api::middleware::request_id::{REQUEST_ID, request_id_middleware};
use rust_video_backend::config::AppConfig;
use rust_video_backend::infrastructure::{database, storage};
use rust_video_backend::services::pipeline::resolver::UrlPolicy;
use rust_video_backend::services::process::SubprocessRunner;
use rust_video_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Use local MinIO defaults instead of reading S3 settings from the environment
    #[arg(long)]
    development: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_video_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = if args.development {
        AppConfig::development()
    } else {
        AppConfig::from_env()
    };
    if let Some(port) = args.port {
        config.port = port;
    }

    info!("🚀 Starting Rust Video Backend...");
    info!(
        "🎞️  Pipeline: Max Size={}MB, Staging={}, ffprobe={}, ffmpeg={}",
        config.max_upload_size / 1024 / 1024,
        config.staging_dir.display(),
        config.ffprobe_path,
        config.ffmpeg_path
    );
    match &config.url_policy {
        UrlPolicy::Direct { base_url } => info!("🔗 URL policy: direct ({})", base_url),
        UrlPolicy::Signed { expires_in } => {
            info!("🔏 URL policy: signed (expires in {:?})", expires_in)
        }
    }

    // 2. Setup Infrastructure
    tokio::fs::create_dir_all(&config.staging_dir).await?;
    tokio::fs::create_dir_all(&config.assets_root).await?;

    let db = database::setup_database(&config.database_url).await?;
    let storage_service = storage::setup_storage(&config).await?;

    let state = AppState::new(db, storage_service, Arc::new(SubprocessRunner), config.clone());

    // 3. HTTP tracing, keyed by the request id assigned below it
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state)
        .layer(trace_layer)
        .layer(from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", config.port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", config.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
        return Err(e.into());
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("🛑 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
