use crate::services::pipeline::PipelineConfig;
use crate::services::pipeline::resolver::{DEFAULT_SIGNED_URL_TTL, UrlPolicy};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration, read once at startup and handed down explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port for the API server (default: 8091)
    pub port: u16,

    /// Record store connection string
    pub database_url: String,

    /// JWT Secret Key
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,

    /// Maximum video upload size in bytes (default: 1 GB)
    pub max_upload_size: u64,

    /// Maximum thumbnail size in bytes (default: 10 MB)
    pub max_thumbnail_size: u64,

    /// Directory for scratch files of in-flight uploads
    pub staging_dir: PathBuf,

    /// Directory thumbnails are written to and served from
    pub assets_root: PathBuf,

    /// Externally visible base address of this server
    pub public_base_url: String,

    pub ffprobe_path: String,
    pub ffmpeg_path: String,

    /// Deadline for one ffprobe invocation (default: 30s)
    pub probe_timeout: Duration,

    /// Deadline for one ffmpeg remux (default: 10 min)
    pub remux_timeout: Duration,

    pub s3_bucket: String,
    pub s3_region: String,
    /// Custom endpoint for S3-compatible providers (MinIO etc.)
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,

    /// How stored videos are turned into URLs
    pub url_policy: UrlPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        let s3_bucket = "tubely".to_string();
        let s3_region = "us-east-1".to_string();
        Self {
            port: 8091,
            database_url: "sqlite://tubely.db?mode=rwc".to_string(),
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:8091".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:8091".to_string(),
            ],
            max_upload_size: 1 << 30,
            max_thumbnail_size: 10 << 20,
            staging_dir: env::temp_dir(),
            assets_root: PathBuf::from("./assets"),
            public_base_url: "http://localhost:8091".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            probe_timeout: Duration::from_secs(30),
            remux_timeout: Duration::from_secs(600),
            s3_bucket,
            s3_region,
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            url_policy: UrlPolicy::Signed {
                expires_in: DEFAULT_SIGNED_URL_TTL,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let s3_bucket = env::var("S3_BUCKET").unwrap_or(default.s3_bucket);
        let s3_region = env::var("S3_REGION").unwrap_or(default.s3_region);
        let s3_endpoint = env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty());

        let url_policy = match env::var("URL_POLICY")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            Ok("direct") => UrlPolicy::Direct {
                base_url: env::var("DIRECT_URL_BASE").unwrap_or_else(|_| {
                    default_direct_base(&s3_region, s3_endpoint.as_deref())
                }),
            },
            _ => UrlPolicy::Signed {
                expires_in: env::var("SIGNED_URL_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_SIGNED_URL_TTL),
            },
        };

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            max_thumbnail_size: env::var("MAX_THUMBNAIL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_thumbnail_size),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            assets_root: env::var("ASSETS_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.assets_root),

            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or(default.public_base_url),

            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(default.ffprobe_path),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),

            probe_timeout: env::var("PROBE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.probe_timeout),

            remux_timeout: env::var("REMUX_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.remux_timeout),

            s3_bucket,
            s3_region,
            s3_endpoint,
            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),
            url_policy,
        }
    }

    /// Create config for development (local MinIO, direct URLs)
    pub fn development() -> Self {
        let default = Self::default();
        let endpoint = "http://127.0.0.1:9000".to_string();
        Self {
            url_policy: UrlPolicy::Direct {
                base_url: default_direct_base(&default.s3_region, Some(endpoint.as_str())),
            },
            s3_endpoint: Some(endpoint),
            s3_access_key: Some("minioadmin".to_string()),
            s3_secret_key: Some("minioadmin".to_string()),
            ..default
        }
    }

    /// The slice of configuration the upload pipeline runs with.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            staging_dir: self.staging_dir.clone(),
            ffprobe_path: self.ffprobe_path.clone(),
            ffmpeg_path: self.ffmpeg_path.clone(),
            probe_timeout: self.probe_timeout,
            remux_timeout: self.remux_timeout,
            bucket: self.s3_bucket.clone(),
            url_policy: self.url_policy.clone(),
        }
    }
}

/// Path-style base for S3-compatible endpoints; AWS otherwise.
///
/// The resolver appends `/{bucket}/{key}`, so AWS uses the regional endpoint
/// rather than the virtual-hosted form.
fn default_direct_base(region: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => format!("https://s3.{}.amazonaws.com", region),
    }
}
