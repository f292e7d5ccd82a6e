use crate::config::AppConfig;
use crate::services::storage::S3StorageService;
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<S3StorageService>> {
    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        config.s3_endpoint.as_deref().unwrap_or("aws"),
        config.s3_bucket
    );

    let mut loader = aws_config::from_env().region(Region::new(config.s3_region.clone()));
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(access_key), Some(secret_key)) = (&config.s3_access_key, &config.s3_secret_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }
    let aws_config = loader.load().await;

    // MinIO and most S3-compatible stores only support path-style addressing
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    let client = aws_sdk_s3::Client::from_conf(s3_config);

    if client
        .head_bucket()
        .bucket(&config.s3_bucket)
        .send()
        .await
        .is_err()
    {
        info!("🪣 Bucket '{}' not reachable, attempting to create it", config.s3_bucket);
        if let Err(e) = client.create_bucket().bucket(&config.s3_bucket).send().await {
            tracing::warn!(
                "Could not create bucket '{}': {}",
                config.s3_bucket,
                aws_sdk_s3::error::DisplayErrorContext(&e)
            );
        }
    }

    Ok(Arc::new(S3StorageService::new(client)))
}
