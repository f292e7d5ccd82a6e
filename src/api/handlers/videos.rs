use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::CurrentUser;
use crate::entities::videos;
use crate::services::pipeline::resolver::UrlResolver;
use crate::services::pipeline::{UploadRequest, authorize_owner};
use crate::services::record_store::NewVideo;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Direct URL, or a freshly signed URL valid for a limited time
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoResponse {
    /// Builds the response, re-presenting the stored video reference.
    pub async fn present(video: videos::Model, resolver: &UrlResolver) -> Result<Self, AppError> {
        let video_url = resolver.present(video.video_url.as_deref()).await?;
        Ok(Self {
            video_url,
            ..Self::from_presented(video)
        })
    }

    /// For records whose `video_url` is already caller-facing.
    pub fn from_presented(video: videos::Model) -> Self {
        Self {
            id: video.id,
            user_id: video.user_id,
            title: video.title,
            description: video.description,
            thumbnail_url: video.thumbnail_url,
            video_url: video.video_url,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateVideoRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

pub(crate) fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid ID".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video draft created", body = VideoResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn create_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<(axum::http::StatusCode, Json<VideoResponse>), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let video = state
        .records
        .create_video(NewVideo {
            user_id,
            title: payload.title,
            description: payload.description,
        })
        .await?;

    tracing::info!(video_id = %video.id, %user_id, "Video draft created");
    Ok((
        axum::http::StatusCode::CREATED,
        Json(VideoResponse::from_presented(video)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/videos",
    responses(
        (status = 200, description = "Videos owned by the caller", body = Vec<VideoResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn list_videos(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<VideoResponse>>, AppError> {
    let records = state.records.list_videos_for_user(user_id).await?;

    let mut response = Vec::with_capacity(records.len());
    for video in records {
        response.push(VideoResponse::present(video, &state.resolver).await?);
    }
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/videos/{id}",
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video found", body = VideoResponse),
        (status = 401, description = "Not the owner of this video"),
        (status = 404, description = "Video not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn get_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let video_id = parse_video_id(&id)?;
    let video = authorize_owner(state.records.as_ref(), video_id, user_id).await?;
    Ok(Json(VideoResponse::present(video, &state.resolver).await?))
}

#[utoipa::path(
    post,
    path = "/api/video_upload/{id}",
    request_body(content = Multipart, description = "MP4 file in the `video` field", content_type = "multipart/form-data"),
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video processed and stored", body = VideoResponse),
        (status = 400, description = "Unsupported media type or invalid request"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Processing or storage failure")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, AppError> {
    let result: Result<Json<VideoResponse>, AppError> = async {
        let video_id = parse_video_id(&id)?;

        while let Some(field) = multipart.next_field().await? {
            if field.name() != Some("video") {
                continue;
            }

            let content_type = field.content_type().unwrap_or_default().to_string();
            let body = StreamReader::new(field.map_err(std::io::Error::other));

            let outcome = state
                .pipeline
                .run(UploadRequest {
                    body,
                    content_type,
                    video_id,
                    requester: user_id,
                    max_bytes: state.config.max_upload_size,
                })
                .await?;

            return Ok(Json(VideoResponse::from_presented(outcome.video)));
        }

        Err(AppError::BadRequest("Missing video field".to_string()))
    }
    .await;

    if let Err(e) = &result {
        // Drain what is left so the client sees our response instead of a reset
        tracing::warn!("Video upload failed early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
    }
    result
}
