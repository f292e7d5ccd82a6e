use super::videos::{VideoResponse, parse_video_id};
use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::CurrentUser;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

#[utoipa::path(
    post,
    path = "/api/thumbnail_upload/{id}",
    request_body(content = Multipart, description = "JPEG or PNG image in the `thumbnail` field", content_type = "multipart/form-data"),
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Thumbnail stored", body = VideoResponse),
        (status = 400, description = "Unsupported media type or invalid request"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "Thumbnail too large")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, AppError> {
    let result: Result<Json<VideoResponse>, AppError> = async {
        let video_id = parse_video_id(&id)?;

        while let Some(field) = multipart.next_field().await? {
            if field.name() != Some("thumbnail") {
                continue;
            }

            let content_type = field.content_type().unwrap_or_default().to_string();
            let body = StreamReader::new(field.map_err(std::io::Error::other));

            let video = state
                .thumbnails
                .save(
                    body,
                    &content_type,
                    video_id,
                    user_id,
                    state.config.max_thumbnail_size,
                )
                .await?;

            return Ok(Json(VideoResponse::present(video, &state.resolver).await?));
        }

        Err(AppError::BadRequest("Missing thumbnail field".to_string()))
    }
    .await;

    if let Err(e) = &result {
        tracing::warn!("Thumbnail upload failed early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
    }
    result
}
