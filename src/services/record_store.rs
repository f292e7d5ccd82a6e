use crate::entities::{prelude::*, videos};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, Unchanged,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Video {0} not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

/// Video metadata persistence: ownership, titles and the stored URLs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_video(&self, id: Uuid) -> Result<videos::Model, RecordError>;

    /// Writes every mutable field of `video` back and bumps `updated_at`.
    /// Last write wins.
    async fn update_video(&self, video: videos::Model) -> Result<videos::Model, RecordError>;

    async fn create_video(&self, new: NewVideo) -> Result<videos::Model, RecordError>;

    async fn list_videos_for_user(&self, user_id: Uuid) -> Result<Vec<videos::Model>, RecordError>;
}

pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn get_video(&self, id: Uuid) -> Result<videos::Model, RecordError> {
        Videos::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(RecordError::NotFound(id))
    }

    async fn update_video(&self, video: videos::Model) -> Result<videos::Model, RecordError> {
        let id = video.id;
        let active = videos::ActiveModel {
            id: Unchanged(video.id),
            user_id: Set(video.user_id),
            title: Set(video.title),
            description: Set(video.description),
            thumbnail_url: Set(video.thumbnail_url),
            video_url: Set(video.video_url),
            created_at: Unchanged(video.created_at),
            updated_at: Set(Utc::now()),
        };

        match active.update(&self.db).await {
            Ok(model) => Ok(model),
            Err(DbErr::RecordNotUpdated) => Err(RecordError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_video(&self, new: NewVideo) -> Result<videos::Model, RecordError> {
        let now = Utc::now();
        let active = videos::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            title: Set(new.title),
            description: Set(new.description),
            thumbnail_url: Set(None),
            video_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(active.insert(&self.db).await?)
    }

    async fn list_videos_for_user(&self, user_id: Uuid) -> Result<Vec<videos::Model>, RecordError> {
        Ok(Videos::find()
            .filter(videos::Column::UserId.eq(user_id))
            .order_by_desc(videos::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}
