#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_video_backend::entities::videos;
use rust_video_backend::services::process::{ToolError, ToolOutput, ToolRunner};
use rust_video_backend::services::record_store::{NewVideo, RecordError, RecordStore};
use rust_video_backend::services::storage::{StorageError, StorageService};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub const FFPROBE: &str = "ffprobe";
pub const FFMPEG: &str = "ffmpeg";

pub fn probe_json(width: u32, height: u32) -> String {
    format!(
        r#"{{"streams":[{{"index":0,"codec_type":"video","width":{width},"height":{height}}},{{"index":1,"codec_type":"audio"}}]}}"#
    )
}

#[derive(Debug, Clone)]
pub enum ProbeBehaviour {
    Stdout(String),
    Exit(i32, String),
    NotInstalled,
}

#[derive(Debug, Clone)]
pub enum RemuxBehaviour {
    /// Writes `faststart:` followed by the input bytes to the output path
    Succeed,
    /// Leaves a partial output behind and exits non-zero
    FailAfterPartialWrite(String),
    NotInstalled,
}

/// Stands in for ffprobe and ffmpeg, keyed on the program name.
pub struct FakeToolRunner {
    pub probe: Mutex<ProbeBehaviour>,
    pub remux: Mutex<RemuxBehaviour>,
    pub calls: Mutex<Vec<(String, Vec<OsString>)>>,
}

impl FakeToolRunner {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            probe: Mutex::new(ProbeBehaviour::Stdout(probe_json(width, height))),
            remux: Mutex::new(RemuxBehaviour::Succeed),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_probe(self, behaviour: ProbeBehaviour) -> Self {
        *self.probe.lock().unwrap() = behaviour;
        self
    }

    pub fn with_remux(self, behaviour: RemuxBehaviour) -> Self {
        *self.remux.lock().unwrap() = behaviour;
        self
    }

    pub fn invoked(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == program)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn launch_error(program: &str) -> ToolError {
        ToolError::Launch {
            program: program.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
    }
}

fn success(stdout: Vec<u8>) -> ToolOutput {
    ToolOutput {
        success: true,
        exit_code: Some(0),
        stdout,
        stderr: Vec::new(),
    }
}

fn failure(code: i32, stderr: &str) -> ToolOutput {
    ToolOutput {
        success: false,
        exit_code: Some(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[async_trait]
impl ToolRunner for FakeToolRunner {
    async fn run(
        &self,
        program: &str,
        args: &[OsString],
        _timeout: Duration,
    ) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        match program {
            FFPROBE => {
                let behaviour = self.probe.lock().unwrap().clone();
                match behaviour {
                    ProbeBehaviour::Stdout(json) => Ok(success(json.into_bytes())),
                    ProbeBehaviour::Exit(code, stderr) => Ok(failure(code, &stderr)),
                    ProbeBehaviour::NotInstalled => Err(Self::launch_error(program)),
                }
            }
            FFMPEG => {
                let behaviour = self.remux.lock().unwrap().clone();
                let input_at = args.iter().position(|a| a == "-i").unwrap() + 1;
                let input = PathBuf::from(&args[input_at]);
                let output = PathBuf::from(args.last().unwrap());
                match behaviour {
                    RemuxBehaviour::Succeed => {
                        let mut data = b"faststart:".to_vec();
                        data.extend(std::fs::read(&input).unwrap());
                        std::fs::write(&output, data).unwrap();
                        Ok(success(Vec::new()))
                    }
                    RemuxBehaviour::FailAfterPartialWrite(stderr) => {
                        std::fs::write(&output, b"partial").unwrap();
                        Ok(failure(1, &stderr))
                    }
                    RemuxBehaviour::NotInstalled => Err(Self::launch_error(program)),
                }
            }
            other => Err(Self::launch_error(other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory object store. Presigned URLs embed a counter so two signatures
/// for the same object differ.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<(String, String), StoredObject>>,
    pub reject_uploads: AtomicBool,
    pub fail_signing: AtomicBool,
    pub signatures: AtomicU32,
}

impl MemoryStorage {
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn put_object_from_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected("AccessDenied: quota exceeded".into()));
        }
        let data = tokio::fs::read(path).await?;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(StorageError::Signing("credentials expired".into()));
        }
        let n = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://mock-s3.test/{bucket}/{key}?X-Amz-Expires={}&X-Amz-Signature={n:08x}",
            expires_in.as_secs()
        ))
    }

    async fn health_check(&self, _bucket: &str) -> bool {
        true
    }
}

/// In-memory record store with an injectable update failure.
#[derive(Default)]
pub struct MemoryRecords {
    pub videos: Mutex<HashMap<Uuid, videos::Model>>,
    pub fail_updates: AtomicBool,
}

impl MemoryRecords {
    pub fn insert(&self, user_id: Uuid) -> videos::Model {
        let now = Utc::now();
        let video = videos::Model {
            id: Uuid::new_v4(),
            user_id,
            title: "Boots".to_string(),
            description: Some("Boots on the ground".to_string()),
            thumbnail_url: None,
            video_url: None,
            created_at: now,
            updated_at: now,
        };
        self.videos.lock().unwrap().insert(video.id, video.clone());
        video
    }

    pub fn stored(&self, id: Uuid) -> videos::Model {
        self.videos.lock().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn get_video(&self, id: Uuid) -> Result<videos::Model, RecordError> {
        self.videos
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RecordError::NotFound(id))
    }

    async fn update_video(&self, mut video: videos::Model) -> Result<videos::Model, RecordError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RecordError::Database(sea_orm::DbErr::Custom(
                "database is locked".into(),
            )));
        }
        let mut videos = self.videos.lock().unwrap();
        if !videos.contains_key(&video.id) {
            return Err(RecordError::NotFound(video.id));
        }
        video.updated_at = Utc::now();
        videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn create_video(&self, new: NewVideo) -> Result<videos::Model, RecordError> {
        let video = self.insert(new.user_id);
        let video = videos::Model {
            title: new.title,
            description: new.description,
            ..video
        };
        self.videos.lock().unwrap().insert(video.id, video.clone());
        Ok(video)
    }

    async fn list_videos_for_user(&self, user_id: Uuid) -> Result<Vec<videos::Model>, RecordError> {
        Ok(self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Entries left in a staging directory.
pub fn leftover_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}
