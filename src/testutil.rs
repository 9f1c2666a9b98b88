//! Shared test helpers for video-vault unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};

use crate::codec::Payload;
use crate::media::{DecodeSession, FrameSource, MediaError, MediaInfo};
use crate::storage::models::{CaptureMode, VideoMetadata};
use crate::store::{StoreConfig, VideoStore};

/// Create a store backed by a temporary directory.
pub fn test_store(temp_dir: &tempfile::TempDir) -> VideoStore {
    VideoStore::new(StoreConfig {
        data_dir: temp_dir.path().join("data"),
        schema_version: 1,
    })
}

pub fn sample_payload(len: usize) -> Payload {
    Payload::new(vec![0xabu8; len], "video/webm")
}

pub fn sample_metadata(id: u64, title: &str, duration_seconds: f64) -> VideoMetadata {
    VideoMetadata::new(id, title, duration_seconds, CaptureMode::Screen)
}

/// Decoder producing a flat-colour frame of fixed size; records every seek.
pub struct SyntheticSource {
    info: MediaInfo,
    seeks: Arc<Mutex<Vec<Duration>>>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, duration_seconds: f64) -> Self {
        Self {
            info: MediaInfo {
                width,
                height,
                duration_seconds,
            },
            seeks: Default::default(),
        }
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.seeks.lock().unwrap().clone()
    }
}

struct SyntheticSession {
    info: MediaInfo,
    seeks: Arc<Mutex<Vec<Duration>>>,
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn open(&self, _payload: &Payload) -> Result<Box<dyn DecodeSession>, MediaError> {
        Ok(Box::new(SyntheticSession {
            info: self.info,
            seeks: Arc::clone(&self.seeks),
        }))
    }
}

#[async_trait]
impl DecodeSession for SyntheticSession {
    fn info(&self) -> MediaInfo {
        self.info
    }

    async fn frame_at(&mut self, position: Duration) -> Result<DynamicImage, MediaError> {
        self.seeks.lock().unwrap().push(position);
        let frame = RgbImage::from_pixel(self.info.width, self.info.height, Rgb([40, 90, 160]));
        Ok(DynamicImage::ImageRgb8(frame))
    }
}

/// Decoder that rejects every payload.
pub struct UndecodableSource;

#[async_trait]
impl FrameSource for UndecodableSource {
    async fn open(&self, payload: &Payload) -> Result<Box<dyn DecodeSession>, MediaError> {
        Err(MediaError::Decode(format!(
            "unsupported content type {}",
            payload.content_type()
        )))
    }
}

/// Decoder that never finishes opening.
pub struct PendingSource;

#[async_trait]
impl FrameSource for PendingSource {
    async fn open(&self, _payload: &Payload) -> Result<Box<dyn DecodeSession>, MediaError> {
        std::future::pending().await
    }
}
