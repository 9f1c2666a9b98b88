//! video-vault - A local binary store for recorded video
//!
//! This crate provides:
//! - A versioned, transactional redb store for video records and their bytes
//! - Lossless conversion between playable payloads and stored byte buffers
//! - Thumbnail extraction and playback probing via ffmpeg
//! - Process-local access handles with scoped release

pub mod access;
pub mod codec;
pub mod config;
pub mod media;
pub mod state_machine;
pub mod storage;
pub mod store;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use access::AccessHandles;
use config::Config;
use media::{FfmpegFrameSource, ThumbnailGenerator};
use store::VideoStore;

/// Everything a front end needs to drive the store
pub struct AppState {
    pub config: Config,
    pub store: VideoStore,
    pub handles: Arc<AccessHandles>,
    pub thumbnails: ThumbnailGenerator,
}

impl AppState {
    /// Wire up an uninitialized store and an ffmpeg-backed generator from `config`.
    pub fn new(config: Config) -> Self {
        let handles = Arc::new(AccessHandles::new());
        let source = FfmpegFrameSource::new(&config.media.ffmpeg_path, &config.media.ffprobe_path);
        let thumbnails = ThumbnailGenerator::new(
            Arc::new(source),
            Arc::clone(&handles),
            config.thumbnail_options(),
        );
        Self {
            store: VideoStore::new(config.store_config()),
            config,
            handles,
            thumbnails,
        }
    }
}
