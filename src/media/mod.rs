//! Thumbnail extraction and playback probing.
//!
//! Decoding goes through a [`FrameSource`], which opens a [`DecodeSession`]
//! for one payload. Sessions own whatever the decoder allocated and release it
//! when dropped, so every exit path (success, error, timeout) cleans up.

mod ffmpeg;
mod thumbnail;

pub use ffmpeg::FfmpegFrameSource;
pub use thumbnail::{
    encode_thumbnail, fit_within, seek_target, ThumbnailGenerator, ThumbnailOptions,
};

use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use thiserror::Error;

use crate::codec::Payload;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Payload is empty")]
    EmptyPayload,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Probe output error: {0}")]
    Probe(#[from] serde_json::Error),
}

/// Intrinsic properties of a decoded payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Zero when the container does not report a duration.
    pub duration_seconds: f64,
}

impl MediaInfo {
    /// A payload is playable once it reports a finite, positive duration.
    pub fn is_playable(&self) -> bool {
        self.duration_seconds.is_finite() && self.duration_seconds > 0.0
    }
}

/// Something that can open a payload for decoding.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Open a decode session. Resolves once dimensions and duration are known.
    async fn open(&self, payload: &Payload) -> Result<Box<dyn DecodeSession>, MediaError>;
}

/// An open, off-screen decode of one payload.
#[async_trait]
pub trait DecodeSession: Send {
    fn info(&self) -> MediaInfo;

    /// Seek to `position` and return the frame shown there.
    async fn frame_at(&mut self, position: Duration) -> Result<DynamicImage, MediaError>;
}
