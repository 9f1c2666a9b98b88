use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use super::{FrameSource, MediaError, MediaInfo};
use crate::access::AccessHandles;
use crate::codec::Payload;

pub const DEFAULT_MAX_WIDTH: u32 = 320;
pub const DEFAULT_MAX_HEIGHT: u32 = 240;
pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Seek never goes past this point, and never past a tenth of the duration.
const MAX_SEEK: Duration = Duration::from_secs(1);
const SEEK_FRACTION: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct ThumbnailOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
    pub thumbnail_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
            thumbnail_timeout: DEFAULT_THUMBNAIL_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Builds preview images and checks playability of payloads.
///
/// Every decode is registered as a scoped access handle for its duration, so
/// [`AccessHandles::outstanding`] drops back once an operation finishes,
/// whatever the outcome.
pub struct ThumbnailGenerator {
    source: Arc<dyn FrameSource>,
    handles: Arc<AccessHandles>,
    options: ThumbnailOptions,
}

impl ThumbnailGenerator {
    pub fn new(
        source: Arc<dyn FrameSource>,
        handles: Arc<AccessHandles>,
        options: ThumbnailOptions,
    ) -> Self {
        Self {
            source,
            handles,
            options,
        }
    }

    pub fn options(&self) -> &ThumbnailOptions {
        &self.options
    }

    /// Render a representative frame as a `data:image/jpeg;base64,...` URI.
    ///
    /// Fails on empty or undecodable payloads and when the decode or seek does
    /// not finish within the configured timeout.
    pub async fn generate_thumbnail(&self, payload: &Payload) -> Result<String, MediaError> {
        if payload.is_empty() {
            return Err(MediaError::EmptyPayload);
        }

        let surface = self.handles.scoped(payload);
        debug!(
            reference = surface.reference(),
            content_type = payload.content_type(),
            "Generating thumbnail"
        );

        let limit = self.options.thumbnail_timeout;
        match tokio::time::timeout(limit, self.render(payload)).await {
            Ok(result) => result,
            Err(_) => Err(MediaError::Timeout(limit)),
        }
    }

    async fn render(&self, payload: &Payload) -> Result<String, MediaError> {
        let mut session = self.source.open(payload).await?;
        let position = seek_target(session.info().duration_seconds);
        let frame = session.frame_at(position).await?;
        encode_thumbnail(
            &frame,
            self.options.max_width,
            self.options.max_height,
            self.options.quality,
        )
    }

    /// Open the payload just far enough to learn its dimensions and duration.
    pub async fn probe(&self, payload: &Payload) -> Result<MediaInfo, MediaError> {
        if payload.is_empty() {
            return Err(MediaError::EmptyPayload);
        }

        let surface = self.handles.scoped(payload);
        debug!(reference = surface.reference(), "Probing payload");

        let limit = self.options.probe_timeout;
        match tokio::time::timeout(limit, self.source.open(payload)).await {
            Ok(session) => session.map(|s| s.info()),
            Err(_) => Err(MediaError::Timeout(limit)),
        }
    }

    /// Whether the payload decodes to a positive duration within the probe timeout.
    pub async fn probe_playback(&self, payload: &Payload) -> bool {
        match self.probe(payload).await {
            Ok(info) => info.is_playable(),
            Err(e) => {
                debug!(error = %e, "Playback probe failed");
                false
            }
        }
    }
}

/// Where to grab the preview frame: `min(1s, 10% of duration)`, skipping a
/// black leading frame without running past short clips.
pub fn seek_target(duration_seconds: f64) -> Duration {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(duration_seconds * SEEK_FRACTION).min(MAX_SEEK)
}

/// Scale `(width, height)` down to fit the bounds, capping width first and
/// then height, keeping the aspect ratio. Never scales up.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (mut w, mut h) = (width as f64, height as f64);
    if w > max_width as f64 {
        h = h * max_width as f64 / w;
        w = max_width as f64;
    }
    if h > max_height as f64 {
        w = w * max_height as f64 / h;
        h = max_height as f64;
    }
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Downscale a frame and encode it as a JPEG data URI.
pub fn encode_thumbnail(
    frame: &DynamicImage,
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<String, MediaError> {
    let (width, height) = fit_within(frame.width(), frame.height(), max_width, max_height);
    let scaled = if (width, height) == (frame.width(), frame.height()) {
        frame.to_rgb8()
    } else {
        frame.resize_exact(width, height, FilterType::Triangle).to_rgb8()
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&scaled)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)))
}
