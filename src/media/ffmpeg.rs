use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use super::{DecodeSession, FrameSource, MediaError, MediaInfo};
use crate::codec::Payload;

/// Decodes payloads with external `ffprobe`/`ffmpeg` binaries.
///
/// Each session spools the payload into a private temp file. The file is
/// removed and any running child process killed when the session (or the
/// future driving it) is dropped.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegFrameSource {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(ffmpeg: P, ffprobe: Q) -> Self {
        Self {
            ffmpeg: ffmpeg.as_ref().to_path_buf(),
            ffprobe: ffprobe.as_ref().to_path_buf(),
        }
    }

    async fn spool(&self, payload: &Payload) -> Result<NamedTempFile, MediaError> {
        let extension = mime_guess::get_mime_extensions_str(payload.content_type())
            .and_then(|exts| exts.first())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix("video-vault-")
            .suffix(&extension)
            .tempfile()?;
        tokio::fs::write(file.path(), payload.data()).await?;
        Ok(file)
    }

    async fn probe_file(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .args(["-show_streams", "-select_streams", "v:0"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::Decode(format!(
                "ffprobe exited with {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)?;
        let stream = probe
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::Decode("no video stream".to_string()))?;

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(MediaError::Decode("video stream has no dimensions".to_string())),
        };

        // Recorder output often lacks a stream duration; fall back to the container.
        let duration_seconds = stream
            .duration
            .as_deref()
            .and_then(parse_duration)
            .or_else(|| {
                probe
                    .format
                    .and_then(|f| f.duration)
                    .as_deref()
                    .and_then(parse_duration)
            })
            .unwrap_or(0.0);

        Ok(MediaInfo {
            width,
            height,
            duration_seconds,
        })
    }
}

fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn open(&self, payload: &Payload) -> Result<Box<dyn DecodeSession>, MediaError> {
        let file = self.spool(payload).await?;
        let info = self.probe_file(file.path()).await?;
        debug!(
            width = info.width,
            height = info.height,
            duration = info.duration_seconds,
            "Opened ffmpeg decode session"
        );
        Ok(Box::new(FfmpegSession {
            ffmpeg: self.ffmpeg.clone(),
            file,
            info,
        }))
    }
}

struct FfmpegSession {
    ffmpeg: PathBuf,
    file: NamedTempFile,
    info: MediaInfo,
}

#[async_trait]
impl DecodeSession for FfmpegSession {
    fn info(&self) -> MediaInfo {
        self.info
    }

    async fn frame_at(&mut self, position: Duration) -> Result<DynamicImage, MediaError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.3}", position.as_secs_f64()))
            .arg("-i")
            .arg(self.file.path())
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::Decode(format!(
                "ffmpeg exited with {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(MediaError::Decode(format!(
                "no frame at {:.3}s",
                position.as_secs_f64()
            )));
        }

        Ok(image::load_from_memory_with_format(
            &output.stdout,
            ImageFormat::Png,
        )?)
    }
}
