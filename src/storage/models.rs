use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::ByteBuffer;

/// How a video was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Camera,
    Screen,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Camera => f.write_str("camera"),
            CaptureMode::Screen => f.write_str("screen"),
        }
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "camera" => Ok(CaptureMode::Camera),
            "screen" => Ok(CaptureMode::Screen),
            other => Err(format!("unknown capture mode: {other}")),
        }
    }
}

/// Caller-supplied description of a video being saved.
///
/// Carries no size; `byte_size` is derived from the encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub id: u64,
    pub title: String,
    pub duration_seconds: f64,
    pub capture_mode: CaptureMode,
    pub created_at: DateTime<Utc>,
    pub thumbnail: Option<String>,
}

impl VideoMetadata {
    /// Metadata stamped with the current time and no thumbnail.
    pub fn new(
        id: u64,
        title: impl Into<String>,
        duration_seconds: f64,
        capture_mode: CaptureMode,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            duration_seconds,
            capture_mode,
            created_at: Utc::now(),
            thumbnail: None,
        }
    }
}

/// A video record stored in redb.
///
/// `raw_bytes` lives in its own table and is never part of the serialized
/// record, so listing and statistics do not read media bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: u64,
    pub title: String,
    #[serde(skip)]
    pub raw_bytes: Vec<u8>,
    pub content_type: String,
    pub duration_seconds: f64,
    pub byte_size: u64,
    pub capture_mode: CaptureMode,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl VideoRecord {
    /// Build a record from caller metadata and an encoded buffer.
    pub fn new(metadata: VideoMetadata, buffer: ByteBuffer) -> Self {
        Self {
            id: metadata.id,
            title: metadata.title,
            byte_size: buffer.bytes.len() as u64,
            raw_bytes: buffer.bytes,
            content_type: buffer.content_type,
            duration_seconds: metadata.duration_seconds,
            capture_mode: metadata.capture_mode,
            created_at: metadata.created_at,
            thumbnail: metadata.thumbnail,
        }
    }

    /// Key used by the creation-time index. RFC 3339 in UTC with fixed
    /// precision sorts lexicographically in time order.
    pub fn created_at_key(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Aggregate figures over every stored record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStats {
    pub total_videos: u64,
    pub total_size: u64,
    pub total_duration: f64,
}

/// What happened to the on-disk schema when the database was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No schema version was recorded and no records existed.
    Created,
    /// The stored version matched.
    Current,
    /// The stored version differed; every record was dropped.
    Migrated {
        from: Option<u64>,
        to: u64,
        dropped: u64,
    },
}

/// Field to order a listing by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    Duration,
    Size,
    Title,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" | "created_at" | "date" => Ok(SortKey::CreatedAt),
            "duration" => Ok(SortKey::Duration),
            "size" => Ok(SortKey::Size),
            "title" => Ok(SortKey::Title),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Sort records in place. Ties fall back to id so the order is stable across calls.
pub fn sort_videos(records: &mut [VideoRecord], key: SortKey, order: SortOrder) {
    records.sort_by(|a, b| {
        let primary = match key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Duration => a.duration_seconds.total_cmp(&b.duration_seconds),
            SortKey::Size => a.byte_size.cmp(&b.byte_size),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        };
        let ordering = match primary {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        };
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}
