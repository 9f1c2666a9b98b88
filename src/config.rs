use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::media::ThumbnailOptions;
use crate::store::StoreConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Bumping this discards every stored video on next open.
    pub schema_version: u64,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub thumbnail_max_width: u32,
    pub thumbnail_max_height: u32,
    /// JPEG quality, 1-100
    pub thumbnail_quality: u8,
    pub thumbnail_timeout_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            schema_version: 1,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            thumbnail_max_width: 320,
            thumbnail_max_height: 240,
            thumbnail_quality: 80,
            thumbnail_timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let storage_defaults = StorageConfig::default();
        let media_defaults = MediaConfig::default();

        let config = Config {
            storage: StorageConfig {
                data_dir: std::env::var("DATA_DIR").unwrap_or(storage_defaults.data_dir),
                schema_version: env_parse("SCHEMA_VERSION")
                    .unwrap_or(storage_defaults.schema_version),
            },
            media: MediaConfig {
                ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(media_defaults.ffmpeg_path),
                ffprobe_path: std::env::var("FFPROBE_PATH")
                    .unwrap_or(media_defaults.ffprobe_path),
                thumbnail_max_width: env_parse("THUMBNAIL_MAX_WIDTH")
                    .unwrap_or(media_defaults.thumbnail_max_width),
                thumbnail_max_height: env_parse("THUMBNAIL_MAX_HEIGHT")
                    .unwrap_or(media_defaults.thumbnail_max_height),
                thumbnail_quality: env_parse("THUMBNAIL_QUALITY")
                    .unwrap_or(media_defaults.thumbnail_quality),
                thumbnail_timeout_ms: env_parse("THUMBNAIL_TIMEOUT_MS")
                    .unwrap_or(media_defaults.thumbnail_timeout_ms),
                probe_timeout_ms: env_parse("PROBE_TIMEOUT_MS")
                    .unwrap_or(media_defaults.probe_timeout_ms),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "DATA_DIR cannot be empty".to_string(),
            ));
        }

        if self.storage.schema_version == 0 {
            return Err(ConfigError::ValidationError(
                "SCHEMA_VERSION must be at least 1".to_string(),
            ));
        }

        if self.media.thumbnail_max_width == 0 || self.media.thumbnail_max_height == 0 {
            return Err(ConfigError::ValidationError(
                "THUMBNAIL_MAX_WIDTH and THUMBNAIL_MAX_HEIGHT must be positive".to_string(),
            ));
        }

        if !(1..=100).contains(&self.media.thumbnail_quality) {
            return Err(ConfigError::ValidationError(
                "THUMBNAIL_QUALITY must be between 1 and 100".to_string(),
            ));
        }

        if self.media.probe_timeout_ms == 0 || self.media.thumbnail_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            data_dir: PathBuf::from(&self.storage.data_dir),
            schema_version: self.storage.schema_version,
        }
    }

    pub fn thumbnail_options(&self) -> ThumbnailOptions {
        ThumbnailOptions {
            max_width: self.media.thumbnail_max_width,
            max_height: self.media.thumbnail_max_height,
            quality: self.media.thumbnail_quality,
            thumbnail_timeout: Duration::from_millis(self.media.thumbnail_timeout_ms),
            probe_timeout: Duration::from_millis(self.media.probe_timeout_ms),
        }
    }
}
