use redb::{ReadableTable, TableDefinition, WriteTransaction};
use tracing::{debug, warn};

use super::db::{Database, DatabaseError};
use super::models::{VideoRecord, VideoStats};
use super::tables::*;

impl Database {
    // ========================================================================
    // Video operations
    // ========================================================================

    /// Store a video record and its bytes, replacing any record with the same id.
    ///
    /// Fails with [`DatabaseError::SizeMismatch`] when `byte_size` disagrees
    /// with `raw_bytes`, e.g. for a record whose bytes were moved out.
    pub fn put_video(&self, video: &VideoRecord) -> Result<(), DatabaseError> {
        let actual = video.raw_bytes.len() as u64;
        if video.byte_size != actual {
            return Err(DatabaseError::SizeMismatch {
                id: video.id,
                declared: video.byte_size,
                actual,
            });
        }

        let write_txn = self.begin_write()?;
        {
            // Drop index entries of the record being replaced
            if let Some(previous) = read_record(&write_txn, video.id)? {
                remove_index_entries(&write_txn, &previous)?;
            }

            let mut table = write_txn.open_table(VIDEOS)?;
            let data = rmp_serde::to_vec_named(video)?;
            table.insert(video.id, data.as_slice())?;

            let mut blobs = write_txn.open_table(VIDEO_BLOBS)?;
            blobs.insert(video.id, video.raw_bytes.as_slice())?;

            let mut by_created = write_txn.open_table(VIDEOS_BY_CREATED_AT)?;
            by_created.insert((video.created_at_key().as_str(), video.id), ())?;

            let mut by_title = write_txn.open_table(VIDEOS_BY_TITLE)?;
            by_title.insert((video.title.as_str(), video.id), ())?;
        }
        write_txn.commit()?;

        debug!(id = video.id, byte_size = video.byte_size, "Stored video");
        Ok(())
    }

    /// Get a video, including its bytes
    pub fn get_video(&self, id: u64) -> Result<Option<VideoRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(VIDEOS)?;
        let blobs = read_txn.open_table(VIDEO_BLOBS)?;

        match table.get(id)? {
            Some(data) => {
                let mut video: VideoRecord = rmp_serde::from_slice(data.value())?;
                if let Some(bytes) = blobs.get(id)? {
                    video.raw_bytes = bytes.value().to_vec();
                }
                Ok(Some(video))
            }
            None => Ok(None),
        }
    }

    /// Get every video with its bytes, in id order
    pub fn get_all_videos(&self) -> Result<Vec<VideoRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(VIDEOS)?;
        let blobs = read_txn.open_table(VIDEO_BLOBS)?;

        let mut videos = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            let Some(mut video) = decode_or_skip(key.value(), value.value()) else {
                continue;
            };
            if let Some(bytes) = blobs.get(key.value())? {
                video.raw_bytes = bytes.value().to_vec();
            }
            videos.push(video);
        }

        Ok(videos)
    }

    /// Videos ordered by creation time, oldest first (metadata only)
    pub fn list_videos_by_created_at(&self) -> Result<Vec<VideoRecord>, DatabaseError> {
        self.list_by_index(VIDEOS_BY_CREATED_AT)
    }

    /// Videos ordered by title, then id (metadata only)
    pub fn list_videos_by_title(&self) -> Result<Vec<VideoRecord>, DatabaseError> {
        self.list_by_index(VIDEOS_BY_TITLE)
    }

    fn list_by_index(
        &self,
        index: TableDefinition<'static, (&'static str, u64), ()>,
    ) -> Result<Vec<VideoRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(index)?;
        let table = read_txn.open_table(VIDEOS)?;

        let mut videos = Vec::new();
        for result in index_table.iter()? {
            let (key, _) = result?;
            let (_, id) = key.value();
            if let Some(data) = table.get(id)? {
                videos.extend(decode_or_skip(id, data.value()));
            }
        }

        Ok(videos)
    }

    /// Delete a video and its index entries. Returns false if it did not exist.
    pub fn delete_video(&self, id: u64) -> Result<bool, DatabaseError> {
        self.delete_videos(&[id]).map(|removed| removed > 0)
    }

    /// Delete a batch of videos in one transaction.
    ///
    /// Either every listed video is removed or, if the transaction fails,
    /// none are. Missing ids are skipped. Returns the number removed.
    pub fn delete_videos(&self, ids: &[u64]) -> Result<u64, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut removed = 0;

        for &id in ids {
            let Some(video) = read_record(&write_txn, id)? else {
                continue;
            };
            remove_index_entries(&write_txn, &video)?;
            {
                let mut table = write_txn.open_table(VIDEOS)?;
                table.remove(id)?;
            }
            {
                let mut blobs = write_txn.open_table(VIDEO_BLOBS)?;
                blobs.remove(id)?;
            }
            removed += 1;
        }

        write_txn.commit()?;
        debug!(requested = ids.len(), removed, "Deleted videos");
        Ok(removed)
    }

    /// Totals over every stored video. Reads record metadata only.
    pub fn video_stats(&self) -> Result<VideoStats, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(VIDEOS)?;

        let mut stats = VideoStats::default();
        for result in table.iter()? {
            let (key, value) = result?;
            let Some(video) = decode_or_skip(key.value(), value.value()) else {
                continue;
            };
            stats.total_videos += 1;
            stats.total_size += video.byte_size;
            stats.total_duration += video.duration_seconds;
        }

        Ok(stats)
    }

    /// Replace the thumbnail of a stored video without rewriting its bytes.
    /// Returns false if the video does not exist.
    pub fn set_thumbnail(
        &self,
        id: u64,
        thumbnail: Option<String>,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let updated = match read_record(&write_txn, id)? {
            Some(mut video) => {
                video.thumbnail = thumbnail;
                let data = rmp_serde::to_vec_named(&video)?;
                let mut table = write_txn.open_table(VIDEOS)?;
                table.insert(id, data.as_slice())?;
                true
            }
            None => false,
        };
        write_txn.commit()?;

        debug!(id, updated, "Set thumbnail");
        Ok(updated)
    }

    /// Number of stored videos
    pub fn count_videos(&self) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(VIDEOS)?;
        Ok(table.iter()?.count() as u64)
    }
}

/// Decode a record read during a scan, skipping it if it is unreadable.
fn decode_or_skip(id: u64, data: &[u8]) -> Option<VideoRecord> {
    match rmp_serde::from_slice(data) {
        Ok(video) => Some(video),
        Err(e) => {
            warn!(id, error = %e, "Skipping unreadable video record");
            None
        }
    }
}

fn read_record(
    write_txn: &WriteTransaction,
    id: u64,
) -> Result<Option<VideoRecord>, DatabaseError> {
    let table = write_txn.open_table(VIDEOS)?;
    let result = match table.get(id)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };
    Ok(result)
}

fn remove_index_entries(
    write_txn: &WriteTransaction,
    video: &VideoRecord,
) -> Result<(), DatabaseError> {
    {
        let mut by_created = write_txn.open_table(VIDEOS_BY_CREATED_AT)?;
        by_created.remove((video.created_at_key().as_str(), video.id))?;
    }
    {
        let mut by_title = write_txn.open_table(VIDEOS_BY_TITLE)?;
        by_title.remove((video.title.as_str(), video.id))?;
    }
    Ok(())
}
