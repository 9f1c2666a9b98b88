//! The video store: an explicit, lazily-initialized handle over [`Database`].
//!
//! Every public operation first makes sure the store is ready. Concurrent
//! first callers share a single initialization; once `Ready`, further calls to
//! [`VideoStore::init`] are no-ops.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::codec::{self, ByteBuffer, Payload};
use crate::media::ThumbnailGenerator;
use crate::state_machine::{Lifecycle, StoreState};
use crate::storage::models::{
    sort_videos, SortKey, SortOrder, VideoMetadata, VideoRecord, VideoStats,
};
use crate::storage::{Database, DatabaseError, PurgeStats};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is closed")]
    Closed,
    #[error(transparent)]
    Storage(#[from] DatabaseError),
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub schema_version: u64,
}

/// A stored video decoded back into a playable payload.
///
/// The record's bytes are moved into `payload`, so `record.raw_bytes` is
/// empty; `record.byte_size` still reports the stored size.
#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub payload: Payload,
    pub record: VideoRecord,
}

pub struct VideoStore {
    config: StoreConfig,
    db: OnceCell<Database>,
    lifecycle: Lifecycle,
}

impl VideoStore {
    /// Create an uninitialized store. Nothing touches disk until first use.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn state(&self) -> StoreState {
        self.lifecycle.current()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open the store, migrating its schema if needed. Idempotent.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.ready().await.map(|_| ())
    }

    async fn ready(&self) -> Result<&Database, StoreError> {
        if self.lifecycle.current() == StoreState::Closed {
            return Err(StoreError::Closed);
        }

        let db = self
            .db
            .get_or_try_init(|| async {
                self.lifecycle.transition(StoreState::Initializing);
                let data_dir = self.config.data_dir.clone();
                let schema_version = self.config.schema_version;

                let opened = tokio::task::spawn_blocking(move || {
                    Database::open_with_outcome(&data_dir, schema_version)
                })
                .await
                .map_err(StoreError::from)
                .and_then(|r| r.map_err(StoreError::from));

                match opened {
                    Ok((db, outcome)) => {
                        self.lifecycle.transition(StoreState::Ready);
                        info!(
                            data_dir = %self.config.data_dir.display(),
                            ?outcome,
                            "Video store initialized"
                        );
                        Ok(db)
                    }
                    Err(e) => {
                        self.lifecycle.transition(StoreState::Uninitialized);
                        Err(e)
                    }
                }
            })
            .await?;

        if self.lifecycle.current() == StoreState::Closed {
            return Err(StoreError::Closed);
        }
        Ok(db)
    }

    /// Run a blocking database operation off the async runtime.
    async fn with_db<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(Database) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.ready().await?.clone();
        Ok(tokio::task::spawn_blocking(move || op(db)).await??)
    }

    // ========================================================================
    // Video operations
    // ========================================================================

    /// Persist a payload under `metadata.id`, replacing any existing record.
    pub async fn save_video(
        &self,
        payload: &Payload,
        metadata: VideoMetadata,
    ) -> Result<VideoRecord, StoreError> {
        let record = VideoRecord::new(metadata, codec::encode(payload));
        let record = self
            .with_db(move |db| {
                db.put_video(&record)?;
                Ok(record)
            })
            .await?;

        info!(
            id = record.id,
            byte_size = record.byte_size,
            has_thumbnail = record.thumbnail.is_some(),
            "Saved video"
        );
        Ok(record)
    }

    /// Persist a payload, first trying to attach a thumbnail if it has none.
    ///
    /// The save waits for the generator, at most its configured thumbnail
    /// timeout. Thumbnail failures are logged and the video is saved without
    /// one. Callers that must not wait use [`VideoStore::save_video`] and
    /// then [`VideoStore::attach_thumbnail`].
    pub async fn save_video_with_thumbnail(
        &self,
        payload: &Payload,
        mut metadata: VideoMetadata,
        thumbnails: &ThumbnailGenerator,
    ) -> Result<VideoRecord, StoreError> {
        if metadata.thumbnail.is_none() {
            match thumbnails.generate_thumbnail(payload).await {
                Ok(uri) => metadata.thumbnail = Some(uri),
                Err(e) => warn!(id = metadata.id, error = %e, "Saving video without thumbnail"),
            }
        }
        self.save_video(payload, metadata).await
    }

    /// Generate a thumbnail for an already stored video and record it.
    ///
    /// Returns false if the video is unknown, was deleted meanwhile, or no
    /// thumbnail could be generated. The stored bytes are not rewritten.
    pub async fn attach_thumbnail(
        &self,
        id: u64,
        thumbnails: &ThumbnailGenerator,
    ) -> Result<bool, StoreError> {
        let Some(video) = self.get_video(id).await? else {
            debug!(id, "No video to attach a thumbnail to");
            return Ok(false);
        };

        let uri = match thumbnails.generate_thumbnail(&video.payload).await {
            Ok(uri) => uri,
            Err(e) => {
                warn!(id, error = %e, "Could not generate thumbnail");
                return Ok(false);
            }
        };

        let attached = self
            .with_db(move |db| db.set_thumbnail(id, Some(uri)))
            .await?;
        if attached {
            info!(id, "Attached thumbnail");
        }
        Ok(attached)
    }

    /// Fetch a video and rebuild its payload. `None` if the id is unknown.
    pub async fn get_video(&self, id: u64) -> Result<Option<StoredVideo>, StoreError> {
        let record = self.with_db(move |db| db.get_video(id)).await?;

        Ok(record.map(|mut record| {
            let buffer = ByteBuffer {
                bytes: std::mem::take(&mut record.raw_bytes),
                content_type: record.content_type.clone(),
            };
            StoredVideo {
                payload: codec::decode(buffer),
                record,
            }
        }))
    }

    /// Every stored video, bytes included, in no particular order.
    pub async fn get_all_videos(&self) -> Result<Vec<VideoRecord>, StoreError> {
        self.with_db(|db| db.get_all_videos()).await
    }

    /// Every stored video sorted by `key`.
    pub async fn list_videos(
        &self,
        key: SortKey,
        order: SortOrder,
    ) -> Result<Vec<VideoRecord>, StoreError> {
        let mut videos = self.get_all_videos().await?;
        sort_videos(&mut videos, key, order);
        Ok(videos)
    }

    /// Remove one video. Unknown ids are ignored.
    pub async fn delete_video(&self, id: u64) -> Result<(), StoreError> {
        let existed = self.with_db(move |db| db.delete_video(id)).await?;
        if existed {
            info!(id, "Deleted video");
        } else {
            debug!(id, "Delete of unknown video ignored");
        }
        Ok(())
    }

    /// Remove a batch of videos as one unit. Returns how many existed.
    pub async fn delete_multiple_videos(&self, ids: &[u64]) -> Result<u64, StoreError> {
        let ids = ids.to_vec();
        let requested = ids.len();
        let removed = self.with_db(move |db| db.delete_videos(&ids)).await?;
        info!(requested, removed, "Deleted videos");
        Ok(removed)
    }

    /// Count, total bytes and total duration over every stored video.
    pub async fn get_video_metadata(&self) -> Result<VideoStats, StoreError> {
        self.with_db(|db| db.video_stats()).await
    }

    /// Drop every stored video.
    pub async fn purge(&self) -> Result<PurgeStats, StoreError> {
        self.with_db(|db| db.purge_all()).await
    }

    /// Close the store and release the database file. Later calls fail with
    /// [`StoreError::Closed`].
    pub fn close(&mut self) {
        self.lifecycle.transition(StoreState::Closed);
        if self.db.take().is_some() {
            info!(data_dir = %self.config.data_dir.display(), "Video store closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::access::AccessHandles;
    use crate::media::{FrameSource, ThumbnailOptions};
    use crate::testutil::{
        sample_metadata, sample_payload, test_store, SyntheticSource, UndecodableSource,
    };

    fn generator(source: Arc<dyn FrameSource>) -> (ThumbnailGenerator, Arc<AccessHandles>) {
        let handles = Arc::new(AccessHandles::new());
        (
            ThumbnailGenerator::new(source, Arc::clone(&handles), ThumbnailOptions::default()),
            handles,
        )
    }

    #[tokio::test]
    async fn test_lazy_init_on_first_operation() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        assert_eq!(store.state(), StoreState::Uninitialized);

        assert!(store.get_all_videos().await.unwrap().is_empty());
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_init_is_single_flight() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let (a, b, c) = tokio::join!(store.init(), store.init(), store.get_video_metadata());
        a.unwrap();
        b.unwrap();
        assert_eq!(c.unwrap(), VideoStats::default());
        assert_eq!(store.state(), StoreState::Ready);

        store.init().await.unwrap();
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = test_store(&dir);
        store.init().await.unwrap();
        store.close();

        assert_eq!(store.state(), StoreState::Closed);
        assert!(matches!(store.init().await, Err(StoreError::Closed)));
        assert!(matches!(
            store
                .save_video(&sample_payload(4), sample_metadata(1, "x", 1.0))
                .await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_releases_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = test_store(&dir);
        store
            .save_video(&sample_payload(8), sample_metadata(1, "kept", 1.0))
            .await
            .unwrap();
        store.close();

        let reopened = test_store(&dir);
        assert_eq!(reopened.get_all_videos().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_store_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let store = VideoStore::new(StoreConfig {
            data_dir: blocker.join("data"),
            schema_version: 1,
        });

        assert!(matches!(store.init().await, Err(StoreError::Storage(_))));
        assert_eq!(store.state(), StoreState::Uninitialized);
    }

    #[tokio::test]
    async fn test_get_video_moves_bytes_into_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let payload = sample_payload(12);
        store
            .save_video(&payload, sample_metadata(1, "Demo", 5.0))
            .await
            .unwrap();

        let stored = store.get_video(1).await.unwrap().unwrap();
        assert_eq!(stored.payload, payload);
        assert!(stored.record.raw_bytes.is_empty());
        assert_eq!(stored.record.byte_size, 12);
    }

    #[tokio::test]
    async fn test_attach_thumbnail_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let (thumbnails, handles) = generator(Arc::new(SyntheticSource::new(640, 360, 4.0)));

        let saved = store
            .save_video(&sample_payload(32), sample_metadata(1, "later", 4.0))
            .await
            .unwrap();
        assert!(saved.thumbnail.is_none());

        assert!(store.attach_thumbnail(1, &thumbnails).await.unwrap());
        assert_eq!(handles.outstanding(), 0);

        let stored = store.get_video(1).await.unwrap().unwrap();
        let thumbnail = stored.record.thumbnail.expect("thumbnail attached");
        assert!(thumbnail.starts_with("data:image/jpeg;base64,"));
        assert_eq!(stored.payload, sample_payload(32));
        assert_eq!(stored.record.byte_size, 32);
    }

    #[tokio::test]
    async fn test_attach_thumbnail_unknown_or_undecodable() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let (working, _) = generator(Arc::new(SyntheticSource::new(640, 360, 4.0)));
        assert!(!store.attach_thumbnail(9, &working).await.unwrap());

        store
            .save_video(&sample_payload(8), sample_metadata(2, "broken", 1.0))
            .await
            .unwrap();
        let (broken, handles) = generator(Arc::new(UndecodableSource));
        assert!(!store.attach_thumbnail(2, &broken).await.unwrap());
        assert_eq!(handles.outstanding(), 0);

        let stored = store.get_video(2).await.unwrap().unwrap();
        assert!(stored.record.thumbnail.is_none());
    }
}
