use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::models::MigrationOutcome;
use super::tables::*;

/// File name of the store inside its data directory
pub const DATABASE_FILE: &str = "video-vault.redb";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Video {id} declares {declared} bytes but carries {actual}")]
    SizeMismatch { id: u64, declared: u64, actual: u64 },
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

pub struct Database {
    db: Arc<RedbDatabase>,
    schema_version: u64,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            schema_version: self.schema_version,
        }
    }
}

/// Statistics from a purge operation
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub videos: u64,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P, schema_version: u64) -> Result<Self, DatabaseError> {
        Self::open_with_outcome(data_dir, schema_version).map(|(db, _)| db)
    }

    /// Open or create a database, migrating it to `schema_version` if needed.
    ///
    /// Migration is destructive: on any version mismatch every record is
    /// dropped and the tables are recreated empty.
    pub fn open_with_outcome<P: AsRef<Path>>(
        data_dir: P,
        schema_version: u64,
    ) -> Result<(Self, MigrationOutcome), DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join(DATABASE_FILE);
        let db = Arc::new(RedbDatabase::create(&db_path)?);

        let write_txn = db.begin_write()?;
        let outcome = {
            let stored_version = {
                let meta = write_txn.open_table(META)?;
                let version = meta.get(SCHEMA_VERSION_KEY)?.map(|v| v.value());
                version
            };
            let existing = {
                let videos = write_txn.open_table(VIDEOS)?;
                let count = videos.iter()?.count() as u64;
                count
            };

            match stored_version {
                Some(v) if v == schema_version => MigrationOutcome::Current,
                None if existing == 0 => MigrationOutcome::Created,
                from => {
                    warn!(
                        from = ?from,
                        to = schema_version,
                        dropped = existing,
                        "Schema version mismatch, discarding all stored videos"
                    );
                    write_txn.delete_table(VIDEOS)?;
                    write_txn.delete_table(VIDEO_BLOBS)?;
                    write_txn.delete_table(VIDEOS_BY_CREATED_AT)?;
                    write_txn.delete_table(VIDEOS_BY_TITLE)?;
                    MigrationOutcome::Migrated {
                        from,
                        to: schema_version,
                        dropped: existing,
                    }
                }
            }
        };

        // Initialize application tables
        {
            let _ = write_txn.open_table(VIDEOS)?;
            let _ = write_txn.open_table(VIDEO_BLOBS)?;
            let _ = write_txn.open_table(VIDEOS_BY_CREATED_AT)?;
            let _ = write_txn.open_table(VIDEOS_BY_TITLE)?;

            let mut meta = write_txn.open_table(META)?;
            meta.insert(SCHEMA_VERSION_KEY, schema_version)?;
        }
        write_txn.commit()?;

        info!(path = %db_path.display(), schema_version, ?outcome, "Video database ready");
        Ok((
            Self {
                db,
                schema_version,
            },
            outcome,
        ))
    }

    /// Schema version this handle was opened with
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Remove every video and index entry, keeping the schema version
    pub fn purge_all(&self) -> Result<PurgeStats, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut stats = PurgeStats::default();

        {
            let table = write_txn.open_table(VIDEOS)?;
            stats.videos = table.iter()?.count() as u64;
        }

        write_txn.delete_table(VIDEOS)?;
        write_txn.delete_table(VIDEO_BLOBS)?;
        write_txn.delete_table(VIDEOS_BY_CREATED_AT)?;
        write_txn.delete_table(VIDEOS_BY_TITLE)?;
        {
            let _ = write_txn.open_table(VIDEOS)?;
            let _ = write_txn.open_table(VIDEO_BLOBS)?;
            let _ = write_txn.open_table(VIDEOS_BY_CREATED_AT)?;
            let _ = write_txn.open_table(VIDEOS_BY_TITLE)?;
        }

        write_txn.commit()?;
        info!(videos = stats.videos, "Purged video store");
        Ok(stats)
    }
}
