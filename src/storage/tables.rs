use redb::TableDefinition;

/// Video records: id -> VideoRecord metadata (msgpack, without the media bytes)
pub const VIDEOS: TableDefinition<u64, &[u8]> = TableDefinition::new("videos");

/// Media bytes: id -> raw encoded video, written alongside the record
pub const VIDEO_BLOBS: TableDefinition<u64, &[u8]> = TableDefinition::new("video_blobs");

/// Creation-time index: (created_at RFC 3339, id) -> ()
pub const VIDEOS_BY_CREATED_AT: TableDefinition<(&str, u64), ()> =
    TableDefinition::new("videos_by_created_at");

/// Title index: (title, id) -> ()
pub const VIDEOS_BY_TITLE: TableDefinition<(&str, u64), ()> =
    TableDefinition::new("videos_by_title");

/// Store bookkeeping, currently only the schema version
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const SCHEMA_VERSION_KEY: &str = "schema_version";
