//! Conversion between a decodable [`Payload`] and its serializable [`ByteBuffer`] form.
//!
//! A `Payload` is what playback, thumbnailing and access handles work with. A
//! `ByteBuffer` is what the store persists. The two never mix: [`encode`] and
//! [`decode`] are the only way across.

use std::fmt;
use std::path::Path;

use bytes::Bytes;

/// Content type used when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An in-memory, decodable media payload.
///
/// Backed by reference-counted immutable bytes, so cloning a payload never
/// copies the media.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    data: Bytes,
    content_type: String,
}

impl Payload {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    /// Read a whole file into a payload, guessing the content type from its extension.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        Ok(Self::new(data, content_type))
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Raw, serializable bytes plus the content type needed to rebuild a [`Payload`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Copy a payload's full content into a raw buffer. The payload is left untouched.
pub fn encode(payload: &Payload) -> ByteBuffer {
    ByteBuffer {
        bytes: payload.data.to_vec(),
        content_type: payload.content_type.clone(),
    }
}

/// Wrap a raw buffer back into a payload without copying it.
pub fn decode(buffer: ByteBuffer) -> Payload {
    Payload {
        data: Bytes::from(buffer.bytes),
        content_type: buffer.content_type,
    }
}
