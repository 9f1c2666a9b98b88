//! Process-local access handles for payloads.
//!
//! An access handle is a `blob:` reference string that lets a consumer address
//! a payload (for playback, download or a share link) without re-serializing
//! it. Each handle keeps its payload alive until released.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::codec::Payload;

/// Prefix of every reference string minted by [`AccessHandles`]
pub const HANDLE_PREFIX: &str = "blob:video-vault/";

/// Registry of outstanding access handles.
#[derive(Debug, Default)]
pub struct AccessHandles {
    handles: DashMap<String, Payload>,
}

impl AccessHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new reference for `payload`. The caller owns it and must release it.
    pub fn create_access_handle(&self, payload: &Payload) -> String {
        let reference = format!("{HANDLE_PREFIX}{}", Uuid::new_v4());
        self.handles.insert(reference.clone(), payload.clone());
        debug!(
            reference = %reference,
            outstanding = self.handles.len(),
            "Created access handle"
        );
        reference
    }

    /// Look up the payload behind a live reference
    pub fn resolve(&self, reference: &str) -> Option<Payload> {
        self.handles.get(reference).map(|entry| entry.value().clone())
    }

    /// Release a reference and drop its hold on the payload.
    ///
    /// Unknown or already released references are ignored; returns whether
    /// anything was released.
    pub fn release_access_handle(&self, reference: &str) -> bool {
        match self.handles.remove(reference) {
            Some(_) => {
                debug!(
                    reference,
                    outstanding = self.handles.len(),
                    "Released access handle"
                );
                true
            }
            None => {
                debug!(reference, "Ignoring release of unknown access handle");
                false
            }
        }
    }

    /// Number of handles created and not yet released
    pub fn outstanding(&self) -> usize {
        self.handles.len()
    }

    /// Mint a handle that is released when the returned guard is dropped.
    pub fn scoped(self: &Arc<Self>, payload: &Payload) -> ScopedAccessHandle {
        ScopedAccessHandle {
            reference: Some(self.create_access_handle(payload)),
            registry: Arc::clone(self),
        }
    }
}

/// An access handle tied to a scope. Released on drop, including on error
/// paths and when the owning future is cancelled.
#[derive(Debug)]
pub struct ScopedAccessHandle {
    reference: Option<String>,
    registry: Arc<AccessHandles>,
}

impl ScopedAccessHandle {
    pub fn reference(&self) -> &str {
        self.reference.as_deref().unwrap_or_default()
    }

    /// Detach the reference from the scope. The caller becomes responsible
    /// for calling [`AccessHandles::release_access_handle`].
    pub fn into_reference(mut self) -> String {
        self.reference.take().unwrap_or_default()
    }
}

impl Drop for ScopedAccessHandle {
    fn drop(&mut self) {
        if let Some(reference) = self.reference.take() {
            self.registry.release_access_handle(&reference);
        }
    }
}
