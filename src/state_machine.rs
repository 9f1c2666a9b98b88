//! Lifecycle state of a [`VideoStore`](crate::store::VideoStore) handle.

use std::sync::Mutex;

/// Where a store handle is in its lifecycle.
///
/// `Uninitialized -> Initializing -> Ready -> Closed`. A failed
/// initialization falls back to `Uninitialized`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl StoreState {
    pub fn can_transition_to(self, next: StoreState) -> bool {
        use StoreState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Ready)
                | (Initializing, Uninitialized)
                | (Uninitialized, Closed)
                | (Initializing, Closed)
                | (Ready, Closed)
        )
    }
}

/// Shared, guarded lifecycle state.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<StoreState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState::Uninitialized),
        }
    }
}

impl Lifecycle {
    pub fn current(&self) -> StoreState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next` if the transition is legal. Returns whether it happened.
    pub fn transition(&self, next: StoreState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.can_transition_to(next) {
            tracing::trace!(from = ?*state, to = ?next, "Store state transition");
            *state = next;
            true
        } else {
            false
        }
    }
}
