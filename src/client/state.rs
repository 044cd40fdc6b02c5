//! Module `state`
//!
//! Connection and registration flags of a client session. Shared between
//! the command issuer and the inbound listener, so every field is safe to
//! read and update from either task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::protocol::SessionFlags;

/// Tracks whether the client is connected, which handle the server assigned,
/// and whether the client has left.
#[derive(Debug, Default)]
pub struct ClientState {
    is_connected: AtomicBool,
    is_left: AtomicBool,
    handle: Mutex<Option<String>>,
}

impl ClientState {
    pub fn connected() -> Self {
        let state = Self::default();
        state.is_connected.store(true, Ordering::SeqCst);
        state
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    /// Returns whether the server acknowledged `/leave`.
    pub fn is_left(&self) -> bool {
        self.is_left.load(Ordering::SeqCst)
    }

    /// Returns the handle captured from the server's welcome, if any.
    pub fn handle(&self) -> Option<String> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_registered(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Snapshot used for the local prerequisite check.
    pub fn flags(&self) -> SessionFlags {
        SessionFlags {
            connected: self.is_connected() && !self.is_left(),
            registered: self.is_registered(),
        }
    }

    // --------------------
    // Setter methods
    // --------------------

    pub(crate) fn set_handle(&self, handle: Option<String>) {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = handle;
    }

    /// Records an acknowledged `/leave`.
    pub(crate) fn mark_left(&self) {
        self.is_left.store(true, Ordering::SeqCst);
        self.is_connected.store(false, Ordering::SeqCst);
    }

    /// Records an unexpected loss of the connection. Forgets the handle.
    pub(crate) fn mark_disconnected(&self) {
        self.is_connected.store(false, Ordering::SeqCst);
        self.set_handle(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_unregistered() {
        let state = ClientState::connected();
        assert_eq!(
            state.flags(),
            SessionFlags {
                connected: true,
                registered: false
            }
        );
    }

    #[test]
    fn leaving_blocks_further_commands() {
        let state = ClientState::connected();
        state.set_handle(Some("alice".into()));
        state.mark_left();
        assert!(state.is_left());
        assert!(!state.flags().connected);
    }

    #[test]
    fn disconnect_forgets_handle() {
        let state = ClientState::connected();
        state.set_handle(Some("alice".into()));
        state.mark_disconnected();
        assert_eq!(state.handle(), None);
        assert!(!state.is_connected());
    }
}
