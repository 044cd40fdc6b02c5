//! Error handlers
//!
//! Logs errors at a level matching how much damage they did.

use crate::error::types::ExchangeError;
use log::{error, warn};
use std::net::SocketAddr;

/// Log an error raised while serving `peer`
pub fn handle_error(peer: &SocketAddr, err: &ExchangeError) {
    if err.is_fatal() {
        error!("Session {} terminated: {}", peer, err);
    } else {
        warn!("Session {}: {}", peer, err);
    }
}
