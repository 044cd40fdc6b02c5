//! Error handling
//!
//! Defines error types and handling for the exchange server and client.

pub mod handlers;
pub mod types;

pub use handlers::handle_error;
pub use types::*;
