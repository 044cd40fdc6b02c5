//! Client side of the exchange
//!
//! Connection state, the command issuer, and the inbound listener that turns
//! server lines into events.

pub mod events;
pub mod handler;
pub mod offline;
pub mod session;
pub mod state;

pub use events::ClientEvent;
pub use offline::{OfflineAction, handle_offline_command};
pub use session::{ClientSession, EventReceiver};
pub use state::ClientState;
