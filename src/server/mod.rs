//! Server side of the exchange
//!
//! The acceptor, the per-connection session state machine, and the registry
//! shared between sessions.

pub mod core;
pub mod handler;
pub mod reader;
pub mod registry;
pub mod session;

pub use self::core::Server;
pub use handler::handle_client;
pub use reader::{CommandReader, Incoming};
pub use registry::{ClientEntry, ClientRegistry, Mailbox, SharedRegistry};
pub use session::{Session, SessionFlow, SessionState};
