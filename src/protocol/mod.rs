//! Exchange protocol
//!
//! Command grammar, validation, and reply texts shared by client and server.

pub mod commands;
pub mod parser;
pub mod responses;

pub use commands::{Arity, Command, Verb};
pub use parser::{SessionFlags, check_prerequisites, parse_command};
