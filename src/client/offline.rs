//! Handling of input typed before a connection exists.

use crate::error::{CommandError, PrereqViolation};
use crate::protocol::{Command, parse_command, responses};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfflineAction {
    /// Open a connection to the given endpoint.
    Join { host: String, port: String },
    /// Print the offline help text.
    Help(&'static str),
    /// Print the given error and keep waiting for input.
    Reject(String),
}

pub fn handle_offline_command(raw: &str) -> OfflineAction {
    match parse_command(raw) {
        Ok(Command::Join { host, port }) => OfflineAction::Join { host, port },
        Ok(Command::Help) => OfflineAction::Help(responses::OFFLINE_HELP),
        Ok(_) => OfflineAction::Reject(PrereqViolation::NotConnected.reply().to_string()),
        Err(e @ CommandError::ArityMismatch(_)) if raw.trim_start().starts_with("/join") => {
            OfflineAction::Reject(e.reply().to_string())
        }
        Err(CommandError::ArityMismatch(_)) => {
            OfflineAction::Reject(PrereqViolation::NotConnected.reply().to_string())
        }
        Err(CommandError::UnknownCommand(_)) => {
            OfflineAction::Reject(responses::INVALID_INPUT.to_string())
        }
    }
}
