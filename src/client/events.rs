//! Events published by a client session for the presentation layer.

use chrono::{DateTime, Local};
use std::fmt;

use crate::protocol::responses;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A line from the server with no special meaning to the client.
    Message(String),
    /// The server accepted `/register`.
    Registered(String),
    /// A `/get` payload was written to the download directory.
    FileReceived { filename: String, bytes: u64 },
    /// A `/store` payload was fully sent.
    Uploaded {
        handle: Option<String>,
        filename: String,
        bytes: u64,
        at: DateTime<Local>,
    },
    /// A `/get` payload could not be written locally. The connection is still up.
    TransferFailed(String),
    /// The server acknowledged `/leave`.
    Closed(String),
    ConnectionLost,
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Message(text) | ClientEvent::Closed(text) => f.write_str(text),
            ClientEvent::Registered(handle) => f.write_str(&responses::welcome(handle)),
            ClientEvent::FileReceived { filename, .. } => write!(f, "File received: {filename}"),
            ClientEvent::Uploaded {
                handle,
                filename,
                at,
                ..
            } => write!(
                f,
                "{}<{}>: Uploaded {}",
                handle.as_deref().unwrap_or_default(),
                at.format("%Y-%m-%d %H:%M:%S"),
                filename
            ),
            ClientEvent::TransferFailed(reason) => write!(f, "Error receiving file: {reason}"),
            ClientEvent::ConnectionLost => f.write_str(responses::CONNECTION_LOST),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn upload_line_carries_handle_and_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let event = ClientEvent::Uploaded {
            handle: Some("alice".into()),
            filename: "report.txt".into(),
            bytes: 1500,
            at,
        };
        assert_eq!(
            event.to_string(),
            "alice<2024-03-01 09:30:00>: Uploaded report.txt"
        );
    }

    #[test]
    fn registered_renders_welcome() {
        assert_eq!(
            ClientEvent::Registered("bob".into()).to_string(),
            "Welcome bob!"
        );
    }
}
