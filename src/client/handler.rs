use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedSender;

use crate::client::events::ClientEvent;
use crate::client::state::ClientState;
use crate::protocol::responses;
use crate::transfer;

/// Inbound listener of a client session.
///
/// Interprets each server line: captures the handle from the welcome,
/// stops on the closing line, and pulls announced files into
/// `download_dir`. Everything else is forwarded as a message. Returns when
/// the client leaves or the connection is lost.
pub async fn listen<R>(
    reader: R,
    state: Arc<ClientState>,
    events: UnboundedSender<ClientEvent>,
    download_dir: PathBuf,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!("Failed to read from server: {}", e);
                break;
            }
        };
        let line = line.trim_end_matches('\r');

        if !state.is_registered() {
            if let Some(handle) = responses::parse_welcome(line) {
                state.set_handle(Some(handle.to_string()));
                let _ = events.send(ClientEvent::Registered(handle.to_string()));
                continue;
            }
        }

        if responses::is_connection_closed(line) {
            state.mark_left();
            let _ = events.send(ClientEvent::Closed(line.to_string()));
            return;
        }

        if let Some(filename) = responses::parse_file_announcement(line) {
            let target = download_dir.join(filename);
            match transfer::receive_file(lines.get_mut(), &target, None).await {
                Ok(bytes) => {
                    let _ = events.send(ClientEvent::FileReceived {
                        filename: filename.to_string(),
                        bytes,
                    });
                }
                Err(e) if e.is_fatal() => {
                    warn!("Connection lost while receiving {}: {}", filename, e);
                    break;
                }
                Err(e) => {
                    let _ = events.send(ClientEvent::TransferFailed(e.to_string()));
                }
            }
            continue;
        }

        let _ = events.send(ClientEvent::Message(line.to_string()));
    }

    state.mark_disconnected();
    let _ = events.send(ClientEvent::ConnectionLost);
}
