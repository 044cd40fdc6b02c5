use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::error::{ExchangeError, handle_error};
use crate::server::reader::{CommandReader, Incoming};
use crate::server::registry::SharedRegistry;
use crate::server::session::{Session, SessionFlow};

/// Runs the command loop for one connection until it leaves or fails.
///
/// - Reads command lines through a bounded `CommandReader`; payloads
///   following `/store` are read from the same buffer.
/// - Text queued for this client by other sessions is written between
///   commands, never inside a reply or a payload.
/// - The registry entry is released however the loop ends.
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    registry: SharedRegistry,
    config: Arc<ServerConfig>,
) {
    let (read_half, write_half) = stream.into_split();
    let mut lines = CommandReader::new(BufReader::new(read_half), config.max_command_length);
    let (mailbox, mut inbox) = mpsc::unbounded_channel();
    let mut session = Session::new(client_addr, write_half, registry, config, mailbox);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(incoming)) => {
                    let flow = match incoming {
                        Incoming::Line(line) => {
                            debug!("Received from {}: {:?}", client_addr, line);
                            session.handle_line(&line, lines.get_mut()).await
                        }
                        Incoming::TooLong => session.reject_overlong().await,
                    };

                    match flow {
                        Ok(SessionFlow::Continue) => {}
                        Ok(SessionFlow::Close) => {
                            info!("Client {} left", client_addr);
                            break;
                        }
                        Err(e) => {
                            handle_error(&client_addr, &e);
                            break;
                        }
                    }
                }
                Ok(None) => {
                    info!("Connection closed by client {}", client_addr);
                    break;
                }
                Err(e) => {
                    handle_error(&client_addr, &ExchangeError::from(e));
                    break;
                }
            },
            Some(text) = inbox.recv() => {
                if let Err(e) = session.deliver(&text).await {
                    handle_error(&client_addr, &e);
                    break;
                }
            }
        }
    }

    session.close().await;
    info!("Client {} disconnected", client_addr);
}
