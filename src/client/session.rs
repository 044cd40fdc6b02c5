//! Module `session`
//!
//! A connected client: validates commands locally, writes them to the
//! server, and runs the inbound listener as a background task.

use chrono::Local;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::client::events::ClientEvent;
use crate::client::handler::listen;
use crate::client::state::ClientState;
use crate::config::ClientConfig;
use crate::error::{ClientError, TransferError};
use crate::protocol::{Command, check_prerequisites, parse_command, responses};
use crate::transfer;

pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

pub struct ClientSession {
    state: Arc<ClientState>,
    writer: Mutex<OwnedWriteHalf>,
    events: mpsc::UnboundedSender<ClientEvent>,
    config: ClientConfig,
    server_addr: SocketAddr,
    listener: JoinHandle<()>,
}

impl ClientSession {
    /// Opens a connection and starts the inbound listener.
    ///
    /// Events from the listener and from uploads arrive on the returned receiver.
    pub async fn connect(
        host: &str,
        port: &str,
        config: ClientConfig,
    ) -> Result<(Self, EventReceiver), ClientError> {
        let port: u16 = port
            .parse()
            .map_err(|_| ClientError::InvalidPort(port.to_string()))?;

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(ClientError::ConnectFailed)?;
        let server_addr = stream.peer_addr().map_err(ClientError::ConnectFailed)?;
        info!("Connected to {}", server_addr);

        let (read_half, write_half) = stream.into_split();
        let state = Arc::new(ClientState::connected());
        let (events, receiver) = mpsc::unbounded_channel();

        let listener = tokio::spawn(listen(
            BufReader::new(read_half),
            Arc::clone(&state),
            events.clone(),
            config.download_path(),
        ));

        Ok((
            Self {
                state,
                writer: Mutex::new(write_half),
                events,
                config,
                server_addr,
                listener,
            },
            receiver,
        ))
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Validates `raw` and sends it to the server.
    ///
    /// `/store` streams the named local file after the command line. Nothing
    /// is sent when validation fails or the local file is missing.
    pub async fn issue(&self, raw: &str) -> Result<(), ClientError> {
        let command = parse_command(raw)?;
        check_prerequisites(&command, self.state.flags())?;

        match &command {
            Command::Store(filename) => self.upload(filename).await,
            _ => self.send_line(&command.to_string()).await,
        }
    }

    async fn send_line(&self, line: &str) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(ClientError::ConnectionLost)?;
        writer.flush().await.map_err(ClientError::ConnectionLost)
    }

    async fn upload(&self, filename: &str) -> Result<(), ClientError> {
        let path = self.config.upload_path().join(filename);
        let mut file = transfer::open_for_send(&path, filename)
            .await
            .map_err(|e| match e {
                TransferError::FileNotFound(name) => ClientError::LocalFileNotFound(name),
                other => other.into(),
            })?;

        let header = responses::store_announcement(filename);
        let bytes = {
            let mut writer = self.writer.lock().await;
            let sent =
                transfer::send_payload(&header, &mut file, &mut *writer, self.config.chunk_size)
                    .await?;
            writer
                .flush()
                .await
                .map_err(ClientError::ConnectionLost)?;
            sent
        };
        info!("Uploaded {} ({} bytes)", filename, bytes);

        if self
            .events
            .send(ClientEvent::Uploaded {
                handle: self.state.handle(),
                filename: filename.to_string(),
                bytes,
                at: Local::now(),
            })
            .is_err()
        {
            warn!("No receiver for upload event of {}", filename);
        }
        Ok(())
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
