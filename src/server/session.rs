//! Server-side session state machine
//!
//! One `Session` exists per accepted connection. It owns the write side of
//! the connection and its registration slot, and turns each received line
//! into a reply (or a file transfer).
//!
//! States move `Connected -> Registered -> Closed`; nothing leaves `Closed`.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::config::ServerConfig;
use crate::error::{ExchangeError, PrereqViolation, TransferError};
use crate::protocol::responses;
use crate::protocol::{Command, SessionFlags, check_prerequisites, parse_command};
use crate::server::registry::{Mailbox, SharedRegistry};
use crate::storage;
use crate::transfer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Registered(String),
    Closed,
}

/// What the connection loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    Close,
}

pub struct Session<W> {
    addr: SocketAddr,
    state: SessionState,
    writer: W,
    registry: SharedRegistry,
    config: Arc<ServerConfig>,
    mailbox: Mailbox,
}

impl<W> Session<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        addr: SocketAddr,
        writer: W,
        registry: SharedRegistry,
        config: Arc<ServerConfig>,
        mailbox: Mailbox,
    ) -> Self {
        Self {
            addr,
            state: SessionState::Connected,
            writer,
            registry,
            config,
            mailbox,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn handle(&self) -> Option<&str> {
        match &self.state {
            SessionState::Registered(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn flags(&self) -> SessionFlags {
        SessionFlags {
            connected: self.state != SessionState::Closed,
            registered: self.handle().is_some(),
        }
    }

    /// Processes one command line. `reader` is the connection's read side,
    /// needed when the command is followed by a file payload.
    ///
    /// Recoverable errors are answered on the connection and yield
    /// `SessionFlow::Continue`; an `Err` means the connection is unusable.
    pub async fn handle_line<R>(
        &mut self,
        line: &str,
        reader: &mut R,
    ) -> Result<SessionFlow, ExchangeError>
    where
        R: AsyncBufRead + Unpin,
    {
        if self.state == SessionState::Closed {
            return Ok(SessionFlow::Close);
        }

        if line.len() > self.config.max_command_length {
            self.reply(responses::COMMAND_TOO_LONG).await?;
            return Ok(SessionFlow::Continue);
        }

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("{}: {}", self.addr, e);
                self.reply(e.reply()).await?;
                return Ok(SessionFlow::Continue);
            }
        };

        if let Err(violation) = check_prerequisites(&command, self.flags()) {
            warn!("{}: {} rejected: {}", self.addr, command.verb().token(), violation);
            self.reply(violation.reply()).await?;
            return Ok(SessionFlow::Continue);
        }

        match command {
            Command::Join { .. } => {
                self.reply(PrereqViolation::AlreadyConnected.reply()).await?;
                Ok(SessionFlow::Continue)
            }
            Command::Leave => self.handle_leave().await,
            Command::Register(handle) => self.handle_register(handle).await,
            Command::Dir => self.handle_dir().await,
            Command::Store(filename) => self.handle_store(&filename, reader).await,
            Command::Get(filename) => self.handle_get(&filename).await,
            Command::Broadcast(text) => self.handle_broadcast(&text).await,
            Command::Message { handle, text } => self.handle_message(&handle, &text).await,
            Command::Help => {
                self.reply(responses::SERVER_HELP).await?;
                Ok(SessionFlow::Continue)
            }
        }
    }

    /// Answers a command line that went past `max_command_length`.
    pub async fn reject_overlong(&mut self) -> Result<SessionFlow, ExchangeError> {
        warn!("{}: command line too long", self.addr);
        self.reply(responses::COMMAND_TOO_LONG).await?;
        Ok(SessionFlow::Continue)
    }

    /// Writes text queued by another session's `/broadcast` or `/message`.
    pub async fn deliver(&mut self, text: &str) -> Result<(), ExchangeError> {
        self.reply(text).await
    }

    /// Moves to `Closed` and releases the registry entry. Safe to call twice.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(entry) = self.registry.lock().await.unregister(&self.addr) {
            info!("Unregistered {} ({})", entry.handle(), self.addr);
        }
        self.state = SessionState::Closed;
    }

    async fn reply(&mut self, text: &str) -> Result<(), ExchangeError> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn handle_register(&mut self, handle: String) -> Result<SessionFlow, ExchangeError> {
        let result = self
            .registry
            .lock()
            .await
            .register(self.addr, &handle, self.mailbox.clone());

        match result {
            Ok(()) => {
                info!("Registered {} as {}", self.addr, handle);
                self.reply(&responses::welcome(&handle)).await?;
                self.state = SessionState::Registered(handle);
            }
            Err(e) => {
                warn!("{}: {}", self.addr, e);
                self.reply(e.reply()).await?;
            }
        }
        Ok(SessionFlow::Continue)
    }

    async fn handle_leave(&mut self) -> Result<SessionFlow, ExchangeError> {
        self.close().await;
        self.reply(responses::CONNECTION_CLOSED).await?;
        if let Err(e) = self.writer.shutdown().await {
            debug!("{}: shutdown after leave failed: {}", self.addr, e);
        }
        Ok(SessionFlow::Close)
    }

    async fn handle_dir(&mut self) -> Result<SessionFlow, ExchangeError> {
        match storage::list_directory(&self.config.storage_path()).await {
            Ok(names) => self.reply(&responses::directory_listing(&names)).await?,
            Err(e) => {
                warn!("{}: directory listing failed: {}", self.addr, e);
                self.reply(responses::LIST_FAILED).await?;
            }
        }
        Ok(SessionFlow::Continue)
    }

    async fn handle_store<R>(
        &mut self,
        filename: &str,
        reader: &mut R,
    ) -> Result<SessionFlow, ExchangeError>
    where
        R: AsyncBufRead + Unpin,
    {
        let path = storage::resolve_file(&self.config.storage_path(), filename);
        let limit = Some(self.config.max_file_size_bytes());

        match transfer::receive_file(reader, &path, limit).await {
            Ok(bytes) => {
                info!("{} stored {} ({} bytes)", self.addr, filename, bytes);
                self.reply(&responses::stored(filename)).await?;
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(TransferError::PayloadTooLarge(limit)) => {
                warn!("{}: upload of {} exceeded {} bytes", self.addr, filename, limit);
                self.reply(responses::FILE_TOO_LARGE).await?;
            }
            Err(e) => {
                warn!("{}: storing {} failed: {}", self.addr, filename, e);
                self.reply(responses::STORE_FAILED).await?;
            }
        }
        Ok(SessionFlow::Continue)
    }

    async fn handle_get(&mut self, filename: &str) -> Result<SessionFlow, ExchangeError> {
        let Some(path) = storage::prepare_file_retrieval(&self.config.storage_path(), filename).await
        else {
            self.reply(responses::FILE_NOT_FOUND).await?;
            return Ok(SessionFlow::Continue);
        };

        let header = responses::file_announcement(filename);
        let chunk_size = self.config.chunk_size;
        match transfer::send_file(&path, filename, &header, &mut self.writer, chunk_size).await {
            Ok(bytes) => info!("{} fetched {} ({} bytes)", self.addr, filename, bytes),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(TransferError::FileNotFound(_)) => {
                self.reply(responses::FILE_NOT_FOUND).await?;
            }
            Err(e) => {
                warn!("{}: sending {} failed: {}", self.addr, filename, e);
                self.reply(responses::READ_FAILED).await?;
            }
        }
        Ok(SessionFlow::Continue)
    }

    async fn handle_broadcast(&mut self, text: &str) -> Result<SessionFlow, ExchangeError> {
        let sender = self.handle().unwrap_or_default().to_string();
        let line = responses::broadcast_line(&sender, text);
        let recipients = self.registry.lock().await.broadcast(&self.addr, &line);

        info!("{} broadcast to {} client(s)", sender, recipients);
        self.reply(&responses::broadcast_sent(recipients)).await?;
        Ok(SessionFlow::Continue)
    }

    async fn handle_message(
        &mut self,
        recipient: &str,
        text: &str,
    ) -> Result<SessionFlow, ExchangeError> {
        let sender = self.handle().unwrap_or_default().to_string();
        let line = responses::whisper_line(&sender, text);
        let result = self.registry.lock().await.deliver(recipient, &line);

        match result {
            Ok(()) => self.reply(&responses::message_sent(recipient)).await?,
            Err(e) => {
                warn!("{}: {}", self.addr, e);
                self.reply(e.reply()).await?;
            }
        }
        Ok(SessionFlow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::registry::ClientRegistry;
    use tokio::sync::mpsc;

    struct Harness {
        session: Session<Vec<u8>>,
        registry: SharedRegistry,
        inbox: mpsc::UnboundedReceiver<String>,
        _storage: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let storage = tempfile::tempdir().unwrap();
            let config = ServerConfig {
                storage_dir: storage.path().to_string_lossy().to_string(),
                ..ServerConfig::default()
            };
            Self::with(ClientRegistry::shared(), config, storage, 4000)
        }

        fn with(
            registry: SharedRegistry,
            config: ServerConfig,
            storage: tempfile::TempDir,
            port: u16,
        ) -> Self {
            let (mailbox, inbox) = mpsc::unbounded_channel();
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            let session = Session::new(
                addr,
                Vec::new(),
                Arc::clone(&registry),
                Arc::new(config),
                mailbox,
            );
            Self {
                session,
                registry,
                inbox,
                _storage: storage,
            }
        }

        async fn send(&mut self, line: &str) -> (SessionFlow, String) {
            self.send_with_payload(line, b"").await
        }

        async fn send_with_payload(&mut self, line: &str, payload: &[u8]) -> (SessionFlow, String) {
            let mut reader = payload;
            let flow = self.session.handle_line(line, &mut reader).await.unwrap();
            let output = String::from_utf8_lossy(&self.session.writer).to_string();
            self.session.writer.clear();
            (flow, output)
        }
    }

    #[tokio::test]
    async fn register_then_reject_re_registration() {
        let mut h = Harness::new();

        let (flow, out) = h.send("/register alice").await;
        assert_eq!(flow, SessionFlow::Continue);
        assert_eq!(out, "Welcome alice!\n");
        assert_eq!(h.session.state(), &SessionState::Registered("alice".into()));

        let (_, out) = h.send("/register alicia").await;
        assert_eq!(out, "Error: You are already registered with the server.\n");
        assert_eq!(h.session.handle(), Some("alice"));
        assert_eq!(h.registry.lock().await.list_handles(), vec!["alice"]);
    }

    #[tokio::test]
    async fn duplicate_handle_keeps_session_connected() {
        let mut h = Harness::new();
        let (other, _rx) = mpsc::unbounded_channel();
        h.registry
            .lock()
            .await
            .register(SocketAddr::from(([10, 0, 0, 2], 9)), "alice", other)
            .unwrap();

        let (_, out) = h.send("/register alice").await;
        assert_eq!(out, "Error: Handle or alias already exists.\n");
        assert_eq!(h.session.state(), &SessionState::Connected);
    }

    #[tokio::test]
    async fn arity_and_unknown_errors_do_not_change_state() {
        let mut h = Harness::new();

        for line in ["/register", "/register a b"] {
            let (flow, out) = h.send(line).await;
            assert_eq!(flow, SessionFlow::Continue);
            assert_eq!(
                out,
                "Error: Command parameters do not match or is not allowed.\n"
            );
            assert_eq!(h.session.state(), &SessionState::Connected);
        }

        let (_, out) = h.send("/fly away").await;
        assert_eq!(out, "Error: Command not found.\n");
        assert_eq!(h.session.state(), &SessionState::Connected);
    }

    #[tokio::test]
    async fn registration_is_required_for_file_commands() {
        let mut h = Harness::new();
        for line in ["/dir", "/get a.txt", "/store a.txt", "/broadcast hi", "/message bob hi"] {
            let (_, out) = h.send(line).await;
            assert_eq!(
                out,
                "Error: You are not registered with the server. Please register first. Type /? for help.\n"
            );
        }
    }

    #[tokio::test]
    async fn join_while_connected_is_rejected() {
        let mut h = Harness::new();
        let (_, out) = h.send("/join 127.0.0.1 12345").await;
        assert_eq!(out, "Error: You are already connected to the server.\n");
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        let mut h = Harness::new();
        let line = format!("/register {}", "x".repeat(600));
        let (flow, out) = h.send(&line).await;
        assert_eq!(flow, SessionFlow::Continue);
        assert_eq!(out, "Error: Command too long.\n");
    }

    #[tokio::test]
    async fn empty_directory_lists_only_header() {
        let mut h = Harness::new();
        h.send("/register alice").await;
        let (_, out) = h.send("/dir").await;
        assert_eq!(out, "Server Directory\n");
    }

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let mut h = Harness::new();
        h.send("/register alice").await;

        let body: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
        let mut payload = body.clone();
        payload.extend_from_slice(b"<<EOF>>");

        let (_, out) = h.send_with_payload("/store report.bin", &payload).await;
        assert_eq!(out, "File stored in the server: report.bin\n");

        let (_, out) = h.send("/dir").await;
        assert_eq!(out, "Server Directory\nreport.bin\n");

        let mut reader: &[u8] = b"";
        h.session.handle_line("/get report.bin", &mut reader).await.unwrap();
        let wire = std::mem::take(&mut h.session.writer);
        let header = b"File received from Server: report.bin\n";
        assert!(wire.starts_with(header));
        assert!(wire.ends_with(b"<<EOF>>"));
        assert_eq!(&wire[header.len()..wire.len() - 7], &body[..]);
    }

    #[tokio::test]
    async fn get_missing_file() {
        let mut h = Harness::new();
        h.send("/register alice").await;
        let (flow, out) = h.send("/get nothing.txt").await;
        assert_eq!(flow, SessionFlow::Continue);
        assert_eq!(out, "Error: File not found in the server.\n");
    }

    #[tokio::test]
    async fn store_with_truncated_stream_is_fatal() {
        let mut h = Harness::new();
        h.send("/register alice").await;
        let mut reader: &[u8] = b"no marker here";
        let err = h
            .session
            .handle_line("/store cut.txt", &mut reader)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn oversized_store_is_rejected_but_session_continues() {
        let storage = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage_dir: storage.path().to_string_lossy().to_string(),
            max_file_size_mb: 1,
            ..ServerConfig::default()
        };
        let mut h = Harness::with(ClientRegistry::shared(), config, storage, 4001);
        h.send("/register alice").await;

        let mut payload = vec![b'z'; 1024 * 1024 + 1];
        payload.extend_from_slice(b"<<EOF>>");
        let (flow, out) = h.send_with_payload("/store big.bin", &payload).await;
        assert_eq!(flow, SessionFlow::Continue);
        assert_eq!(out, "Error: File exceeds the server size limit.\n");

        let (_, out) = h.send("/dir").await;
        assert_eq!(out, "Server Directory\n");
    }

    #[tokio::test]
    async fn leave_unregisters_and_closes() {
        let mut h = Harness::new();
        h.send("/register alice").await;

        let (flow, out) = h.send("/leave").await;
        assert_eq!(flow, SessionFlow::Close);
        assert_eq!(out, "Connection closed. Thank you!\n");
        assert_eq!(h.session.state(), &SessionState::Closed);
        assert!(h.registry.lock().await.is_empty());

        let (flow, out) = h.send("/register alice").await;
        assert_eq!(flow, SessionFlow::Close);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn broadcast_and_message_reach_other_sessions() {
        let registry = ClientRegistry::shared();
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let mut alice = Harness::with(Arc::clone(&registry), ServerConfig::default(), dir_a, 4100);
        let mut bob = Harness::with(Arc::clone(&registry), ServerConfig::default(), dir_b, 4101);
        alice.send("/register alice").await;
        bob.send("/register bob").await;

        let (_, out) = alice.send("/broadcast hello   everyone").await;
        assert_eq!(out, "Broadcast sent to 1 user(s).\n");
        assert_eq!(bob.inbox.try_recv().unwrap(), "[broadcast] alice: hello everyone");
        assert!(alice.inbox.try_recv().is_err());

        let (_, out) = bob.send("/message alice psst").await;
        assert_eq!(out, "Message sent to alice.\n");
        let whisper = alice.inbox.try_recv().unwrap();
        assert_eq!(whisper, "[bob whispers]: psst");

        alice.session.deliver(&whisper).await.unwrap();
        assert_eq!(
            String::from_utf8_lossy(alice.session.writer()),
            "[bob whispers]: psst\n"
        );

        let (_, out) = bob.send("/message carol hi").await;
        assert_eq!(out, "Error: Handle not found.\n");
    }

    #[tokio::test]
    async fn help_is_static() {
        let mut h = Harness::new();
        let (_, first) = h.send("/?").await;
        let (_, second) = h.send("/?").await;
        assert_eq!(first, second);
        assert!(first.contains("/register <handle>"));
    }
}
