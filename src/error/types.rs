//! Error types
//!
//! Defines domain-specific error types for each part of the exchange protocol.
//! Recoverable errors carry the exact reply text sent back to the peer.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Command grammar errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A known verb with the wrong number of arguments
    ArityMismatch(String),
    /// A verb outside the command table
    UnknownCommand(String),
}

impl CommandError {
    pub fn reply(&self) -> &'static str {
        match self {
            CommandError::ArityMismatch(_) => {
                "Error: Command parameters do not match or is not allowed."
            }
            CommandError::UnknownCommand(_) => "Error: Command not found.",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::ArityMismatch(verb) => write!(f, "Wrong argument count for {}", verb),
            CommandError::UnknownCommand(verb) => write!(f, "Unknown command: {:?}", verb),
        }
    }
}

impl std::error::Error for CommandError {}

/// Commands issued in a state that does not allow them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrereqViolation {
    NotConnected,
    AlreadyConnected,
    NotRegistered,
    AlreadyRegistered,
}

impl PrereqViolation {
    pub fn reply(&self) -> &'static str {
        match self {
            PrereqViolation::NotConnected => {
                "Error: Please connect to the server before entering a command. Enter /? for help."
            }
            PrereqViolation::AlreadyConnected => "Error: You are already connected to the server.",
            PrereqViolation::NotRegistered => {
                "Error: You are not registered with the server. Please register first. Type /? for help."
            }
            PrereqViolation::AlreadyRegistered => {
                "Error: You are already registered with the server."
            }
        }
    }
}

impl fmt::Display for PrereqViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrereqViolation::NotConnected => write!(f, "Not connected"),
            PrereqViolation::AlreadyConnected => write!(f, "Already connected"),
            PrereqViolation::NotRegistered => write!(f, "Not registered"),
            PrereqViolation::AlreadyRegistered => write!(f, "Already registered"),
        }
    }
}

impl std::error::Error for PrereqViolation {}

/// Client registry errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateHandle(String),
    AlreadyRegistered(SocketAddr),
    HandleNotFound(String),
}

impl RegistryError {
    pub fn reply(&self) -> &'static str {
        match self {
            RegistryError::DuplicateHandle(_) => "Error: Handle or alias already exists.",
            RegistryError::AlreadyRegistered(_) => PrereqViolation::AlreadyRegistered.reply(),
            RegistryError::HandleNotFound(_) => "Error: Handle not found.",
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateHandle(h) => write!(f, "Handle already taken: {}", h),
            RegistryError::AlreadyRegistered(addr) => {
                write!(f, "Endpoint already registered: {}", addr)
            }
            RegistryError::HandleNotFound(h) => write!(f, "No client registered as {}", h),
        }
    }
}

impl std::error::Error for RegistryError {}

/// File transfer errors
#[derive(Debug)]
pub enum TransferError {
    /// The file to send does not exist
    FileNotFound(String),
    /// The payload grew past the configured limit
    PayloadTooLarge(u64),
    /// Local file system failure; the connection itself is still usable
    Io(io::Error),
    /// The stream ended or failed before the transfer finished
    ConnectionLost(io::Error),
}

impl TransferError {
    /// Whether the error leaves the connection unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferError::ConnectionLost(_))
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::FileNotFound(name) => write!(f, "File not found: {}", name),
            TransferError::PayloadTooLarge(limit) => {
                write!(f, "Payload exceeds limit of {} bytes", limit)
            }
            TransferError::Io(e) => write!(f, "File I/O error: {}", e),
            TransferError::ConnectionLost(e) => write!(f, "Connection lost during transfer: {}", e),
        }
    }
}

impl std::error::Error for TransferError {}

/// Client session errors
#[derive(Debug)]
pub enum ClientError {
    Command(CommandError),
    Prereq(PrereqViolation),
    InvalidPort(String),
    ConnectFailed(io::Error),
    LocalFileNotFound(String),
    ConnectionLost(io::Error),
    Transfer(TransferError),
}

impl ClientError {
    /// Text shown to the user for this error
    pub fn reply(&self) -> String {
        match self {
            ClientError::Command(e) => e.reply().to_string(),
            ClientError::Prereq(e) => e.reply().to_string(),
            ClientError::InvalidPort(_) | ClientError::ConnectFailed(_) => {
                "Error: Connection to the Server has failed! Please check IP Address and Port Number."
                    .to_string()
            }
            ClientError::LocalFileNotFound(_) => "Error: File not found.".to_string(),
            ClientError::ConnectionLost(_)
            | ClientError::Transfer(TransferError::ConnectionLost(_)) => {
                "Error: Connection to the server lost.".to_string()
            }
            ClientError::Transfer(e) => format!("Error: {}", e),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Command(e) => write!(f, "{}", e),
            ClientError::Prereq(e) => write!(f, "{}", e),
            ClientError::InvalidPort(p) => write!(f, "Invalid port: {}", p),
            ClientError::ConnectFailed(e) => write!(f, "Connection failed: {}", e),
            ClientError::LocalFileNotFound(name) => write!(f, "Local file not found: {}", name),
            ClientError::ConnectionLost(e) => write!(f, "Connection lost: {}", e),
            ClientError::Transfer(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<CommandError> for ClientError {
    fn from(error: CommandError) -> Self {
        ClientError::Command(error)
    }
}

impl From<PrereqViolation> for ClientError {
    fn from(error: PrereqViolation) -> Self {
        ClientError::Prereq(error)
    }
}

impl From<TransferError> for ClientError {
    fn from(error: TransferError) -> Self {
        ClientError::Transfer(error)
    }
}

/// General error that encompasses all error types
#[derive(Debug)]
pub enum ExchangeError {
    Command(CommandError),
    Prereq(PrereqViolation),
    Registry(RegistryError),
    Transfer(TransferError),
    /// The peer went away or the socket failed
    ConnectionLost(io::Error),
    /// Bytes that should have been a UTF-8 line were not
    DecodeError(String),
}

impl ExchangeError {
    /// Whether the session has to end because of this error
    pub fn is_fatal(&self) -> bool {
        match self {
            ExchangeError::Transfer(e) => e.is_fatal(),
            ExchangeError::ConnectionLost(_) | ExchangeError::DecodeError(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::Command(e) => write!(f, "Command error: {}", e),
            ExchangeError::Prereq(e) => write!(f, "Prerequisite error: {}", e),
            ExchangeError::Registry(e) => write!(f, "Registry error: {}", e),
            ExchangeError::Transfer(e) => write!(f, "Transfer error: {}", e),
            ExchangeError::ConnectionLost(e) => write!(f, "Connection lost: {}", e),
            ExchangeError::DecodeError(e) => write!(f, "Decode error: {}", e),
        }
    }
}

impl std::error::Error for ExchangeError {}

impl From<CommandError> for ExchangeError {
    fn from(error: CommandError) -> Self {
        ExchangeError::Command(error)
    }
}

impl From<PrereqViolation> for ExchangeError {
    fn from(error: PrereqViolation) -> Self {
        ExchangeError::Prereq(error)
    }
}

impl From<RegistryError> for ExchangeError {
    fn from(error: RegistryError) -> Self {
        ExchangeError::Registry(error)
    }
}

impl From<TransferError> for ExchangeError {
    fn from(error: TransferError) -> Self {
        ExchangeError::Transfer(error)
    }
}

impl From<io::Error> for ExchangeError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::InvalidData {
            ExchangeError::DecodeError(error.to_string())
        } else {
            ExchangeError::ConnectionLost(error)
        }
    }
}
