//! Client registry
//!
//! Tracks which endpoint holds which handle. Shared between sessions as
//! [`SharedRegistry`]; every mutation goes through the one mutex, so the
//! uniqueness check and the insert in [`ClientRegistry::register`] are atomic.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::error::RegistryError;

/// Channel delivering `/broadcast` and `/message` text to a session.
pub type Mailbox = mpsc::UnboundedSender<String>;

/// Registry handle passed to every session.
pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

/// A registered connection.
#[derive(Debug, Clone)]
pub struct ClientEntry {
    addr: SocketAddr,
    handle: String,
    mailbox: Mailbox,
}

impl ClientEntry {
    pub fn address(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn endpoint(&self) -> &SocketAddr {
        &self.addr
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Queues `text` for this client. Returns false if its session is gone.
    fn send(&self, text: &str) -> bool {
        self.mailbox.send(text.to_string()).is_ok()
    }
}

/// Registry of registered clients, keyed by endpoint
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<SocketAddr, ClientEntry>,
    handles: HashMap<String, SocketAddr>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Registers `handle` for `addr` unless the handle is taken or the endpoint
    /// already holds one.
    pub fn register(
        &mut self,
        addr: SocketAddr,
        handle: &str,
        mailbox: Mailbox,
    ) -> Result<(), RegistryError> {
        if self.clients.contains_key(&addr) {
            return Err(RegistryError::AlreadyRegistered(addr));
        }
        if self.handles.contains_key(handle) {
            return Err(RegistryError::DuplicateHandle(handle.to_string()));
        }

        self.handles.insert(handle.to_string(), addr);
        self.clients.insert(
            addr,
            ClientEntry {
                addr,
                handle: handle.to_string(),
                mailbox,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, addr: &SocketAddr) -> Option<ClientEntry> {
        let entry = self.clients.remove(addr)?;
        self.handles.remove(&entry.handle);
        Some(entry)
    }

    pub fn lookup(&self, addr: &SocketAddr) -> Option<&str> {
        self.clients.get(addr).map(ClientEntry::handle)
    }

    pub fn find(&self, handle: &str) -> Option<&ClientEntry> {
        self.handles
            .get(handle)
            .and_then(|addr| self.clients.get(addr))
    }

    /// All registered handles in sorted order.
    pub fn list_handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self.handles.keys().cloned().collect();
        handles.sort();
        handles
    }

    /// Queues `text` for the client registered as `handle`.
    pub fn deliver(&self, handle: &str, text: &str) -> Result<(), RegistryError> {
        match self.find(handle) {
            Some(entry) if entry.send(text) => Ok(()),
            _ => Err(RegistryError::HandleNotFound(handle.to_string())),
        }
    }

    /// Queues `text` for every registered client except `from`. Returns how many got it.
    pub fn broadcast(&self, from: &SocketAddr, text: &str) -> usize {
        self.clients
            .values()
            .filter(|entry| entry.addr != *from)
            .filter(|entry| entry.send(text))
            .count()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
