use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::server::handler::handle_client;
use crate::server::registry::{ClientRegistry, SharedRegistry};
use crate::storage;

/// Connection acceptor. Owns the listening socket and the shared registry.
pub struct Server {
    registry: SharedRegistry,
    listener: TcpListener,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Prepares the storage directory and binds the configured endpoint.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let storage_root = config.storage_path();
        if let Err(e) = storage::ensure_storage_dir(&storage_root).await {
            warn!("Failed to create storage directory: {}", e);
        } else {
            info!("Storage directory: {}", storage_root.display());
        }

        let socket = config.listen_socket();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e);
            }
        };
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            registry: ClientRegistry::shared(),
            listener,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Accepts connections forever, one task per connection.
    ///
    /// Accept failures are logged and the loop keeps going.
    pub async fn run(&self) -> io::Result<()> {
        info!("Server is listening on {}", self.local_addr()?);

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    continue;
                }
            };
            info!("Accepted connection from {}", addr);

            let registry = Arc::clone(&self.registry);
            let config = Arc::clone(&self.config);

            // Spawn a task for each client so accept loop doesn't block
            tokio::spawn(async move {
                handle_client(stream, addr, registry, config).await;
            });
        }
    }
}
