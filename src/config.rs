//! Configuration management for the file exchange server and client
//!
//! Values come from an optional TOML file with environment overrides layered
//! on top. Missing keys fall back to the `Default` impls.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::transfer::EOF_MARKER;

/// Server configuration, loaded once at startup
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address the acceptor binds to
    /// Environment: FX_BIND_ADDRESS
    pub bind_address: String,

    /// Listening port (0 picks an ephemeral port)
    /// Environment: FX_PORT
    pub port: u16,

    /// Directory holding stored files
    /// Environment: FX_STORAGE_DIR
    pub storage_dir: String,

    /// Bytes per chunk on the transfer send path
    pub chunk_size: usize,

    /// Longest command line accepted from a client
    pub max_command_length: usize,

    /// Largest upload accepted by `/store`, in MB
    pub max_file_size_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 12345,
            storage_dir: "Server_Files".to_string(),
            chunk_size: 1024,
            max_command_length: 512,
            max_file_size_mb: 100,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (if present) with `FX_` environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the given file stem, e.g. `"config"` for `config.toml`
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("FX"))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.storage_dir.is_empty() {
            return Err(config::ConfigError::Message(
                "storage_dir cannot be empty".into(),
            ));
        }

        validate_chunk_size(self.chunk_size)?;

        if self.max_command_length == 0 {
            return Err(config::ConfigError::Message(
                "max_command_length must be greater than 0".into(),
            ));
        }

        if self.max_file_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_file_size_mb must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and port as a socket string
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_dir)
    }

    /// Get maximum file size in bytes. Saturates for absurdly large settings.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Client-side configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    /// Where files fetched with `/get` are written
    /// Environment: FX_CLIENT_DOWNLOAD_DIR
    pub download_dir: String,

    /// Where files named in `/store` are read from
    /// Environment: FX_CLIENT_UPLOAD_DIR
    pub upload_dir: String,

    /// Bytes per chunk when uploading with `/store`
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            download_dir: ".".to_string(),
            upload_dir: ".".to_string(),
            chunk_size: 1024,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `client.toml` (if present) with `FX_CLIENT_` environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("client").required(false))
            .add_source(Environment::with_prefix("FX_CLIENT"))
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        validate_chunk_size(config.chunk_size)?;
        Ok(config)
    }

    pub fn download_path(&self) -> PathBuf {
        PathBuf::from(&self.download_dir)
    }

    pub fn upload_path(&self) -> PathBuf {
        PathBuf::from(&self.upload_dir)
    }
}

fn validate_chunk_size(chunk_size: usize) -> Result<(), config::ConfigError> {
    if chunk_size < EOF_MARKER.len() {
        return Err(config::ConfigError::Message(format!(
            "chunk_size must be at least {} bytes",
            EOF_MARKER.len()
        )));
    }
    Ok(())
}
