//! Transfer codec
//!
//! Moves files of arbitrary size over the command stream, delimited by an
//! end-of-file marker.

pub mod file_ops;
pub mod framing;

pub use file_ops::{
    STAGING_DIR, open_for_send, receive_file, receive_payload, send_file, send_payload,
    staging_path,
};
pub use framing::{DEFAULT_CHUNK_SIZE, EOF_MARKER, MarkerScanner, ScanOutcome};
