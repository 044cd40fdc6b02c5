//! Payload framing
//!
//! A file payload is raw bytes followed by the literal `<<EOF>>` marker.
//! There is no length prefix, so a payload that itself contains the marker
//! is cut short at its first occurrence. This is a known limitation kept
//! for wire compatibility.

/// Terminates every file payload, in both directions.
pub const EOF_MARKER: &[u8] = b"<<EOF>>";

/// Default number of bytes per read/write on the send path.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Result of feeding one chunk into a [`MarkerScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The whole chunk was consumed and the marker has not been seen yet.
    Pending { consumed: usize },
    /// The marker ended `consumed` bytes into the chunk. Anything after it
    /// belongs to the next message.
    Complete { consumed: usize },
}

impl ScanOutcome {
    pub fn consumed(&self) -> usize {
        match *self {
            ScanOutcome::Pending { consumed } | ScanOutcome::Complete { consumed } => consumed,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ScanOutcome::Complete { .. })
    }
}

/// Incremental search for the end-of-file marker across arbitrary chunk boundaries.
///
/// Up to `EOF_MARKER.len() - 1` trailing bytes are held back between calls,
/// because they might be the start of a marker split across two reads.
#[derive(Debug, Default)]
pub struct MarkerScanner {
    held: Vec<u8>,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `chunk`, appending every byte known to be payload to `out`.
    pub fn scan(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> ScanOutcome {
        let mut window = std::mem::take(&mut self.held);
        let held_len = window.len();
        window.extend_from_slice(chunk);

        if let Some(pos) = find_marker(&window) {
            out.extend_from_slice(&window[..pos]);
            // held bytes can never contain a whole marker, so this is at least 1
            let consumed = pos + EOF_MARKER.len() - held_len;
            return ScanOutcome::Complete { consumed };
        }

        let keep = (EOF_MARKER.len() - 1).min(window.len());
        let split = window.len() - keep;
        out.extend_from_slice(&window[..split]);
        self.held = window.split_off(split);

        ScanOutcome::Pending {
            consumed: chunk.len(),
        }
    }
}

fn find_marker(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(EOF_MARKER.len())
        .position(|window| window == EOF_MARKER)
}
