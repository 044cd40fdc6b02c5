//! Module `file_ops`
//!
//! Send and receive paths of the transfer codec, plus the file handling
//! around them. Uploads are written to a per-transfer file in a staging
//! directory and renamed into place once the end-of-file marker arrives.

use log::{error, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransferError;
use crate::transfer::framing::{EOF_MARKER, MarkerScanner};

/// Directory, next to the destination, holding files that are still being received.
pub const STAGING_DIR: &str = ".incoming";

static NEXT_TRANSFER_ID: AtomicU64 = AtomicU64::new(0);

/// Writes `header` as a line, then `source` in chunks, then the end-of-file marker.
///
/// A read failure on `source` still terminates the frame so the peer stays in
/// sync; the error is returned after the marker has been written. Failures on
/// `sink` mean the connection is gone.
pub async fn send_payload<R, W>(
    header: &str,
    source: &mut R,
    sink: &mut W,
    chunk_size: usize,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    sink.write_all(header.as_bytes())
        .await
        .map_err(TransferError::ConnectionLost)?;
    sink.write_all(b"\n")
        .await
        .map_err(TransferError::ConnectionLost)?;

    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total_bytes_sent = 0u64;
    let mut read_failure = None;

    loop {
        let n = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Read error while sending payload: {e}");
                read_failure = Some(TransferError::Io(e));
                break;
            }
        };

        sink.write_all(&buffer[..n])
            .await
            .map_err(TransferError::ConnectionLost)?;
        total_bytes_sent += n as u64;
    }

    sink.write_all(EOF_MARKER)
        .await
        .map_err(TransferError::ConnectionLost)?;
    sink.flush().await.map_err(TransferError::ConnectionLost)?;

    match read_failure {
        Some(e) => Err(e),
        None => Ok(total_bytes_sent),
    }
}

/// Reads a payload from `reader` up to the end-of-file marker, writing it to `sink`.
///
/// Bytes after the marker stay buffered in `reader`. If writing to `sink`
/// fails or `limit` is exceeded, the rest of the payload is still drained so
/// the stream remains usable, and the error is returned afterwards.
pub async fn receive_payload<R, W>(
    reader: &mut R,
    sink: &mut W,
    limit: Option<u64>,
) -> Result<u64, TransferError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut scanner = MarkerScanner::new();
    let mut payload = Vec::new();
    let mut total_bytes_received = 0u64;
    let mut failure = None;

    loop {
        let chunk = reader
            .fill_buf()
            .await
            .map_err(TransferError::ConnectionLost)?;
        if chunk.is_empty() {
            return Err(TransferError::ConnectionLost(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended before end-of-file marker",
            )));
        }

        let outcome = scanner.scan(chunk, &mut payload);
        reader.consume(outcome.consumed());

        if failure.is_none() && !payload.is_empty() {
            total_bytes_received += payload.len() as u64;
            if let Some(max) = limit.filter(|max| total_bytes_received > *max) {
                warn!("Payload exceeded limit of {max} bytes, draining the rest");
                failure = Some(TransferError::PayloadTooLarge(max));
            } else if let Err(e) = sink.write_all(&payload).await {
                error!("Failed to write received payload: {e}");
                failure = Some(TransferError::Io(e));
            }
        }
        payload.clear();

        if outcome.is_complete() {
            break;
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }

    sink.flush().await.map_err(TransferError::Io)?;
    Ok(total_bytes_received)
}

/// Opens a file for the send path. A missing file is reported as `FileNotFound`.
pub async fn open_for_send(path: &Path, filename: &str) -> Result<File, TransferError> {
    File::open(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TransferError::FileNotFound(filename.to_string()),
        _ => TransferError::Io(e),
    })
}

/// Sends the file at `path` framed behind `header`.
pub async fn send_file<W>(
    path: &Path,
    filename: &str,
    header: &str,
    sink: &mut W,
    chunk_size: usize,
) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut file = open_for_send(path, filename).await?;
    info!("Starting file send: {}", path.display());
    let total_bytes_sent = send_payload(header, &mut file, sink, chunk_size).await?;
    info!(
        "File send completed: {} ({total_bytes_sent} bytes)",
        path.display()
    );
    Ok(total_bytes_sent)
}

/// Receives a payload into `final_path` through a staging file.
///
/// Every call stages into its own file, so concurrent receives of the same
/// name never share bytes; the last one to finish wins. On any failure the
/// staging file is removed and `final_path` is left untouched.
pub async fn receive_file<R>(
    reader: &mut R,
    final_path: &Path,
    limit: Option<u64>,
) -> Result<u64, TransferError>
where
    R: AsyncBufRead + Unpin,
{
    let temp_path = staging_path(final_path);
    info!(
        "Starting file receive: {} -> {}",
        temp_path.display(),
        final_path.display()
    );

    let created = match prepare_staging_dir(&temp_path).await {
        Ok(()) => {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
                .await
        }
        Err(e) => Err(e),
    };

    let mut temp_file = match created {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to create staging file {}: {e}", temp_path.display());
            // keep the stream aligned even though nothing can be written
            receive_payload(reader, &mut tokio::io::sink(), None).await?;
            return Err(TransferError::Io(e));
        }
    };

    let result = receive_payload(reader, &mut temp_file, limit).await;
    drop(temp_file);

    let total_bytes_received = match result {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&temp_path, final_path).await {
        error!(
            "Failed to rename {} to {}: {e}",
            temp_path.display(),
            final_path.display()
        );
        let _ = fs::remove_file(&temp_path).await;
        return Err(TransferError::Io(e));
    }

    info!(
        "File receive completed: {} ({total_bytes_received} bytes)",
        final_path.display()
    );
    Ok(total_bytes_received)
}

/// A fresh staging path for one receive of `path`. Never returns the same path twice.
pub fn staging_path(path: &Path) -> PathBuf {
    let id = NEXT_TRANSFER_ID.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}-{}", std::process::id(), id));

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(STAGING_DIR).join(name)
}

/// Creates the staging directory. Its parent must already exist.
async fn prepare_staging_dir(temp_path: &Path) -> io::Result<()> {
    let Some(dir) = temp_path.parent() else {
        return Ok(());
    };
    match fs::create_dir(dir).await {
        Err(e) if e.kind() != io::ErrorKind::AlreadyExists => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_path_frames_header_body_and_marker() {
        let mut source: &[u8] = b"0123456789";
        let mut wire = Vec::new();
        let sent = send_payload("/store digits.txt", &mut source, &mut wire, 4)
            .await
            .unwrap();
        assert_eq!(sent, 10);
        assert_eq!(wire, b"/store digits.txt\n0123456789<<EOF>>");
    }

    #[tokio::test]
    async fn receive_path_stops_at_marker() {
        let mut wire: &[u8] = b"some bytes<<EOF>>/dir\n";
        let mut sink = Vec::new();
        let received = receive_payload(&mut wire, &mut sink, None).await.unwrap();
        assert_eq!(received, 10);
        assert_eq!(sink, b"some bytes");
        assert_eq!(wire, b"/dir\n");
    }

    #[tokio::test]
    async fn receive_path_handles_small_reads() {
        let data = b"chunked payload<<EOF>>rest";
        let mut reader = tokio::io::BufReader::with_capacity(3, &data[..]);
        let mut sink = Vec::new();
        receive_payload(&mut reader, &mut sink, None).await.unwrap();
        assert_eq!(sink, b"chunked payload");

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "rest");
    }

    #[tokio::test]
    async fn missing_marker_is_connection_lost() {
        let mut wire: &[u8] = b"truncated";
        let mut sink = Vec::new();
        let err = receive_payload(&mut wire, &mut sink, None)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn oversized_payload_is_drained() {
        let mut wire: &[u8] = b"0123456789abcdef<<EOF>>/leave\n";
        let mut sink = Vec::new();
        let err = receive_payload(&mut wire, &mut sink, Some(4))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::PayloadTooLarge(4)));
        assert_eq!(wire, b"/leave\n");
    }

    #[tokio::test]
    async fn receive_file_renames_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.txt");
        let mut wire: &[u8] = b"line one\nline two\n<<EOF>>";

        let received = receive_file(&mut wire, &target, None).await.unwrap();
        assert_eq!(received, 18);
        assert_eq!(
            std::fs::read(&target).unwrap(),
            b"line one\nline two\n".to_vec()
        );
        let staging = std::fs::read_dir(dir.path().join(STAGING_DIR)).unwrap();
        assert_eq!(staging.count(), 0);
    }

    #[tokio::test]
    async fn concurrent_receives_of_one_name_do_not_mix() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.txt");

        let (mut first_tx, first_rx) = tokio::io::duplex(64);
        let (mut second_tx, second_rx) = tokio::io::duplex(64);

        first_tx.write_all(b"AAAA").await.unwrap();
        let first = tokio::spawn({
            let target = target.clone();
            async move {
                let mut reader = tokio::io::BufReader::new(first_rx);
                receive_file(&mut reader, &target, None).await
            }
        });
        tokio::task::yield_now().await;

        second_tx.write_all(b"BBBB").await.unwrap();
        let second = tokio::spawn({
            let target = target.clone();
            async move {
                let mut reader = tokio::io::BufReader::new(second_rx);
                receive_file(&mut reader, &target, None).await
            }
        });
        tokio::task::yield_now().await;

        first_tx.write_all(b"<<EOF>>").await.unwrap();
        assert_eq!(first.await.unwrap().unwrap(), 4);
        assert_eq!(std::fs::read(&target).unwrap(), b"AAAA".to_vec());

        second_tx.write_all(b"CC<<EOF>>").await.unwrap();
        assert_eq!(second.await.unwrap().unwrap(), 6);
        assert_eq!(std::fs::read(&target).unwrap(), b"BBBBCC".to_vec());
    }

    #[tokio::test]
    async fn receive_file_into_missing_directory_keeps_stream_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("no-such-dir").join("x.bin");
        let mut wire: &[u8] = b"abc<<EOF>>/dir\n";

        let err = receive_file(&mut wire, &target, None).await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
        assert_eq!(wire, b"/dir\n");
    }

    #[tokio::test]
    async fn send_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut wire = Vec::new();
        let err = send_file(
            &dir.path().join("ghost.txt"),
            "ghost.txt",
            "File received from Server: ghost.txt",
            &mut wire,
            1024,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransferError::FileNotFound(name) if name == "ghost.txt"));
        assert!(wire.is_empty());
    }

    #[test]
    fn staging_paths_are_unique_and_hidden() {
        let first = staging_path(Path::new("dir/report.txt"));
        let second = staging_path(Path::new("dir/report.txt"));
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("dir/.incoming")));
        assert!(
            first
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("report.txt.")
        );
    }
}
