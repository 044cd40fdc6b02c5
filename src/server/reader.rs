//! Bounded command line reader
//!
//! Reads `\n`-terminated command lines without ever buffering more than
//! `max_command_length + 1` bytes of one line. All progress lives in the
//! reader itself, so `next_line` is cancel-safe and can sit in `select!`.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One unit read from the command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Line(String),
    /// A line went past the limit. The rest of it is skipped.
    TooLong,
}

pub struct CommandReader<R> {
    reader: R,
    pending: Vec<u8>,
    limit: usize,
    discarding: bool,
}

impl<R> CommandReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, limit: usize) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            limit,
            discarding: false,
        }
    }

    /// The underlying reader, for payloads that follow a command.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Returns the next line with any trailing `\r` removed.
    ///
    /// `TooLong` is reported as soon as the limit is crossed, before the
    /// terminating newline arrives. A line that is not UTF-8 is an
    /// `InvalidData` error. `None` means end of stream.
    pub async fn next_line(&mut self) -> io::Result<Option<Incoming>> {
        loop {
            let (consumed, outcome) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    if self.pending.is_empty() {
                        self.discarding = false;
                        return Ok(None);
                    }
                    let line = std::mem::take(&mut self.pending);
                    return decode(line, self.limit).map(Some);
                }

                let newline = available.iter().position(|b| *b == b'\n');
                let end = newline.unwrap_or(available.len());
                let through = newline.map_or(end, |i| i + 1);

                if self.discarding {
                    self.discarding = newline.is_none();
                    (through, None)
                } else if self.pending.len() + end > self.limit + 1 {
                    self.pending.clear();
                    self.discarding = newline.is_none();
                    (through, Some(Incoming::TooLong))
                } else {
                    self.pending.extend_from_slice(&available[..end]);
                    match newline {
                        Some(_) => {
                            let line = std::mem::take(&mut self.pending);
                            (through, Some(decode(line, self.limit)?))
                        }
                        None => (through, None),
                    }
                }
            };

            self.reader.consume(consumed);
            if let Some(outcome) = outcome {
                return Ok(Some(outcome));
            }
        }
    }
}

fn decode(mut line: Vec<u8>, limit: usize) -> io::Result<Incoming> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    if line.len() > limit {
        return Ok(Incoming::TooLong);
    }
    String::from_utf8(line)
        .map(Incoming::Line)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
