//! Byte oriented channel to the meter.
//!
//! The protocol client only needs a handful of operations from the link: open it,
//! push raw bytes, and pull bytes back with a read timeout. A read that runs into
//! the timeout is not an error, it simply yields nothing.

use async_trait::async_trait;
use thiserror::Error;

pub mod serial;
#[cfg(test)]
pub mod scripted;

pub use serial::{SerialSettings, SerialTransport};

/// Longest line `read_line` will buffer before handing it back.
pub const MAX_LINE_LEN: usize = 128;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unable to open {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("Transport is not open")]
    NotOpen,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Transport: Send {
    async fn open(&mut self) -> Result<(), TransportError>;

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Reads one byte, `None` if nothing arrived within the read timeout.
    async fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Reads up to and including the next `\n`.
    ///
    /// Stops early on a read timeout or after [`MAX_LINE_LEN`] bytes, so the
    /// returned line may be empty or unterminated.
    async fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut line = Vec::new();
        while line.len() < MAX_LINE_LEN {
            match self.read_byte().await? {
                Some(b) => {
                    line.push(b);
                    if b == b'\n' {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(line)
    }

    async fn close(&mut self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;
}
