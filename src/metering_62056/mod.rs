use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;

pub mod utils;
pub mod structs;
pub mod obis_parser;
#[cfg(feature = "simulator")]
pub mod simulator;

// IEC 62056-21:2002(E) 6.3.1, 6.3.3
pub const REQUEST: &[u8] = b"/?!\r\n";
pub const ACK: &[u8] = b"\x06000\r\n";
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const END_OF_DATA: u8 = b'!';

/// Pause after each write so the meter can process it.
pub const DELAY: Duration = Duration::from_millis(20);

pub const MAX_BLOCK_LEN: usize = 8192;
/// Only the line end of the last data line sits between `!` and ETX.
pub const MAX_TAIL_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransportUnavailable,
    ProtocolViolation,
    ChecksumMismatch,
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Empty string instead of identification")]
    NoResponse,
    #[error("Unexpected device reply: {0}")]
    UnexpectedReply(String),
    #[error("Incomplete frame, meter went silent after {0} bytes")]
    IncompleteFrame(usize),
    #[error("No terminator within {0} bytes")]
    FrameTooLong(usize),
    #[error("Checksum verification failed, calculated {calculated:#04x} but received {received:#04x}")]
    ChecksumMismatch { calculated: u8, received: u8 },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ReadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReadError::NoResponse | ReadError::IncompleteFrame(_) | ReadError::Transport(_) => ErrorKind::TransportUnavailable,
            ReadError::UnexpectedReply(_) | ReadError::FrameTooLong(_) => ErrorKind::ProtocolViolation,
            ReadError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
        }
    }
}

/// Anything that can hand the scheduler one data block per call.
#[async_trait]
pub trait MeterReader: Send {
    /// Returns the raw data block, empty if the meter had nothing to send.
    async fn read(&mut self) -> Result<String, ReadError>;
}

/// Mode C readout client for the ISKRA MT174 and meters speaking the same
/// subset of IEC 62056-21.
pub struct Mt174Client<T: Transport> {
    transport: T,
}

impl<T: Transport> Mt174Client<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// One complete request/identify/acknowledge/data block exchange.
    ///
    /// The transport is opened here and closed again before returning, on the
    /// error paths too.
    pub async fn read_datablock(&mut self) -> Result<String, ReadError> {
        self.transport.open().await?;

        let result = self.exchange().await;

        if self.transport.is_open() {
            if let Err(e) = self.transport.close().await {
                warn!("Closing the transport failed: {}", e);
            }
        }
        result
    }

    async fn exchange(&mut self) -> Result<String, ReadError> {
        debug!("Writing hello message");
        self.transport.write(REQUEST).await?;
        tokio::time::sleep(DELAY).await;

        let line = self.transport.read_line().await?;
        debug!("Got reply: {:?}", String::from_utf8_lossy(&line));
        let identification = utils::parse_identification_line(&line)?;
        info!("Meter {} (manufacturer {}, up to {:?} baud)",
              identification.full_id, identification.manufacturer, identification.max_baud_rate());

        self.transport.write(ACK).await?;
        tokio::time::sleep(DELAY).await;

        match self.transport.read_byte().await? {
            Some(STX) => self.read_frame().await,
            other => {
                // Indistinguishable from a meter that stopped talking after the
                // acknowledgement, reported as an empty reading
                warn!("No STX found ({:?}), not handled", other);
                Ok(String::new())
            }
        }
    }

    /// Reads everything after STX up to and including the BCC.
    async fn read_frame(&mut self) -> Result<String, ReadError> {
        let mut received = 0;
        let mut bcc: u8 = 0;
        let mut datablock: Vec<u8> = Vec::new();

        let mut x = self.next_byte(&mut received).await?;
        while x != END_OF_DATA {
            if datablock.len() >= MAX_BLOCK_LEN {
                return Err(ReadError::FrameTooLong(MAX_BLOCK_LEN));
            }
            bcc ^= x;
            datablock.push(x);
            x = self.next_byte(&mut received).await?;
        }

        let mut tail = 0;
        while x != ETX {
            if tail >= MAX_TAIL_LEN {
                return Err(ReadError::FrameTooLong(MAX_TAIL_LEN));
            }
            bcc ^= x;
            tail += 1;
            x = self.next_byte(&mut received).await?;
        }
        // ETX itself is part of the block check
        bcc ^= x;

        let transmitted = self.next_byte(&mut received).await?;
        if bcc != transmitted {
            return Err(ReadError::ChecksumMismatch { calculated: bcc, received: transmitted });
        }

        debug!("Received data block of {} bytes, BCC {:#04x}", datablock.len(), bcc);
        String::from_utf8(datablock)
            .map_err(|_| ReadError::UnexpectedReply("Data block is not ASCII".to_string()))
    }

    async fn next_byte(&mut self, received: &mut usize) -> Result<u8, ReadError> {
        match self.transport.read_byte().await? {
            Some(b) => {
                *received += 1;
                Ok(b)
            }
            None => Err(ReadError::IncompleteFrame(*received)),
        }
    }
}

#[async_trait]
impl<T: Transport> MeterReader for Mt174Client<T> {
    async fn read(&mut self) -> Result<String, ReadError> {
        self.read_datablock().await
    }
}
