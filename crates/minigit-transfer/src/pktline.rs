//! Git pkt-line format implementation.
//!
//! The pkt-line format is used for all smart-HTTP negotiation.
//! Each line is prefixed with a 4-character hex length that counts the
//! prefix itself, or is the literal "0000" for flush.

use crate::{Result, TransferError};
use std::io::{self, Read, Write};

/// Largest length a pkt-line prefix can express.
pub const MAX_PKT_LEN: usize = 0xffff;

/// A pkt-line packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
}

impl PktLine {
    /// Creates a data packet from a string slice.
    pub fn from_string(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }

    /// Encodes the packet to bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Data(data) => {
                let len = data.len() + 4; // 4 bytes for the length prefix
                let mut result = format!("{:04x}", len).into_bytes();
                result.extend_from_slice(data);
                result
            }
            Self::Flush => b"0000".to_vec(),
        }
    }

    /// Returns true if this is a flush packet.
    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush)
    }

    /// Returns the data content, or None for flush.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(data) => Some(data),
            Self::Flush => None,
        }
    }

    /// Returns the data as a string, trimming any trailing newline.
    pub fn as_str(&self) -> Option<&str> {
        self.data()
            .and_then(|d| std::str::from_utf8(d).ok())
            .map(|s| s.trim_end_matches('\n'))
    }
}

/// Reader for pkt-line format.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    /// Creates a new pkt-line reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next packet.
    ///
    /// Returns `None` on a clean end of input between packets. Running out
    /// of input inside a packet is an error.
    pub fn read(&mut self) -> Result<Option<PktLine>> {
        let mut len_buf = Vec::with_capacity(4);
        (&mut self.reader).take(4).read_to_end(&mut len_buf)?;
        match len_buf.len() {
            0 => return Ok(None),
            4 => {}
            n => {
                return Err(TransferError::InvalidPktLine(format!(
                    "truncated length prefix ({} bytes)",
                    n
                )))
            }
        }

        // from_str_radix alone would also accept a leading '+'
        let len_str = std::str::from_utf8(&len_buf)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| {
                TransferError::InvalidPktLine(format!(
                    "invalid length prefix: {:?}",
                    String::from_utf8_lossy(&len_buf)
                ))
            })?;
        if len_str == "0000" {
            return Ok(Some(PktLine::Flush));
        }

        let len = u16::from_str_radix(len_str, 16)
            .map_err(|_| TransferError::InvalidPktLine(format!("invalid length: {}", len_str)))?
            as usize;
        if len < 4 {
            return Err(TransferError::InvalidPktLine(format!(
                "length too small: {}",
                len
            )));
        }

        let mut data = vec![0u8; len - 4];
        self.reader.read_exact(&mut data).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                TransferError::InvalidPktLine(format!("packet truncated, expected {} bytes", len - 4))
            }
            _ => e.into(),
        })?;

        Ok(Some(PktLine::Data(data)))
    }

    /// Reads all packets until a flush packet.
    ///
    /// Running out of input before the flush is an error.
    pub fn read_until_flush(&mut self) -> Result<Vec<PktLine>> {
        let mut packets = Vec::new();
        loop {
            match self.read()? {
                Some(PktLine::Flush) => break,
                Some(pkt) => packets.push(pkt),
                None => {
                    return Err(TransferError::InvalidPktLine(
                        "missing flush packet".to_string(),
                    ))
                }
            }
        }
        Ok(packets)
    }

    /// Consumes the reader and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writer for pkt-line format.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    /// Creates a new pkt-line writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a packet.
    pub fn write(&mut self, pkt: &PktLine) -> Result<()> {
        if let PktLine::Data(data) = pkt {
            if data.len() + 4 > MAX_PKT_LEN {
                return Err(TransferError::InvalidPktLine(format!(
                    "packet too large: {} bytes",
                    data.len()
                )));
            }
        }
        self.writer.write_all(&pkt.encode())?;
        Ok(())
    }

    /// Writes a string line (with newline).
    pub fn write_line(&mut self, s: &str) -> Result<()> {
        let mut data = s.as_bytes().to_vec();
        if !s.ends_with('\n') {
            data.push(b'\n');
        }
        self.write(&PktLine::Data(data))
    }

    /// Writes a flush packet.
    pub fn flush_pkt(&mut self) -> Result<()> {
        self.write(&PktLine::Flush)
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
