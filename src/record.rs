//! Log record codec.
//!
//! Records are serialized with a tag-length-value protobuf encoding so
//! that fields can be added without breaking existing segment files, and
//! framed on disk as a 4-byte little-endian length prefix followed by the
//! encoded bytes. A non-positive length marks end-of-stream during scans.

use std::io::{Read, Write};

use bytes::Bytes;
use prost::Message;

use crate::util::crc::crc32_multi;
use crate::{Error, Result};

/// Size of the length prefix in front of each encoded record.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Record types carried in the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RecordType {
    /// Client payload.
    Data = 0,
    /// Replay anchor; carries no payload.
    Checkpoint = 1,
}

/// A single log record.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogRecord {
    /// Log sequence number, strictly monotonic across the log's lifetime.
    #[prost(uint64, tag = "1")]
    pub lsn: u64,
    /// Record type discriminant.
    #[prost(enumeration = "RecordType", tag = "2")]
    pub record_type: i32,
    /// Opaque payload bytes; empty for checkpoints.
    #[prost(bytes = "bytes", tag = "3")]
    pub data: Bytes,
    /// CRC32 over the payload and the low byte of the LSN.
    #[prost(uint32, tag = "4")]
    pub crc: u32,
}

/// Compute the integrity checksum for a record.
///
/// The checksum covers the payload concatenated with the low byte of the
/// LSN, matching the layout of existing segment files.
pub fn record_crc(data: &[u8], lsn: u64) -> u32 {
    crc32_multi(&[data, &[lsn as u8]])
}

impl LogRecord {
    /// Create a data record carrying the given payload.
    pub fn data(lsn: u64, data: Bytes) -> Self {
        let crc = record_crc(&data, lsn);
        Self {
            lsn,
            record_type: RecordType::Data as i32,
            data,
            crc,
        }
    }

    /// Create a checkpoint record.
    pub fn checkpoint(lsn: u64) -> Self {
        let crc = record_crc(&[], lsn);
        Self {
            lsn,
            record_type: RecordType::Checkpoint as i32,
            data: Bytes::new(),
            crc,
        }
    }

    /// Check whether this record is a checkpoint.
    pub fn is_checkpoint(&self) -> bool {
        self.record_type() == RecordType::Checkpoint
    }

    /// Verify the stored checksum against the record contents.
    pub fn verify_integrity(&self) -> Result<()> {
        let expected = record_crc(&self.data, self.lsn);
        if self.crc != expected {
            return Err(Error::CrcMismatch {
                expected,
                actual: self.crc,
            });
        }
        Ok(())
    }

    /// On-disk size of this record including the length prefix.
    pub fn framed_len(&self) -> usize {
        FRAME_PREFIX_SIZE + self.encoded_len()
    }
}

/// Write a record with its length prefix. Returns the framed size.
pub fn write_framed<W: Write>(writer: &mut W, record: &LogRecord) -> Result<usize> {
    let encoded = record.encode_to_vec();
    if encoded.len() > i32::MAX as usize {
        return Err(Error::RecordTooLarge {
            size: encoded.len(),
        });
    }

    writer.write_all(&(encoded.len() as i32).to_le_bytes())?;
    writer.write_all(&encoded)?;

    Ok(FRAME_PREFIX_SIZE + encoded.len())
}

/// Read the next framed record.
///
/// Returns `None` on a clean end of stream: EOF before a length prefix,
/// or a non-positive length. A frame that is truncated after its prefix,
/// fails to decode, or fails CRC verification is a hard error.
pub fn read_framed<R: Read>(reader: &mut R) -> Result<Option<LogRecord>> {
    let mut len_buf = [0u8; FRAME_PREFIX_SIZE];
    let mut filled = 0;

    while filled < FRAME_PREFIX_SIZE {
        let n = reader.read(&mut len_buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::corruption("truncated record length prefix"));
        }
        filled += n;
    }

    let size = i32::from_le_bytes(len_buf);
    if size <= 0 {
        return Ok(None);
    }

    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::corruption("truncated record body")
        } else {
            Error::from(e)
        }
    })?;

    let record = LogRecord::decode(payload.as_slice())
        .map_err(|e| Error::corruption(format!("record decode failed: {}", e)))?;
    record.verify_integrity()?;

    Ok(Some(record))
}
