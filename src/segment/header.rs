//! Segment header codec.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::util::crc::crc32;
use crate::{Error, Result};

/// Header size: segment_id (4) + created_at (8) + header_crc (4) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Fixed-size prefix written once at the start of every segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Segment index this file was created as.
    pub segment_id: u32,
    /// Creation time, nanoseconds since the Unix epoch.
    pub created_at: i64,
    /// CRC32 of the preceding 12 bytes.
    pub header_crc: u32,
}

impl SegmentHeader {
    /// Create a header for the given segment, stamped with the current time.
    pub fn new(segment_id: u32) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        let mut header = Self {
            segment_id,
            created_at,
            header_crc: 0,
        };
        header.header_crc = header.compute_crc();
        header
    }

    /// CRC over the segment_id and created_at fields.
    fn compute_crc(&self) -> u32 {
        let mut buf = [0u8; 12];
        buf[0..4].copy_from_slice(&self.segment_id.to_le_bytes());
        buf[4..12].copy_from_slice(&self.created_at.to_le_bytes());
        crc32(&buf)
    }

    /// Serialize the header to its on-disk form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.segment_id.to_le_bytes());
        buf[4..12].copy_from_slice(&self.created_at.to_le_bytes());
        buf[12..16].copy_from_slice(&self.header_crc.to_le_bytes());
        buf
    }

    /// Parse and validate a header from the start of a segment file.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::InvalidHeaderSize { len: buf.len() });
        }

        let segment_id = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let mut created_at_bytes = [0u8; 8];
        created_at_bytes.copy_from_slice(&buf[4..12]);
        let created_at = i64::from_le_bytes(created_at_bytes);
        let header_crc = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);

        let header = Self {
            segment_id,
            created_at,
            header_crc,
        };

        let expected = header.compute_crc();
        if expected != header.header_crc {
            return Err(Error::InvalidHeaderChecksum {
                expected,
                actual: header.header_crc,
            });
        }

        Ok(header)
    }
}
