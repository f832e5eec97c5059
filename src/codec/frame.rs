//! Command frame encoding, decoding, and completeness detection.
//!
//! Frames are self-delimiting:
//!
//! ```text
//! +------+---------+--------+----------------+-----------+---------+------+
//! | 0xFF | command | format | length (1 or 2)| query id  | payload | 0xAA |
//! +------+---------+--------+----------------+-----------+---------+------+
//! ```
//!
//! The format byte selects an 8-bit or 16-bit big-endian length field
//! (bit `0x10`) and carries the query-id length in its low nibble. The
//! length field counts the whole frame, markers included.

use crate::core::constants::{
    FRAME_FMT_QUERY_LEN_MASK, FRAME_FMT_WIDE_LENGTH, FRAME_FOOTER, FRAME_START, MIN_FRAME_LEN,
};
use crate::core::error::CodecError;

/// Completeness of an accumulated inbound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// More bytes are needed.
    Incomplete,
    /// The buffer is exactly one complete, valid frame.
    Complete,
    /// The buffer can never become a valid frame.
    Invalid,
}

/// One decoded command frame.
///
/// The engine treats the payload as opaque; only the framing metadata is
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Vendor command identifier.
    pub command_id: u8,
    /// Optional correlation id echoed by the device (0..=15 bytes).
    pub query_id: Vec<u8>,
    /// Opaque command payload.
    pub data: Vec<u8>,
}

/// Layout derived from the first bytes of a buffer: length-field width,
/// query-id length, and the declared total.
struct FrameHeader {
    header_len: usize,
    query_len: usize,
    total_len: usize,
}

/// Parse the fixed header. `None` means more bytes are needed before the
/// layout can be known.
fn parse_header(buf: &[u8]) -> Option<FrameHeader> {
    if buf.len() < 3 {
        return None;
    }
    let wide = buf[2] & FRAME_FMT_WIDE_LENGTH != 0;
    let query_len = (buf[2] & FRAME_FMT_QUERY_LEN_MASK) as usize;
    let header_len = if wide { 5 } else { 4 };
    if buf.len() < header_len {
        return None;
    }
    let total_len = if wide {
        u16::from_be_bytes([buf[3], buf[4]]) as usize
    } else {
        buf[3] as usize
    };
    Some(FrameHeader {
        header_len,
        query_len,
        total_len,
    })
}

/// Classify an accumulated buffer as incomplete, exactly one complete frame,
/// or structurally invalid.
pub fn frame_status(buf: &[u8]) -> FrameStatus {
    if buf.is_empty() {
        return FrameStatus::Incomplete;
    }
    if buf[0] != FRAME_START {
        return FrameStatus::Invalid;
    }
    let Some(header) = parse_header(buf) else {
        return FrameStatus::Incomplete;
    };
    if header.total_len < header.header_len + header.query_len + 1 {
        return FrameStatus::Invalid;
    }
    if buf.len() < header.total_len {
        return FrameStatus::Incomplete;
    }
    if buf.len() > header.total_len {
        return FrameStatus::Invalid;
    }
    if buf[header.total_len - 1] != FRAME_FOOTER {
        return FrameStatus::Invalid;
    }
    FrameStatus::Complete
}

impl Frame {
    /// Build a frame. The query id is limited to 15 bytes by the format
    /// nibble.
    pub fn new(command_id: u8, query_id: Vec<u8>, data: Vec<u8>) -> Self {
        debug_assert!(query_id.len() <= FRAME_FMT_QUERY_LEN_MASK as usize);
        Self {
            command_id,
            query_id,
            data,
        }
    }

    /// Encode to wire bytes, picking the narrow length form when the frame
    /// fits in a single length byte.
    pub fn encode(&self) -> Vec<u8> {
        let narrow_total = MIN_FRAME_LEN + self.query_id.len() + self.data.len();
        let wide = narrow_total > u8::MAX as usize;
        let total = if wide { narrow_total + 1 } else { narrow_total };

        let mut out = Vec::with_capacity(total);
        out.push(FRAME_START);
        out.push(self.command_id);
        let mut format = self.query_id.len() as u8 & FRAME_FMT_QUERY_LEN_MASK;
        if wide {
            format |= FRAME_FMT_WIDE_LENGTH;
            out.push(format);
            out.extend_from_slice(&(total as u16).to_be_bytes());
        } else {
            out.push(format);
            out.push(total as u8);
        }
        out.extend_from_slice(&self.query_id);
        out.extend_from_slice(&self.data);
        out.push(FRAME_FOOTER);
        out
    }

    /// Decode one complete frame from `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.is_empty() {
            return Err(CodecError::Truncated {
                have: 0,
                need: MIN_FRAME_LEN,
            });
        }
        if buf[0] != FRAME_START {
            return Err(CodecError::InvalidStart(buf[0]));
        }
        let header = parse_header(buf).ok_or(CodecError::Truncated {
            have: buf.len(),
            need: MIN_FRAME_LEN,
        })?;
        let min_total = header.header_len + header.query_len + 1;
        if header.total_len < min_total {
            return Err(CodecError::LengthUnderflow(header.total_len));
        }
        if buf.len() < header.total_len {
            return Err(CodecError::Truncated {
                have: buf.len(),
                need: header.total_len,
            });
        }
        if buf.len() > header.total_len {
            return Err(CodecError::TrailingBytes(buf.len() - header.total_len));
        }
        let footer = buf[header.total_len - 1];
        if footer != FRAME_FOOTER {
            return Err(CodecError::InvalidFooter(footer));
        }
        let query_start = header.header_len;
        let data_start = query_start + header.query_len;
        Ok(Self {
            command_id: buf[1],
            query_id: buf[query_start..data_start].to_vec(),
            data: buf[data_start..header.total_len - 1].to_vec(),
        })
    }
}
