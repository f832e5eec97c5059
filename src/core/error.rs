//! Error types for the lenslink engine.

use thiserror::Error;

/// Errors raised by the frame codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer does not start with the frame start marker.
    #[error("invalid frame start byte: 0x{0:02X}")]
    InvalidStart(u8),

    /// Buffer ended before the declared frame length.
    #[error("truncated frame: have {have} bytes, need {need}")]
    Truncated {
        /// Bytes available.
        have: usize,
        /// Bytes the length field declares.
        need: usize,
    },

    /// Declared length is shorter than the smallest legal frame.
    #[error("declared frame length {0} below minimum")]
    LengthUnderflow(usize),

    /// Frame does not end with the footer marker.
    #[error("invalid frame footer byte: 0x{0:02X}")]
    InvalidFooter(u8),

    /// Buffer extends past the declared frame length.
    #[error("trailing bytes after frame: {0}")]
    TrailingBytes(usize),

    /// Inbound reassembly buffer exceeded its cap and was dropped.
    #[error("reassembly buffer overflow: {size} bytes exceeds limit {limit}")]
    ReassemblyOverflow {
        /// Accumulated size that tripped the cap.
        size: usize,
        /// Configured cap.
        limit: usize,
    },
}

/// Errors raised by session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session for this address is already registered.
    #[error("session already exists for {0}")]
    AlreadyConnected(String),

    /// Session creation requires a running tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}
