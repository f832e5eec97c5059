//! Protocol constants for the lenslink engine.
//!
//! These values are fixed by the device protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// MTU
// =============================================================================

/// Write payload size assumed before MTU negotiation completes.
pub const DEFAULT_MTU: usize = 20;

/// MTU requested at link establishment; decremented on synchronous rejection.
pub const MAX_REQUEST_MTU: usize = 512;

/// Lowest MTU the request loop will fall back to.
pub const MIN_REQUEST_MTU: usize = DEFAULT_MTU;

// =============================================================================
// OUTBOUND WRITER
// =============================================================================

/// Maximum number of queued chunks coalesced into one transport write.
pub const MAX_COALESCED_CHUNKS: usize = 2;

/// Attempts against the transport write primitive before abandoning a payload.
pub const WRITE_RETRY_LIMIT: u32 = 5;

/// Pause between write attempts.
pub const WRITE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Delay between a write acknowledgment and releasing the in-flight flag.
///
/// Absorbs transport-internal notification reordering around the completion
/// callback.
pub const WRITE_SETTLE_DELAY: Duration = Duration::from_millis(25);

/// Ceiling on one `flush` wait iteration.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// FLOW CONTROL
// =============================================================================

/// Watchdog armed on BLOCKED; expiry forces the gate back to CAN_SEND.
pub const FLOW_CONTROL_WATCHDOG: Duration = Duration::from_millis(2000);

/// Peer grants permission to send.
pub const FLOW_CAN_SEND: u8 = 0x01;

/// Peer revokes permission to send.
pub const FLOW_STOP_SEND: u8 = 0x02;

/// Peer reports a command error.
pub const FLOW_CMD_ERROR: u8 = 0x03;

/// Peer reports an input buffer overflow.
pub const FLOW_OVERFLOW: u8 = 0x04;

/// Reserved peer status code.
pub const FLOW_RESERVED: u8 = 0x05;

/// Peer reports a missing configuration id.
pub const FLOW_MISSING_CONFIG_ID: u8 = 0x06;

// =============================================================================
// FRAMING
// =============================================================================

/// First byte of every command frame.
pub const FRAME_START: u8 = 0xFF;

/// Last byte of every command frame.
pub const FRAME_FOOTER: u8 = 0xAA;

/// Format-byte bit selecting a 16-bit big-endian length field.
pub const FRAME_FMT_WIDE_LENGTH: u8 = 0x10;

/// Format-byte mask for the query-id length nibble.
pub const FRAME_FMT_QUERY_LEN_MASK: u8 = 0x0F;

/// Smallest possible frame: start, command id, format, length, footer.
pub const MIN_FRAME_LEN: usize = 5;

/// Cap on the inbound reassembly buffer; exceeding it drops the buffer.
pub const MAX_REASSEMBLY_BYTES: usize = 4096;
