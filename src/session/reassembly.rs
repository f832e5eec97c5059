//! Inbound frame reassembly.
//!
//! Notification payloads on the command-data channel may carry a fragment of
//! a frame. At most one partial frame is buffered per session; a buffer that
//! becomes a complete frame is consumed immediately, so the buffer never
//! holds a complete valid frame between notifications.

use crate::codec::{frame_status, Frame, FrameStatus};
use crate::core::error::CodecError;

/// Result of feeding one notification payload into the buffer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReassemblyOutcome {
    /// Exactly one complete frame; the buffer is now empty.
    Frame(Vec<u8>),
    /// More data is needed; the fragment is buffered.
    Pending,
    /// The accumulated bytes can never form a valid frame; dropped.
    Dropped(CodecError),
}

/// Accumulator for at most one partial inbound frame.
#[derive(Debug, Default)]
pub(crate) struct ReassemblyBuffer {
    pending: Option<Vec<u8>>,
}

impl ReassemblyBuffer {
    /// Append `payload` to any buffered fragment and classify the result.
    pub fn accept(&mut self, payload: &[u8], limit: usize) -> ReassemblyOutcome {
        let buf = match self.pending.take() {
            Some(mut pending) => {
                pending.extend_from_slice(payload);
                pending
            }
            None => payload.to_vec(),
        };

        match frame_status(&buf) {
            FrameStatus::Complete => ReassemblyOutcome::Frame(buf),
            FrameStatus::Incomplete => {
                if buf.len() > limit {
                    ReassemblyOutcome::Dropped(CodecError::ReassemblyOverflow {
                        size: buf.len(),
                        limit,
                    })
                } else {
                    self.pending = Some(buf);
                    ReassemblyOutcome::Pending
                }
            }
            FrameStatus::Invalid => {
                let err = Frame::decode(&buf)
                    .err()
                    .unwrap_or(CodecError::InvalidFooter(buf[buf.len() - 1]));
                ReassemblyOutcome::Dropped(err)
            }
        }
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.pending.as_ref().map_or(0, Vec::len)
    }

    /// Discard any buffered fragment.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
