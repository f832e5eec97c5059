//! Command frame codec: completeness detection and encode/decode.

mod frame;

pub use frame::{frame_status, Frame, FrameStatus};
