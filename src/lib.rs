//! # LensLink
//!
//! Client-side protocol engine for a BLE-connected wearable display.
//!
//! The device exposes its command interface as a GATT server: commands go in
//! through one characteristic, responses and events come back as
//! notifications on others, every transfer capped by the negotiated MTU.
//! LensLink turns that link into something an application can use directly:
//!
//! - **Bring-up**: a strictly ordered handshake (MTU, discovery, five
//!   notification subscriptions, six identity reads) that ends in a usable
//!   command channel
//! - **Reliability**: FIFO chunked writes with a single write in flight,
//!   bounded retries, and a post-write settle delay
//! - **Flow control**: peer-driven send gating with a watchdog against lost
//!   resume notifications
//! - **Framing**: reassembly of MTU-fragmented inbound frames and a codec
//!   for the device's command frame format
//!
//! The engine is transport-agnostic: the platform BLE integration implements
//! [`GattTransport`] and feeds [`GattEvent`]s into the session; everything
//! else is portable.
//!
//! ## Modules
//!
//! - [`core`]: Protocol constants and error types
//! - [`gatt`]: Transport abstraction, channels, and events
//! - [`codec`]: Command frame encoding and decoding
//! - [`session`]: Per-device session engine
//! - [`sdk`]: Entry point and session registry
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lenslink::prelude::*;
//!
//! # fn platform_transport() -> Arc<dyn GattTransport> { unimplemented!() }
//! # async fn run() -> Result<(), SessionError> {
//! let sdk = BleSdk::new();
//! let session = sdk.connect(
//!     "DF:11:A0:37:2C:41",
//!     platform_transport(),
//!     SessionCallbacks::new()
//!         .on_connected(|| println!("ready"))
//!         .on_disconnected(|| println!("gone")),
//! )?;
//!
//! session.subscribe_battery_level(|level| println!("battery: {level}%"));
//!
//! // ... once connected, queue command frames:
//! session.enqueue(&Frame::new(0x01, vec![], vec![1]).encode());
//! session.flush().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod core;
pub mod gatt;
pub mod sdk;
pub mod session;

#[cfg(test)]
mod testutil;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::{Frame, FrameStatus};
    pub use crate::core::{CodecError, SessionError};
    pub use crate::gatt::{Channel, GattEvent, GattTransport, LinkState};
    pub use crate::sdk::BleSdk;
    pub use crate::session::{
        DeviceInformation, DeviceSession, FlowControlEvent, HandshakePhase, SessionCallbacks,
        SessionConfig, SessionConfigBuilder,
    };
}

// Re-export commonly used items at crate root
pub use codec::Frame;
pub use self::core::{CodecError, SessionError};
pub use gatt::{Channel, GattEvent, GattTransport, LinkState};
pub use sdk::BleSdk;
pub use session::{DeviceSession, SessionCallbacks, SessionConfig};
