//! Link-level flow control.
//!
//! The peer gates outbound transmission with single-byte notifications on a
//! dedicated channel: `0x01` grants permission, `0x02` revokes it, and
//! `0x03..=0x06` report non-blocking protocol errors. A revocation arms a
//! watchdog; if the peer never re-grants, expiry forces the gate open again
//! so a dropped unblock notification cannot stall the writer forever.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::task::JoinHandle;

use super::SessionShared;
use crate::core::constants::{
    FLOW_CAN_SEND, FLOW_CMD_ERROR, FLOW_MISSING_CONFIG_ID, FLOW_OVERFLOW, FLOW_STOP_SEND,
};

/// Non-blocking peer protocol error surfaced to the application observer.
///
/// None of these alter send permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlEvent {
    /// The peer rejected a command (`0x03`).
    CmdError,
    /// The peer's input buffer overflowed (`0x04`).
    Overflow,
    /// Reserved or unrecognized status code (`0x05` and anything unmapped).
    Reserved,
    /// The peer is missing a configuration id (`0x06`).
    MissingConfigId,
}

impl FlowControlEvent {
    /// Map a peer status byte to an observer event.
    ///
    /// Only called for codes that are neither `0x01` nor `0x02`; unknown
    /// codes collapse into [`FlowControlEvent::Reserved`].
    pub(crate) fn from_status(code: u8) -> Self {
        match code {
            FLOW_CMD_ERROR => FlowControlEvent::CmdError,
            FLOW_OVERFLOW => FlowControlEvent::Overflow,
            FLOW_MISSING_CONFIG_ID => FlowControlEvent::MissingConfigId,
            _ => FlowControlEvent::Reserved,
        }
    }
}

/// Send-permission gate plus the watchdog slot.
///
/// The generation counter makes watchdog replacement atomic with respect to
/// incoming notifications: an expiring task re-checks its generation under
/// the slot lock, so a stale watchdog can never resume a gate that a newer
/// BLOCKED notification has re-armed.
#[derive(Debug)]
pub(crate) struct FlowGate {
    can_send: AtomicBool,
    generation: AtomicU64,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl FlowGate {
    pub fn new() -> Self {
        Self {
            can_send: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            watchdog: Mutex::new(None),
        }
    }

    /// Whether the peer currently permits sending.
    pub fn can_send(&self) -> bool {
        self.can_send.load(Ordering::Acquire)
    }

    /// Flip BLOCKED to CAN_SEND. `true` only for the transition, so a
    /// resume is triggered at most once per block.
    pub fn grant(&self) -> bool {
        self.can_send
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn block(&self) {
        self.can_send.store(false, Ordering::Release);
    }
}

impl SessionShared {
    /// Handle one status byte from the flow-control channel.
    pub(crate) fn on_flow_control(self: &Arc<Self>, value: &[u8]) {
        let Some(&code) = value.first() else {
            warn!("[{}] empty flow control notification", self.address);
            return;
        };
        match code {
            FLOW_CAN_SEND => {
                self.cancel_watchdog();
                debug!("[{}] flow control: can send", self.address);
                if self.flow.grant() {
                    self.pump_writes();
                }
            }
            FLOW_STOP_SEND => {
                debug!("[{}] flow control: stop send", self.address);
                self.block_and_arm_watchdog();
            }
            other => {
                let event = FlowControlEvent::from_status(other);
                debug!("[{}] flow control event: {event:?}", self.address);
                let cb = self.observers.lock().unwrap().flow_control.clone();
                if let Some(cb) = cb {
                    cb(event);
                }
            }
        }
    }

    /// Revoke send permission and (re)arm the watchdog, atomically with
    /// respect to a concurrently expiring watchdog.
    fn block_and_arm_watchdog(self: &Arc<Self>) {
        let mut slot = self.flow.watchdog.lock().unwrap();
        self.flow.block();
        let generation = self.flow.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let shared = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(shared.config.watchdog_interval).await;
            let resumed = {
                let _slot = shared.flow.watchdog.lock().unwrap();
                shared.flow.generation.load(Ordering::SeqCst) == generation
                    && shared.flow.grant()
            };
            if resumed {
                warn!(
                    "[{}] flow control watchdog expired; forcing can-send",
                    shared.address
                );
                shared.pump_writes();
            }
        });
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Invalidate and abort any pending watchdog.
    pub(crate) fn cancel_watchdog(&self) {
        self.flow.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.flow.watchdog.lock().unwrap().take() {
            handle.abort();
        }
    }
}
