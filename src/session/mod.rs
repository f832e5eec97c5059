//! Device session: one per connected peer.
//!
//! A [`DeviceSession`] owns all per-peer protocol state — handshake phase,
//! negotiated MTU, identity record, pending write queue, flow-control gate,
//! and the inbound reassembly buffer. The platform transport integration
//! feeds every asynchronous callback into [`DeviceSession::handle_event`];
//! the application talks to the session through `enqueue`, `flush`, and the
//! subscription methods.
//!
//! Two execution contexts drive a session: the transport's callback context
//! (all `handle_event` calls, serial per session) and the tokio runtime
//! (settle delay, flow-control watchdog, write retries). The pending write
//! queue and the in-flight flag are the only state touched from both and are
//! a mutex-protected queue plus a compare-and-set flag.

mod flow;
mod handshake;
mod info;
mod reassembly;
mod writer;

pub use flow::FlowControlEvent;
pub use handshake::HandshakePhase;
pub use info::DeviceInformation;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::codec::Frame;
use crate::core::constants::{
    DEFAULT_MTU, FLUSH_TIMEOUT, FLOW_CONTROL_WATCHDOG, MAX_REASSEMBLY_BYTES, MAX_REQUEST_MTU,
    MIN_REQUEST_MTU, WRITE_RETRY_DELAY, WRITE_RETRY_LIMIT, WRITE_SETTLE_DELAY,
};
use crate::core::error::SessionError;
use crate::gatt::{Channel, GattEvent, GattTransport, LinkState};
use crate::sdk::SessionRegistry;
use flow::FlowGate;
use handshake::HandshakeState;
use reassembly::{ReassemblyBuffer, ReassemblyOutcome};

/// Tunable session parameters.
///
/// Defaults are the device protocol values from [`crate::core::constants`];
/// most integrations never change them.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// MTU requested at link establishment.
    pub request_mtu: usize,
    /// Attempts against the transport write primitive per payload.
    pub write_retry_limit: u32,
    /// Pause between write attempts.
    pub write_retry_delay: Duration,
    /// Delay between write acknowledgment and the next drain.
    pub settle_delay: Duration,
    /// Flow-control watchdog interval.
    pub watchdog_interval: Duration,
    /// Ceiling on one `flush` wait iteration.
    pub flush_timeout: Duration,
    /// Cap on the inbound reassembly buffer.
    pub reassembly_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_mtu: MAX_REQUEST_MTU,
            write_retry_limit: WRITE_RETRY_LIMIT,
            write_retry_delay: WRITE_RETRY_DELAY,
            settle_delay: WRITE_SETTLE_DELAY,
            watchdog_interval: FLOW_CONTROL_WATCHDOG,
            flush_timeout: FLUSH_TIMEOUT,
            reassembly_limit: MAX_REASSEMBLY_BYTES,
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a builder with protocol defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the MTU requested at link establishment.
    pub fn request_mtu(mut self, mtu: usize) -> Self {
        self.config.request_mtu = mtu;
        self
    }

    /// Set the per-payload write retry limit.
    pub fn write_retry_limit(mut self, limit: u32) -> Self {
        self.config.write_retry_limit = limit;
        self
    }

    /// Set the pause between write attempts.
    pub fn write_retry_delay(mut self, delay: Duration) -> Self {
        self.config.write_retry_delay = delay;
        self
    }

    /// Set the post-acknowledgment settle delay.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set the flow-control watchdog interval.
    pub fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.config.watchdog_interval = interval;
        self
    }

    /// Set the flush wait ceiling.
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.config.flush_timeout = timeout;
        self
    }

    /// Set the inbound reassembly cap.
    pub fn reassembly_limit(mut self, limit: usize) -> Self {
        self.config.reassembly_limit = limit;
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// Session lifecycle callbacks.
///
/// `connected` fires exactly once, after the final identity read completes.
/// Link loss before that point fires `connection_failed` instead of
/// `disconnected`.
#[derive(Default)]
pub struct SessionCallbacks {
    on_connected: Option<Box<dyn Fn() + Send + Sync>>,
    on_connection_failed: Option<Box<dyn Fn() + Send + Sync>>,
    on_disconnected: Option<Box<dyn Fn() + Send + Sync>>,
}

impl SessionCallbacks {
    /// Create an empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked once when the handshake reaches `Ready`.
    pub fn on_connected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Box::new(f));
        self
    }

    /// Invoked on link loss before the handshake completes.
    pub fn on_connection_failed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connection_failed = Some(Box::new(f));
        self
    }

    /// Invoked on link loss after the handshake completed.
    pub fn on_disconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Box::new(f));
        self
    }
}

/// Application observers registered after connect.
#[derive(Default)]
pub(crate) struct Observers {
    pub battery: Option<Arc<dyn Fn(u8) + Send + Sync>>,
    pub flow_control: Option<Arc<dyn Fn(FlowControlEvent) + Send + Sync>>,
    pub sensor: Option<Arc<dyn Fn() + Send + Sync>>,
    pub command: Option<Arc<dyn Fn(Frame) + Send + Sync>>,
}

/// State shared between the public handle, transport callbacks, and timer
/// tasks.
pub(crate) struct SessionShared {
    pub(crate) address: String,
    pub(crate) config: SessionConfig,
    pub(crate) transport: Arc<dyn GattTransport>,
    pub(crate) runtime: Handle,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) mtu: AtomicUsize,
    pub(crate) handshake: Mutex<HandshakeState>,
    pub(crate) info: Mutex<DeviceInformation>,
    pub(crate) queue: Mutex<VecDeque<Vec<u8>>>,
    pub(crate) writing: AtomicBool,
    pub(crate) queue_drained: Notify,
    pub(crate) flow: FlowGate,
    pub(crate) reassembly: Mutex<ReassemblyBuffer>,
    pub(crate) lifecycle: Mutex<SessionCallbacks>,
    pub(crate) observers: Mutex<Observers>,
}

/// Handle to one device session. Cloning is cheap and all clones refer to
/// the same session.
#[derive(Clone)]
pub struct DeviceSession {
    shared: Arc<SessionShared>,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("address", &self.shared.address)
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    pub(crate) fn create(
        address: String,
        transport: Arc<dyn GattTransport>,
        config: SessionConfig,
        callbacks: SessionCallbacks,
        registry: Arc<SessionRegistry>,
    ) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|e| SessionError::NoRuntime(e.to_string()))?;
        Ok(Self {
            shared: Arc::new(SessionShared {
                address,
                config,
                transport,
                runtime,
                registry,
                mtu: AtomicUsize::new(DEFAULT_MTU),
                handshake: Mutex::new(HandshakeState::new()),
                info: Mutex::new(DeviceInformation::default()),
                queue: Mutex::new(VecDeque::new()),
                writing: AtomicBool::new(false),
                queue_drained: Notify::new(),
                flow: FlowGate::new(),
                reassembly: Mutex::new(ReassemblyBuffer::default()),
                lifecycle: Mutex::new(callbacks),
                observers: Mutex::new(Observers::default()),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    /// Peer address this session is bound to.
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Currently negotiated write payload size.
    pub fn mtu(&self) -> usize {
        self.shared.mtu.load(Ordering::Acquire)
    }

    /// Current handshake phase.
    pub fn phase(&self) -> HandshakePhase {
        self.shared.handshake.lock().unwrap().phase
    }

    /// `true` once the handshake has reached `Ready`.
    pub fn is_connected(&self) -> bool {
        self.phase().is_ready()
    }

    /// Snapshot of the identity record read during the handshake.
    pub fn device_information(&self) -> DeviceInformation {
        self.shared.info.lock().unwrap().clone()
    }

    /// Number of chunks awaiting transmission.
    pub fn pending_writes(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// Feed one transport callback into the engine.
    pub fn handle_event(&self, event: GattEvent) {
        self.shared.handle_event(event);
    }

    /// Queue a command frame for transmission.
    ///
    /// The frame is split into MTU-sized chunks and drained in FIFO order,
    /// one transport write at a time, gated by peer flow control.
    pub fn enqueue(&self, frame: &[u8]) {
        self.shared.enqueue_frame(frame);
    }

    /// Wait until every queued chunk has been written and acknowledged.
    ///
    /// Bounded wait; returns without error on timeout. Must not be called
    /// from the transport callback context.
    pub async fn flush(&self) {
        self.shared.flush_writes().await;
    }

    /// Tear the session down: cancel timers, abandon pending writes, release
    /// the transport, and unregister.
    pub fn disconnect(&self) {
        self.shared.teardown();
    }

    /// Register the battery-level observer (single byte, percent).
    pub fn subscribe_battery_level(&self, f: impl Fn(u8) + Send + Sync + 'static) {
        self.shared.observers.lock().unwrap().battery = Some(Arc::new(f));
    }

    /// Register the observer for peer protocol errors on the flow-control
    /// channel.
    pub fn subscribe_flow_control(&self, f: impl Fn(FlowControlEvent) + Send + Sync + 'static) {
        self.shared.observers.lock().unwrap().flow_control = Some(Arc::new(f));
    }

    /// Register the sensor-interface event observer.
    pub fn subscribe_sensor_interface(&self, f: impl Fn() + Send + Sync + 'static) {
        self.shared.observers.lock().unwrap().sensor = Some(Arc::new(f));
    }

    /// Register the observer for decoded inbound command frames.
    pub fn subscribe_command_frames(&self, f: impl Fn(Frame) + Send + Sync + 'static) {
        self.shared.observers.lock().unwrap().command = Some(Arc::new(f));
    }
}

impl SessionShared {
    fn handle_event(self: &Arc<Self>, event: GattEvent) {
        match event {
            GattEvent::LinkStateChanged(LinkState::Connected) => self.on_link_up(),
            GattEvent::LinkStateChanged(LinkState::Disconnected) => self.on_link_down(),
            GattEvent::MtuResolved { mtu, success } => self.on_mtu_resolved(mtu, success),
            GattEvent::ServicesReady => self.on_services_ready(),
            GattEvent::DescriptorWritten { channel, success } => {
                self.on_descriptor_written(channel, success)
            }
            GattEvent::CharacteristicRead {
                channel,
                value,
                success,
            } => self.on_characteristic_read(channel, value, success),
            GattEvent::CharacteristicWritten { channel, .. } => {
                if channel == Channel::CommandRx {
                    self.on_command_write_complete();
                }
            }
            GattEvent::CharacteristicNotified { channel, value } => {
                self.on_notified(channel, value)
            }
        }
    }

    /// Link up: request the largest MTU the transport will accept.
    fn on_link_up(self: &Arc<Self>) {
        {
            let mut hs = self.handshake.lock().unwrap();
            if hs.phase != HandshakePhase::LinkPending {
                warn!(
                    "[{}] link up in phase {:?}, ignoring",
                    self.address, hs.phase
                );
                return;
            }
            hs.phase = HandshakePhase::MtuNegotiating;
        }
        let mut request = self.config.request_mtu;
        loop {
            if self.transport.request_mtu(request) {
                debug!("[{}] mtu request accepted at {request}", self.address);
                break;
            }
            if request <= MIN_REQUEST_MTU {
                warn!("[{}] transport rejected every mtu request", self.address);
                break;
            }
            request -= 1;
        }
    }

    fn on_mtu_resolved(self: &Arc<Self>, mtu: usize, success: bool) {
        let mut hs = self.handshake.lock().unwrap();
        if hs.phase != HandshakePhase::MtuNegotiating {
            debug!("[{}] stray mtu result in phase {:?}", self.address, hs.phase);
            return;
        }
        if success {
            hs.phase = HandshakePhase::ServicesDiscovering;
            drop(hs);
            self.mtu.store(mtu, Ordering::Release);
            info!("[{}] mtu negotiated: {mtu}", self.address);
            if !self.transport.discover_services() {
                warn!("[{}] transport rejected service discovery", self.address);
            }
        } else if !hs.mtu_retry_spent {
            hs.mtu_retry_spent = true;
            drop(hs);
            warn!("[{}] mtu negotiation failed, retrying once", self.address);
            if !self.transport.request_mtu(mtu) {
                warn!("[{}] mtu re-request rejected", self.address);
            }
        } else {
            warn!("[{}] mtu negotiation failed after retry", self.address);
        }
    }

    fn on_services_ready(self: &Arc<Self>) {
        let mut hs = self.handshake.lock().unwrap();
        if hs.phase != HandshakePhase::ServicesDiscovering {
            debug!(
                "[{}] stray discovery result in phase {:?}",
                self.address, hs.phase
            );
            return;
        }
        hs.phase = HandshakePhase::NotifyFlowControl;
        drop(hs);
        if !self.transport.enable_notifications(Channel::FlowControl) {
            warn!("[{}] transport rejected notification enable", self.address);
        }
    }

    /// A descriptor-write acknowledgment advances the notification-enable
    /// chain, but only when it matches the channel the current phase waits
    /// for.
    fn on_descriptor_written(self: &Arc<Self>, channel: Channel, success: bool) {
        let mut hs = self.handshake.lock().unwrap();
        let Some(expected) = hs.phase.notify_channel() else {
            debug!(
                "[{}] stray descriptor ack for {channel} in phase {:?}",
                self.address, hs.phase
            );
            return;
        };
        if channel != expected {
            debug!(
                "[{}] descriptor ack for {channel} while waiting on {expected}, ignoring",
                self.address
            );
            return;
        }
        if !success {
            warn!(
                "[{}] notification enable failed on {channel}, not advancing",
                self.address
            );
            return;
        }
        let Some(next) = hs.phase.next() else { return };
        hs.phase = next;
        drop(hs);
        if let Some(ch) = next.notify_channel() {
            if !self.transport.enable_notifications(ch) {
                warn!("[{}] transport rejected notification enable", self.address);
            }
        } else if let Some(ch) = next.read_channel() {
            if !self.transport.read_characteristic(ch) {
                warn!("[{}] transport rejected characteristic read", self.address);
            }
        }
    }

    /// An identity read stores its value and issues the next read; the
    /// final read declares the session `Ready`.
    fn on_characteristic_read(self: &Arc<Self>, channel: Channel, value: Vec<u8>, success: bool) {
        let mut hs = self.handshake.lock().unwrap();
        let Some(expected) = hs.phase.read_channel() else {
            debug!(
                "[{}] stray read result for {channel} in phase {:?}",
                self.address, hs.phase
            );
            return;
        };
        if channel != expected {
            debug!(
                "[{}] read result for {channel} while waiting on {expected}, ignoring",
                self.address
            );
            return;
        }
        if !success {
            warn!("[{}] read of {channel} reported failure", self.address);
        }
        let Some(next) = hs.phase.next() else { return };
        hs.phase = next;
        drop(hs);

        let text = String::from_utf8_lossy(&value).into_owned();
        self.info.lock().unwrap().record(channel, text);

        if next.is_ready() {
            info!("[{}] handshake complete", self.address);
            let connected = {
                let mut cbs = self.lifecycle.lock().unwrap();
                cbs.on_connection_failed = None;
                cbs.on_connected.take()
            };
            if let Some(cb) = connected {
                cb();
            }
        } else if let Some(ch) = next.read_channel() {
            if !self.transport.read_characteristic(ch) {
                warn!("[{}] transport rejected characteristic read", self.address);
            }
        }
    }

    fn on_notified(self: &Arc<Self>, channel: Channel, value: Vec<u8>) {
        match channel {
            Channel::CommandTx => self.on_command_data(&value),
            Channel::FlowControl => self.on_flow_control(&value),
            Channel::BatteryLevel => {
                let Some(&level) = value.first() else {
                    warn!("[{}] empty battery notification", self.address);
                    return;
                };
                let cb = self.observers.lock().unwrap().battery.clone();
                if let Some(cb) = cb {
                    cb(level);
                }
            }
            Channel::SensorInterface => {
                let cb = self.observers.lock().unwrap().sensor.clone();
                if let Some(cb) = cb {
                    cb();
                }
            }
            other => {
                debug!(
                    "[{}] notification on {other}: {} byte(s)",
                    self.address,
                    value.len()
                );
            }
        }
    }

    /// Accumulate command-data fragments and dispatch each completed frame.
    fn on_command_data(self: &Arc<Self>, value: &[u8]) {
        let outcome = self
            .reassembly
            .lock()
            .unwrap()
            .accept(value, self.config.reassembly_limit);
        match outcome {
            ReassemblyOutcome::Frame(bytes) => match Frame::decode(&bytes) {
                Ok(frame) => {
                    debug!(
                        "[{}] inbound frame: command 0x{:02X}, {} data byte(s)",
                        self.address,
                        frame.command_id,
                        frame.data.len()
                    );
                    let cb = self.observers.lock().unwrap().command.clone();
                    if let Some(cb) = cb {
                        cb(frame);
                    }
                }
                Err(err) => warn!("[{}] dropping undecodable frame: {err}", self.address),
            },
            ReassemblyOutcome::Pending => {}
            ReassemblyOutcome::Dropped(err) => {
                warn!("[{}] dropping inbound bytes: {err}", self.address);
            }
        }
    }

    /// Link loss: route to `connection_failed` or `disconnected` by phase,
    /// then tear down.
    fn on_link_down(self: &Arc<Self>) {
        let ready = self.handshake.lock().unwrap().phase.is_ready();
        let cb = {
            let mut cbs = self.lifecycle.lock().unwrap();
            if ready {
                cbs.on_disconnected.take()
            } else {
                cbs.on_connection_failed.take()
            }
        };
        if let Some(cb) = cb {
            cb();
        }
        self.teardown();
    }

    /// Cancel timers, abandon pending writes and any partial inbound frame,
    /// release the transport, and unregister from the session registry.
    pub(crate) fn teardown(&self) {
        self.cancel_watchdog();
        self.queue.lock().unwrap().clear();
        self.writing.store(false, Ordering::Release);
        self.reassembly.lock().unwrap().clear();
        self.queue_drained.notify_waiters();
        self.transport.disconnect();
        self.registry.remove(&self.address);
    }
}
