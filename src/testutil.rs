//! Scripted transport shared by the session and SDK tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::gatt::{Channel, GattEvent, GattTransport, LinkState};
use crate::session::DeviceSession;

/// Transport double that records every call and answers from scripted
/// settings. Events are fed back into the session by the tests themselves,
/// mirroring how a platform integration drives the engine.
#[derive(Debug)]
pub(crate) struct MockTransport {
    pub mtu_requests: Mutex<Vec<usize>>,
    /// Requests above this are rejected synchronously.
    pub max_accepted_mtu: AtomicUsize,
    pub discover_calls: AtomicUsize,
    pub notify_enables: Mutex<Vec<Channel>>,
    pub reads: Mutex<Vec<Channel>>,
    /// Accepted command payloads, in write order.
    pub writes: Mutex<Vec<Vec<u8>>>,
    /// Number of upcoming writes to reject synchronously.
    pub reject_next_writes: AtomicUsize,
    pub rejected_writes: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mtu_requests: Mutex::new(Vec::new()),
            max_accepted_mtu: AtomicUsize::new(usize::MAX),
            discover_calls: AtomicUsize::new(0),
            notify_enables: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            reject_next_writes: AtomicUsize::new(0),
            rejected_writes: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        })
    }
}

impl GattTransport for MockTransport {
    fn request_mtu(&self, mtu: usize) -> bool {
        self.mtu_requests.lock().unwrap().push(mtu);
        mtu <= self.max_accepted_mtu.load(Ordering::SeqCst)
    }

    fn discover_services(&self) -> bool {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn read_characteristic(&self, channel: Channel) -> bool {
        self.reads.lock().unwrap().push(channel);
        true
    }

    fn write_characteristic(&self, channel: Channel, value: &[u8]) -> bool {
        assert_eq!(channel, Channel::CommandRx, "writes must target command rx");
        if self
            .reject_next_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            self.rejected_writes.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        self.writes.lock().unwrap().push(value.to_vec());
        true
    }

    fn enable_notifications(&self, channel: Channel) -> bool {
        self.notify_enables.lock().unwrap().push(channel);
        true
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Identity strings an ideal device reports during bring-up.
pub(crate) const IDENTITY: [(Channel, &str); 6] = [
    (Channel::Manufacturer, "Microoled"),
    (Channel::ModelNumber, "ENGO 2"),
    (Channel::SerialNumber, "1051"),
    (Channel::HardwareVersion, "v2"),
    (Channel::FirmwareVersion, "4.12.0"),
    (Channel::SoftwareVersion, "4.12.0b"),
];

/// Feed the full bring-up sequence of an ideal device, negotiating `mtu`.
pub(crate) fn bring_up_with_mtu(session: &DeviceSession, mtu: usize) {
    session.handle_event(GattEvent::LinkStateChanged(LinkState::Connected));
    session.handle_event(GattEvent::MtuResolved { mtu, success: true });
    session.handle_event(GattEvent::ServicesReady);
    for channel in [
        Channel::FlowControl,
        Channel::CommandTx,
        Channel::UiEvent,
        Channel::BatteryLevel,
        Channel::SensorInterface,
    ] {
        session.handle_event(GattEvent::DescriptorWritten {
            channel,
            success: true,
        });
    }
    for (channel, text) in IDENTITY {
        session.handle_event(GattEvent::CharacteristicRead {
            channel,
            value: text.as_bytes().to_vec(),
            success: true,
        });
    }
}

/// [`bring_up_with_mtu`] with a typical negotiated MTU.
pub(crate) fn bring_up(session: &DeviceSession) {
    bring_up_with_mtu(session, 247);
}
