//! Connection bring-up state machine.
//!
//! The handshake is a strictly ordered chain with no backward transitions:
//! MTU negotiation, service discovery, five notification enables, six
//! identity reads, then `Ready`. Each step is driven by exactly one expected
//! transport event; anything else is ignored so a stray acknowledgment can
//! never advance the machine.

use crate::gatt::Channel;

/// Handshake progress for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakePhase {
    /// Waiting for the physical link to come up.
    LinkPending,
    /// MTU requested, waiting for the negotiated value.
    MtuNegotiating,
    /// Service discovery in progress.
    ServicesDiscovering,
    /// Enabling the flow-control notification.
    NotifyFlowControl,
    /// Enabling the inbound command-data notification.
    NotifyTx,
    /// Enabling the UI-event notification.
    NotifyUi,
    /// Enabling the battery-level notification.
    NotifyBattery,
    /// Enabling the sensor-interface notification.
    NotifySensor,
    /// Reading the manufacturer name.
    ReadManufacturer,
    /// Reading the model number.
    ReadModel,
    /// Reading the serial number.
    ReadSerial,
    /// Reading the hardware revision.
    ReadHardwareVersion,
    /// Reading the firmware revision.
    ReadFirmwareVersion,
    /// Reading the software revision.
    ReadSoftwareVersion,
    /// Handshake complete; the command channel is usable.
    Ready,
}

impl HandshakePhase {
    /// The channel whose descriptor-write acknowledgment this phase is
    /// waiting for, if it is a notification-enable phase.
    pub fn notify_channel(self) -> Option<Channel> {
        match self {
            HandshakePhase::NotifyFlowControl => Some(Channel::FlowControl),
            HandshakePhase::NotifyTx => Some(Channel::CommandTx),
            HandshakePhase::NotifyUi => Some(Channel::UiEvent),
            HandshakePhase::NotifyBattery => Some(Channel::BatteryLevel),
            HandshakePhase::NotifySensor => Some(Channel::SensorInterface),
            _ => None,
        }
    }

    /// The channel whose read completion this phase is waiting for, if it is
    /// an identity-read phase.
    pub fn read_channel(self) -> Option<Channel> {
        match self {
            HandshakePhase::ReadManufacturer => Some(Channel::Manufacturer),
            HandshakePhase::ReadModel => Some(Channel::ModelNumber),
            HandshakePhase::ReadSerial => Some(Channel::SerialNumber),
            HandshakePhase::ReadHardwareVersion => Some(Channel::HardwareVersion),
            HandshakePhase::ReadFirmwareVersion => Some(Channel::FirmwareVersion),
            HandshakePhase::ReadSoftwareVersion => Some(Channel::SoftwareVersion),
            _ => None,
        }
    }

    /// The phase that follows this one in the fixed order.
    pub fn next(self) -> Option<Self> {
        use HandshakePhase::*;
        match self {
            LinkPending => Some(MtuNegotiating),
            MtuNegotiating => Some(ServicesDiscovering),
            ServicesDiscovering => Some(NotifyFlowControl),
            NotifyFlowControl => Some(NotifyTx),
            NotifyTx => Some(NotifyUi),
            NotifyUi => Some(NotifyBattery),
            NotifyBattery => Some(NotifySensor),
            NotifySensor => Some(ReadManufacturer),
            ReadManufacturer => Some(ReadModel),
            ReadModel => Some(ReadSerial),
            ReadSerial => Some(ReadHardwareVersion),
            ReadHardwareVersion => Some(ReadFirmwareVersion),
            ReadFirmwareVersion => Some(ReadSoftwareVersion),
            ReadSoftwareVersion => Some(Ready),
            Ready => None,
        }
    }

    /// `true` once the session is fully brought up.
    pub fn is_ready(self) -> bool {
        self == HandshakePhase::Ready
    }
}

/// Mutable handshake state carried by the session.
#[derive(Debug)]
pub(crate) struct HandshakeState {
    /// Current phase.
    pub phase: HandshakePhase,
    /// Whether the single asynchronous MTU re-request has been used.
    pub mtu_retry_spent: bool,
}

impl HandshakeState {
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::LinkPending,
            mtu_retry_spent: false,
        }
    }
}
