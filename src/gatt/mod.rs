//! Transport boundary: channels, events, and the `GattTransport` trait.
//!
//! The engine never touches a BLE stack directly. A platform integration
//! implements [`GattTransport`] for issuing commands and feeds every
//! asynchronous callback into the session as a [`GattEvent`]. The engine is
//! then a state-transition function over those events.

use std::fmt;

/// One of the device's GATT characteristics, addressed by role rather than
/// by raw UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Manufacturer name string (device information service).
    Manufacturer,
    /// Model number string (device information service).
    ModelNumber,
    /// Serial number string (device information service).
    SerialNumber,
    /// Hardware revision string (device information service).
    HardwareVersion,
    /// Firmware revision string (device information service).
    FirmwareVersion,
    /// Software revision string (device information service).
    SoftwareVersion,
    /// Battery level, single byte percent, notifiable.
    BatteryLevel,
    /// Flow-control status byte from the peer, notifiable.
    FlowControl,
    /// Outbound command data ("Rx" from the peer's perspective).
    CommandRx,
    /// Inbound command data ("Tx" from the peer's perspective), notifiable.
    CommandTx,
    /// Sensor-interface event, no payload, notifiable.
    SensorInterface,
    /// Generic UI event, notifiable.
    UiEvent,
}

impl Channel {
    /// The 128-bit UUID string for this characteristic.
    ///
    /// Device-information and battery characteristics use the standard
    /// Bluetooth SIG assigned numbers; the command-interface characteristics
    /// are vendor-defined.
    pub fn uuid(&self) -> &'static str {
        match self {
            Channel::Manufacturer => "00002a29-0000-1000-8000-00805f9b34fb",
            Channel::ModelNumber => "00002a24-0000-1000-8000-00805f9b34fb",
            Channel::SerialNumber => "00002a25-0000-1000-8000-00805f9b34fb",
            Channel::HardwareVersion => "00002a27-0000-1000-8000-00805f9b34fb",
            Channel::FirmwareVersion => "00002a26-0000-1000-8000-00805f9b34fb",
            Channel::SoftwareVersion => "00002a28-0000-1000-8000-00805f9b34fb",
            Channel::BatteryLevel => "00002a19-0000-1000-8000-00805f9b34fb",
            Channel::FlowControl => "0783b03e-8535-b5a0-7140-a304d2495cb9",
            Channel::CommandRx => "0783b03e-8535-b5a0-7140-a304d2495cba",
            Channel::CommandTx => "0783b03e-8535-b5a0-7140-a304d2495cb8",
            Channel::SensorInterface => "0783b03e-8535-b5a0-7140-a304d2495cbb",
            Channel::UiEvent => "0783b03e-8535-b5a0-7140-a304d2495cbc",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Well-known service and descriptor UUIDs.
pub mod uuids {
    /// Vendor command-interface service.
    pub const COMMAND_INTERFACE_SERVICE: &str = "0783b03e-8535-b5a0-7140-a304d2495cb7";
    /// Standard device-information service.
    pub const DEVICE_INFORMATION_SERVICE: &str = "0000180a-0000-1000-8000-00805f9b34fb";
    /// Standard battery service.
    pub const BATTERY_SERVICE: &str = "0000180f-0000-1000-8000-00805f9b34fb";
    /// Client characteristic configuration descriptor (notification enable).
    pub const NOTIFICATION_DESCRIPTOR: &str = "00002902-0000-1000-8000-00805f9b34fb";
}

/// Physical link state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// The GATT link is up.
    Connected,
    /// The GATT link is down (voluntary or link loss).
    Disconnected,
}

/// An asynchronous callback from the transport, delivered serially per
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    /// The physical link went up or down.
    LinkStateChanged(LinkState),
    /// MTU negotiation resolved.
    MtuResolved {
        /// Negotiated payload size (meaningful on success).
        mtu: usize,
        /// Whether negotiation succeeded.
        success: bool,
    },
    /// Service discovery completed successfully.
    ServicesReady,
    /// A characteristic read completed.
    CharacteristicRead {
        /// Characteristic that was read.
        channel: Channel,
        /// Value returned by the device.
        value: Vec<u8>,
        /// Whether the read succeeded.
        success: bool,
    },
    /// A characteristic write completed (success or failure).
    CharacteristicWritten {
        /// Characteristic that was written.
        channel: Channel,
        /// Whether the write succeeded.
        success: bool,
    },
    /// An unsolicited notification arrived.
    CharacteristicNotified {
        /// Characteristic that changed.
        channel: Channel,
        /// Notification payload.
        value: Vec<u8>,
    },
    /// A descriptor write (notification enable) completed.
    DescriptorWritten {
        /// Characteristic whose configuration descriptor was written.
        channel: Channel,
        /// Whether the write succeeded.
        success: bool,
    },
}

/// Commands the engine issues back to the BLE transport.
///
/// Every method is the synchronous half of an asynchronous primitive: the
/// return value only reports whether the transport *accepted* the call. The
/// actual outcome arrives later as a [`GattEvent`]. Implementations must not
/// block.
pub trait GattTransport: Send + Sync + 'static {
    /// Request an MTU. `true` if the request was accepted.
    fn request_mtu(&self, mtu: usize) -> bool;

    /// Start service discovery. `true` if accepted.
    fn discover_services(&self) -> bool;

    /// Issue a characteristic read. Completion arrives as
    /// [`GattEvent::CharacteristicRead`].
    fn read_characteristic(&self, channel: Channel) -> bool;

    /// Issue a characteristic write. Completion arrives as
    /// [`GattEvent::CharacteristicWritten`].
    fn write_characteristic(&self, channel: Channel, value: &[u8]) -> bool;

    /// Enable notifications by writing the channel's configuration
    /// descriptor. Completion arrives as [`GattEvent::DescriptorWritten`].
    fn enable_notifications(&self, channel: Channel) -> bool;

    /// Tear down the link and release transport resources.
    fn disconnect(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_uuids_distinct() {
        let all = [
            Channel::Manufacturer,
            Channel::ModelNumber,
            Channel::SerialNumber,
            Channel::HardwareVersion,
            Channel::FirmwareVersion,
            Channel::SoftwareVersion,
            Channel::BatteryLevel,
            Channel::FlowControl,
            Channel::CommandRx,
            Channel::CommandTx,
            Channel::SensorInterface,
            Channel::UiEvent,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.uuid(), b.uuid(), "{a} and {b} share a UUID");
            }
        }
    }

    #[test]
    fn test_identity_channels_are_sig_assigned() {
        assert!(Channel::Manufacturer.uuid().starts_with("00002a29"));
        assert!(Channel::BatteryLevel.uuid().starts_with("00002a19"));
    }
}
