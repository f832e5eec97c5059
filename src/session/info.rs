//! Device identity record populated during the handshake read chain.

use crate::gatt::Channel;

/// Identity strings read from the device-information service.
///
/// Fields are populated incrementally as the handshake read chain completes;
/// a field is `None` until its characteristic has been read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInformation {
    /// Manufacturer name.
    pub manufacturer: Option<String>,
    /// Model number.
    pub model_number: Option<String>,
    /// Serial number.
    pub serial_number: Option<String>,
    /// Hardware revision.
    pub hardware_version: Option<String>,
    /// Firmware revision.
    pub firmware_version: Option<String>,
    /// Software revision.
    pub software_version: Option<String>,
}

impl DeviceInformation {
    /// Store an identity value read from `channel`. Returns `false` when the
    /// channel is not a device-information characteristic.
    pub(crate) fn record(&mut self, channel: Channel, value: String) -> bool {
        let slot = match channel {
            Channel::Manufacturer => &mut self.manufacturer,
            Channel::ModelNumber => &mut self.model_number,
            Channel::SerialNumber => &mut self.serial_number,
            Channel::HardwareVersion => &mut self.hardware_version,
            Channel::FirmwareVersion => &mut self.firmware_version,
            Channel::SoftwareVersion => &mut self.software_version,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// `true` once every identity field has been read.
    pub fn is_complete(&self) -> bool {
        self.manufacturer.is_some()
            && self.model_number.is_some()
            && self.serial_number.is_some()
            && self.hardware_version.is_some()
            && self.firmware_version.is_some()
            && self.software_version.is_some()
    }
}
