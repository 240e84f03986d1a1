use std::time::Duration;

use rusb::{
    request_type, Context, DeviceDescriptor, DeviceHandle, Direction, Recipient, RequestType,
    UsbContext,
};
use tracing::{debug, warn};

use crate::{
    consts::DEFAULT_TRANSFER_TIMEOUT,
    interface::{TransportError, TransportErrorKind},
    layout::{ReportLayout, CONTROL_TRANSFER},
    LbeError, Model, UsbInterface,
};

// HID class requests
const HID_GET_REPORT: u8 = 0x01;
const HID_SET_REPORT: u8 = 0x09;
const HID_REPORT_TYPE_FEATURE: u16 = 0x03;

const CONTROL_ENDPOINT: u8 = 0x00;
const HID_INTERFACE: u16 = 0;

fn feature_report_value(report_id: u8) -> u16 {
    (HID_REPORT_TYPE_FEATURE << 8) | u16::from(report_id)
}

impl From<rusb::Error> for TransportError {
    fn from(error: rusb::Error) -> Self {
        let kind = match error {
            rusb::Error::Timeout => TransportErrorKind::Timeout,
            rusb::Error::Access => TransportErrorKind::PermissionDenied,
            rusb::Error::NoDevice | rusb::Error::NotFound => TransportErrorKind::DeviceRemoved,
            rusb::Error::Pipe => TransportErrorKind::Stall,
            _ => TransportErrorKind::Io,
        };

        TransportError::new(kind, error.to_string())
    }
}

/// Feature reports through class-specific USB control transfers.
///
/// The libusb context lives exactly as long as the handle, so it is released
/// when the owning device is closed or dropped.
pub struct LbeRusbInterface {
    handle: DeviceHandle<Context>,
    descriptor: DeviceDescriptor,
    timeout: Duration,
}

impl LbeRusbInterface {
    /// Find and open a supported device, returning the interface and the detected model.
    ///
    /// A device that fails to open is skipped; if no other device matches, the last
    /// open error is returned instead of [`LbeError::DeviceNotFound`].
    pub fn open(
        serial_number: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<(Self, Model), LbeError<TransportError>> {
        let context = Context::new().map_err(TransportError::from)?;
        let devices = context.devices().map_err(TransportError::from)?;

        let mut last_error = None;

        for device in devices.iter() {
            let Ok(descriptor) = device.device_descriptor() else {
                continue;
            };
            let Some(model) = Model::from_vid_pid(descriptor.vendor_id(), descriptor.product_id())
            else {
                continue;
            };

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(error) => {
                    warn!(%error, model = model.display_name(), "failed to open device");
                    last_error = Some(TransportError::from(error));
                    continue;
                }
            };

            if let Some(wanted) = serial_number {
                let serial = handle.read_serial_number_string_ascii(&descriptor).ok();
                if serial.as_deref() != Some(wanted) {
                    debug!(?serial, "skipping device with different serial number");
                    continue;
                }
            }

            let timeout = timeout.unwrap_or(DEFAULT_TRANSFER_TIMEOUT);
            debug!(?timeout, model = model.display_name(), "opened device");

            let interface = LbeRusbInterface {
                handle,
                descriptor,
                timeout,
            };

            return Ok((interface, model));
        }

        Err(last_error.map_or(LbeError::DeviceNotFound, LbeError::UsbInterfaceError))
    }

    /// A stalled control pipe has to be cleared before the next request; the stall is
    /// still reported to the caller.
    fn transfer_error(&self, error: rusb::Error) -> TransportError {
        if error == rusb::Error::Pipe {
            if let Err(clear_error) = self.handle.clear_halt(CONTROL_ENDPOINT) {
                warn!(%clear_error, "failed to clear halt on control endpoint");
            } else {
                warn!("cleared halt on control endpoint");
            }
        }

        TransportError::from(error)
    }
}

impl UsbInterface for LbeRusbInterface {
    type InterfaceError = TransportError;

    fn layout(&self) -> &'static ReportLayout {
        &CONTROL_TRANSFER
    }

    fn hid_send_feature_report(&self, buf: &[u8]) -> Result<(), Self::InterfaceError> {
        let report_id = buf.first().copied().unwrap_or_default();

        let written = self
            .handle
            .write_control(
                request_type(Direction::Out, RequestType::Class, Recipient::Interface),
                HID_SET_REPORT,
                feature_report_value(report_id),
                HID_INTERFACE,
                buf,
                self.timeout,
            )
            .map_err(|error| self.transfer_error(error))?;

        if written < buf.len() {
            return Err(TransportError::short_transfer(buf.len(), written));
        }

        Ok(())
    }

    fn serial_number(&self) -> Result<Option<String>, Self::InterfaceError> {
        if self.descriptor.serial_number_string_index().is_none() {
            return Ok(None);
        }

        Ok(Some(
            self.handle
                .read_serial_number_string_ascii(&self.descriptor)?,
        ))
    }

    fn hid_get_feature_report(
        &self,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Self::InterfaceError> {
        let size = self
            .handle
            .read_control(
                request_type(Direction::In, RequestType::Class, Recipient::Interface),
                HID_GET_REPORT,
                feature_report_value(report_id),
                HID_INTERFACE,
                buf,
                self.timeout,
            )
            .map_err(|error| self.transfer_error(error))?;

        Ok(size)
    }
}

#[cfg(test)]
mod test {
    use super::feature_report_value;
    use crate::interface::{TransportError, TransportErrorKind};

    #[test]
    fn feature_report_value_puts_report_type_in_high_byte() {
        assert_eq!(feature_report_value(0x4B), 0x034B);
        assert_eq!(feature_report_value(0x00), 0x0300);
    }

    #[test]
    fn rusb_errors_map_to_transport_error_kinds() {
        let cases = [
            (rusb::Error::Timeout, TransportErrorKind::Timeout),
            (rusb::Error::Access, TransportErrorKind::PermissionDenied),
            (rusb::Error::NoDevice, TransportErrorKind::DeviceRemoved),
            (rusb::Error::Pipe, TransportErrorKind::Stall),
            (rusb::Error::Overflow, TransportErrorKind::Io),
            (rusb::Error::Io, TransportErrorKind::Io),
            (rusb::Error::Busy, TransportErrorKind::Io),
        ];

        for (error, kind) in cases {
            assert_eq!(TransportError::from(error).kind(), kind, "{error:?}");
        }
    }
}
