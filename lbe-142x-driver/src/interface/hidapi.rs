use hidapi::{DeviceInfo, HidApi, HidDevice, HidError};

use crate::{
    interface::{TransportError, TransportErrorKind},
    layout::{ReportLayout, HIDRAW},
    LbeError, Model, UsbInterface,
};

impl From<HidError> for TransportError {
    fn from(error: HidError) -> Self {
        match error {
            HidError::IncompleteSendError { sent, all } => TransportError::short_transfer(all, sent),

            // hidapi only hands back the OS error text, so classify on that
            HidError::HidApiError { message } => {
                let lower = message.to_ascii_lowercase();
                let kind = if lower.contains("permission denied") || lower.contains("access") {
                    TransportErrorKind::PermissionDenied
                } else if lower.contains("no such device") || lower.contains("not connected") {
                    TransportErrorKind::DeviceRemoved
                } else if lower.contains("timed out") || lower.contains("timeout") {
                    TransportErrorKind::Timeout
                } else if lower.contains("broken pipe") {
                    TransportErrorKind::Stall
                } else {
                    TransportErrorKind::Io
                };

                TransportError::new(kind, message)
            }

            other => TransportError::new(TransportErrorKind::Io, other.to_string()),
        }
    }
}

/// Feature reports through hidapi, where the command byte is sent as the report number.
pub struct LbeHidApiInterface {
    driver: HidDevice,
}

impl LbeHidApiInterface {
    pub fn new(driver: HidDevice) -> Self {
        Self { driver }
    }

    pub fn is_supported_vid_pid(descriptor: &DeviceInfo) -> bool {
        Model::from_vid_pid(descriptor.vendor_id(), descriptor.product_id()).is_some()
    }

    pub fn find_device<'b>(
        hid_api: &'b HidApi,
        serial_number: Option<&str>,
    ) -> Option<&'b DeviceInfo> {
        match serial_number {
            // Look for a supported device that also matches the serial number
            Some(serial_number) => hid_api.device_list().find(|&descriptor| {
                Self::is_supported_vid_pid(descriptor)
                    && descriptor
                        .serial_number()
                        .is_some_and(|device_serial| device_serial == serial_number)
            }),

            // Take the first supported device
            None => hid_api
                .device_list()
                .find(|&descriptor| Self::is_supported_vid_pid(descriptor)),
        }
    }

    /// Find and open a supported device, returning the interface and the detected model.
    pub fn open(
        hid_api: &HidApi,
        serial_number: Option<&str>,
    ) -> Result<(Self, Model), LbeError<TransportError>> {
        let descriptor =
            Self::find_device(hid_api, serial_number).ok_or(LbeError::DeviceNotFound)?;
        let model =
            Model::from_product_id(descriptor.product_id()).ok_or(LbeError::DeviceNotFound)?;

        let driver = descriptor
            .open_device(hid_api)
            .map_err(TransportError::from)?;

        Ok((Self::new(driver), model))
    }
}

impl UsbInterface for LbeHidApiInterface {
    type InterfaceError = TransportError;

    fn layout(&self) -> &'static ReportLayout {
        &HIDRAW
    }

    fn hid_send_feature_report(&self, buf: &[u8]) -> Result<(), Self::InterfaceError> {
        Ok(self.driver.send_feature_report(buf)?)
    }

    fn serial_number(&self) -> Result<Option<String>, Self::InterfaceError> {
        Ok(self.driver.get_serial_number_string()?)
    }

    fn hid_get_feature_report(
        &self,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Self::InterfaceError> {
        let Some(first) = buf.first_mut() else {
            return Err(TransportError::short_transfer(1, 0));
        };
        *first = report_id;

        // hidraw echoes the report number at offset 0, matching the HIDRAW layout
        Ok(self.driver.get_feature_report(buf)?)
    }
}

#[cfg(test)]
mod test {
    use hidapi::HidError;

    use crate::interface::{TransportError, TransportErrorKind};

    fn kind_of(message: &str) -> TransportErrorKind {
        TransportError::from(HidError::HidApiError {
            message: message.to_string(),
        })
        .kind()
    }

    #[test]
    fn hidapi_errors_are_classified_from_os_message() {
        assert_eq!(kind_of("Permission denied"), TransportErrorKind::PermissionDenied);
        assert_eq!(kind_of("No such device"), TransportErrorKind::DeviceRemoved);
        assert_eq!(kind_of("Connection timed out"), TransportErrorKind::Timeout);
        assert_eq!(kind_of("Broken pipe"), TransportErrorKind::Stall);
        assert_eq!(kind_of("Input/output error"), TransportErrorKind::Io);
    }

    #[test]
    fn hidapi_incomplete_send_is_short_transfer() {
        let error = TransportError::from(HidError::IncompleteSendError { sent: 10, all: 60 });

        assert_eq!(error.kind(), TransportErrorKind::ShortTransfer);
        assert_eq!(error.message(), "transferred 10 of 60 bytes");
    }

    #[test]
    fn hidapi_error_message_is_kept() {
        let error = TransportError::from(HidError::HidApiError {
            message: "Permission denied".to_string(),
        });

        assert_eq!(error.to_string(), "permission denied: Permission denied");
    }
}
