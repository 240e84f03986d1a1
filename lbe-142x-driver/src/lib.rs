pub mod codec;
pub mod consts;
pub mod interface;
pub mod layout;
pub mod model;

use thiserror::Error;
use tracing::{debug, trace};

pub use codec::{Command, LockMode, Persistence, PowerLevel, RawReport, StatusReport};
pub use interface::{TransportError, TransportErrorKind};
pub use layout::ReportLayout;
pub use model::{Capabilities, CodecError, Feature, Model, ParameterError};

use consts::STATUS_REPORT_ID;

#[derive(Debug, Error)]
pub enum LbeError<InterfaceError> {
    #[error("no supported LBE-142x device found")]
    DeviceNotFound,

    #[error("underlying usb interface errored: {0}")]
    UsbInterfaceError(#[from] InterfaceError),

    #[error("received less data than expected from device, expected {expected:?}, received {received:?}")]
    ShortDataError { expected: usize, received: usize },

    #[error("{feature} is not supported on the {model}")]
    UnsupportedOperation { model: Model, feature: Feature },

    #[error("invalid parameter: {0}")]
    InvalidParameter(ParameterError),

    #[error("device has already been closed")]
    Disposed,
}

impl<InterfaceError> LbeError<InterfaceError> {
    pub fn from_codec(error: CodecError) -> Self {
        match error {
            CodecError::InvalidParameter(error) => LbeError::InvalidParameter(error),
            CodecError::Unsupported { model, feature } => {
                LbeError::UnsupportedOperation { model, feature }
            }
            CodecError::ReportSize { expected, received } => {
                LbeError::ShortDataError { expected, received }
            }
        }
    }
}

/// The UsbInterface trait allows for use of different USB backends, such as hidapi or rusb.
///
/// Each backend exchanges reports of a fixed size and shape, described by its [`ReportLayout`].
/// Calls are blocking and at most one is in flight per interface.
pub trait UsbInterface {
    type InterfaceError;

    /// The layout of every report sent or received through this interface
    fn layout(&self) -> &'static ReportLayout;

    /// Send a complete feature report to the device. The buffer is exactly `layout().report_size` bytes.
    fn hid_send_feature_report(&self, buf: &[u8]) -> Result<(), Self::InterfaceError>;

    /// Get a feature report from the device. The result should be stored in buf following the
    /// interface's layout, and the number of bytes received returned.
    fn hid_get_feature_report(
        &self,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Self::InterfaceError>;

    /// Get the serial number of the device. If no serial number exists on the device, then `Option::None`
    fn serial_number(&self) -> Result<Option<String>, Self::InterfaceError>;
}

/// An open LBE-142x. Owns the interface until [`LbeDevice::close`] or drop.
pub struct LbeDevice<Interface: UsbInterface> {
    interface: Option<Interface>,
    model: Model,
}

impl<Interface: UsbInterface> LbeDevice<Interface> {
    pub fn new(interface: Interface, model: Model) -> Self {
        debug!(
            model = model.display_name(),
            layout = interface.layout().name,
            "opened device"
        );

        LbeDevice {
            interface: Some(interface),
            model,
        }
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.model.capabilities()
    }

    pub fn is_closed(&self) -> bool {
        self.interface.is_none()
    }

    fn interface(&self) -> Result<&Interface, LbeError<Interface::InterfaceError>> {
        self.interface.as_ref().ok_or(LbeError::Disposed)
    }

    pub fn serial_number(&self) -> Result<Option<String>, LbeError<Interface::InterfaceError>> {
        Ok(self.interface()?.serial_number()?)
    }

    pub fn set_frequency(
        &self,
        output: u8,
        frequency: u32,
        persistence: Persistence,
    ) -> Result<(), LbeError<Interface::InterfaceError>> {
        self.send(&Command::SetFrequency {
            output,
            frequency,
            persistence,
        })
    }

    pub fn set_outputs_enabled(
        &self,
        enabled: bool,
    ) -> Result<(), LbeError<Interface::InterfaceError>> {
        self.send(&Command::SetOutputsEnabled(enabled))
    }

    pub fn set_pll_mode(&self, mode: LockMode) -> Result<(), LbeError<Interface::InterfaceError>> {
        self.send(&Command::SetPllMode(mode))
    }

    pub fn set_pps(&self, enabled: bool) -> Result<(), LbeError<Interface::InterfaceError>> {
        self.send(&Command::SetPps(enabled))
    }

    pub fn set_power_level(
        &self,
        output: u8,
        level: PowerLevel,
    ) -> Result<(), LbeError<Interface::InterfaceError>> {
        self.send(&Command::SetPowerLevel { output, level })
    }

    /// Blink the output LEDs for a few seconds
    pub fn blink_leds(&self) -> Result<(), LbeError<Interface::InterfaceError>> {
        self.send(&Command::BlinkLeds)
    }

    /// Encode `command` and send it. Nothing reaches the interface if the command is
    /// invalid for this model.
    pub fn send(&self, command: &Command) -> Result<(), LbeError<Interface::InterfaceError>> {
        let interface = self.interface()?;

        let report = codec::encode(self.model, interface.layout(), command)
            .map_err(LbeError::from_codec)?;

        debug!(?command, code = command.code(self.model), "sending command");
        trace!(?report);

        interface.hid_send_feature_report(report.as_bytes())?;

        Ok(())
    }

    pub fn status(&self) -> Result<StatusReport, LbeError<Interface::InterfaceError>> {
        let interface = self.interface()?;
        let layout = interface.layout();

        let mut report = codec::encode_status_request(layout);
        let size = interface.hid_get_feature_report(STATUS_REPORT_ID, report.as_mut_bytes())?;
        if size < layout.report_size {
            return Err(LbeError::ShortDataError {
                expected: layout.report_size,
                received: size,
            });
        }

        trace!(?report, "status report");

        codec::decode_status(self.model, layout, report.as_bytes()).map_err(LbeError::from_codec)
    }

    /// Release the interface. Calling this more than once has no further effect.
    pub fn close(&mut self) {
        if self.interface.take().is_some() {
            debug!(model = self.model.display_name(), "closed device");
        }
    }
}
