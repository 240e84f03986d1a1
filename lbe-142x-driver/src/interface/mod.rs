use std::fmt;

use thiserror::Error;

#[cfg(feature = "hidapi")]
pub mod hidapi;
#[cfg(feature = "rusb")]
pub mod rusb;

#[cfg(feature = "hidapi")]
pub use self::hidapi::LbeHidApiInterface;
#[cfg(feature = "rusb")]
pub use self::rusb::LbeRusbInterface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Io,
    Timeout,
    PermissionDenied,
    DeviceRemoved,
    /// The device stalled the transfer
    Stall,
    ShortTransfer,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportErrorKind::Io => "i/o error",
            TransportErrorKind::Timeout => "timed out",
            TransportErrorKind::PermissionDenied => "permission denied",
            TransportErrorKind::DeviceRemoved => "device removed",
            TransportErrorKind::Stall => "transfer stalled",
            TransportErrorKind::ShortTransfer => "short transfer",
        })
    }
}

/// A failure reported by one of the concrete USB backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        TransportError {
            kind,
            message: message.into(),
        }
    }

    pub fn short_transfer(expected: usize, transferred: usize) -> Self {
        Self::new(
            TransportErrorKind::ShortTransfer,
            format!("transferred {transferred} of {expected} bytes"),
        )
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod test {
    use super::{TransportError, TransportErrorKind};

    #[test]
    fn transport_error_display_includes_kind_and_message() {
        let error = TransportError::new(TransportErrorKind::Timeout, "control transfer");

        assert_eq!(error.to_string(), "timed out: control transfer");
        assert_eq!(error.kind(), TransportErrorKind::Timeout);
        assert_eq!(error.message(), "control transfer");
    }

    #[test]
    fn short_transfer_reports_both_sizes() {
        let error = TransportError::short_transfer(64, 12);

        assert_eq!(error.kind(), TransportErrorKind::ShortTransfer);
        assert_eq!(error.to_string(), "short transfer: transferred 12 of 64 bytes");
    }
}
