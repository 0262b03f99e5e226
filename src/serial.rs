//! Serial port transport for std targets.
//!
//! Wraps a [serialport] port so it can be handed to [Ka3005p](crate::psu::Ka3005p) as an
//! [embedded_io] interface.

use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;

/// Baud rate of the KA3005P. It is not configurable on the device.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Used when reads should block indefinitely. The longest poll timeout, about 24.8 days.
const BLOCK_FOREVER: Duration = Duration::from_millis(i32::MAX as u64);

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("Failed to open {path}: {source}")]
    TransportOpen {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("Failed to configure {path}: {source}")]
    TransportConfig {
        path: String,
        #[source]
        source: serialport::Error,
    },
}

/// A serial port configured for the KA3005P: 8 data bits, no parity, 1 stop bit, no flow control.
pub struct SerialTransport(Box<dyn SerialPort>);

impl SerialTransport {
    /// Open `path` and discard anything still buffered in either direction.
    ///
    /// A `timeout` of `None` makes reads block until data arrives.
    pub fn open(path: &str, baud_rate: u32, timeout: Option<Duration>) -> Result<Self, OpenError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout.unwrap_or(BLOCK_FOREVER))
            .open()
            .map_err(|source| OpenError::TransportOpen {
                path: path.to_owned(),
                source,
            })?;

        port.clear(ClearBuffer::All)
            .map_err(|source| OpenError::TransportConfig {
                path: path.to_owned(),
                source,
            })?;

        log::info!("Opened serial port: {path} at {baud_rate} baud");
        Ok(Self(port))
    }
}

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError(err)
    }
}

impl embedded_io::ErrorType for SerialTransport {
    type Error = IoError;
}

impl embedded_io::Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error as _;

    #[test]
    fn timeout_maps_to_timed_out() {
        let err = IoError::from(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(matches!(err.kind(), embedded_io::ErrorKind::TimedOut));
    }

    #[test]
    fn open_missing_device_fails_to_open() {
        let result = SerialTransport::open("/dev/does-not-exist-ka3005p", DEFAULT_BAUD_RATE, None);
        assert!(matches!(result, Err(OpenError::TransportOpen { .. })));
    }
}
