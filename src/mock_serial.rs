//! We use this mocking module in unit tests to emulate a serial port.

use core::fmt;

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 512>,
    /// Buffer containing pre-configured response data to be read
    read_buffer: heapless::Vec<u8, 512>,
    /// Current position in the read buffer
    read_position: usize,
    /// Most bytes handed out by a single read() call
    max_read: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(Debug)]
pub enum MockSerialError {
    /// Simulated buffer overflow
    BufferOverflow,
    /// Generic simulated error for testing
    SimulatedError,
}

impl fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockSerialError::BufferOverflow => f.write_str("mock buffer overflow"),
            MockSerialError::SimulatedError => f.write_str("simulated error"),
        }
    }
}

impl core::error::Error for MockSerialError {}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    /// Returns `Ok(0)` (end of stream) once the scripted data is used up.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        let bytes_to_read = buf.len().min(available_bytes).min(self.max_read);

        buf[..bytes_to_read].copy_from_slice(
            &self.read_buffer[self.read_position..self.read_position + bytes_to_read],
        );
        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            max_read: usize::MAX,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Create a MockSerial which will answer with `data`.
    pub fn with_replies(data: &[u8]) -> Self {
        let mut mock = Self::new();
        mock.set_read_data(data).unwrap();
        mock
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Number of scripted bytes not read yet
    pub fn unread(&self) -> usize {
        self.read_buffer.len() - self.read_position
    }

    /// Limit how many bytes a single read() returns, to emulate a slow UART.
    pub fn set_max_read(&mut self, max_read: usize) {
        self.max_read = max_read.max(1);
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};

    #[test]
    fn test_write_multiple_times() {
        let mut mock = MockSerial::new();
        mock.write(b"VOUT1?\r").unwrap();
        mock.write(b"IOUT1?\r").unwrap();
        assert_eq!(mock.written_data(), b"VOUT1?\rIOUT1?\r");
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 600];
        let result = mock.write(&large_data);
        assert!(matches!(result, Err(MockSerialError::BufferOverflow)));
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::with_replies(b"12.00\n");
        mock.set_max_read(2);

        let mut buffer = [0u8; 8];
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"12");
        assert_eq!(mock.unread(), 4);
    }

    #[test]
    fn test_read_end_of_stream() {
        let mut mock = MockSerial::with_replies(b"Hi");
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
        assert_eq!(mock.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::with_replies(b"data");
        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert!(matches!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError)));
        mock.set_read_error(false);
        assert_eq!(mock.read(&mut buffer).unwrap(), 4);
    }
}
