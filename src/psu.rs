use crate::{
    command::{Command, CommandBatch, Query, Toggle},
    error::{Error, Result},
    poll::Cycle,
    reading::{Deciseconds, Reading, Report, Sample},
    reply::{Decimal, MAX_REPLY_LEN, ReplyError, strip_line_ending},
    request::{Quantity, SetRequest},
    status::StatusByte,
};

/// Raw reply line. One extra byte of room for a trailing `\r`.
type Line = heapless::Vec<u8, { MAX_REPLY_LEN + 1 }>;

/// You can create a Ka3005p using any interface which implements [embedded_io::Read] & [embedded_io::Write].
///
/// The interface must already be configured: 9600 baud, 8N1, raw mode. For its methods, we
/// use the nomenclature that "set" writes a configuration, "get" reads back a configuration
/// value and "read" returns a measured value.
///
/// Every method blocks until the interface produces the reply. Any timeout is up to the interface.
pub struct Ka3005p<S: embedded_io::Read + embedded_io::Write> {
    interface: S,
}

impl<S: embedded_io::Read + embedded_io::Write> Ka3005p<S> {
    /// Create a new Ka3005p instance with the given interface.
    pub fn new(interface: S) -> Self {
        Self { interface }
    }

    /// Release the underlying interface.
    pub fn into_inner(self) -> S {
        self.interface
    }

    /// Apply every field set in `request`, as a single write.
    ///
    /// The request is range checked first, nothing is written if any field is out of range.
    pub fn apply(&mut self, request: &SetRequest) -> Result<(), S::Error> {
        request.validate()?;
        if request.is_empty() {
            return Ok(());
        }
        let batch = Self::batch(request.commands())?;
        self.send(&batch)
    }

    /// Set the output target voltage. Value supplied in millivolts.
    pub fn set_output_voltage_mv(&mut self, voltage_mv: u32) -> Result<(), S::Error> {
        Quantity::Voltage.check(voltage_mv.into())?;
        self.send_command(Command::SetVoltage(voltage_mv))
    }

    /// Set the output current limit. Value supplied in milliamps.
    pub fn set_current_limit_ma(&mut self, current_ma: u32) -> Result<(), S::Error> {
        Quantity::Current.check(current_ma.into())?;
        self.send_command(Command::SetCurrent(current_ma))
    }

    /// Enable/disable the output.
    pub fn set_output_state(&mut self, on: bool) -> Result<(), S::Error> {
        self.send_command(Command::Output(on))
    }

    /// Enable/disable over-current protection.
    pub fn set_over_current_protection(&mut self, on: bool) -> Result<(), S::Error> {
        self.send_command(Command::Toggle(Toggle::Ocp, on))
    }

    /// Enable/disable over-voltage protection.
    pub fn set_over_voltage_protection(&mut self, on: bool) -> Result<(), S::Error> {
        self.send_command(Command::Toggle(Toggle::Ovp, on))
    }

    /// Enable/disable the front panel key lock.
    pub fn set_lock_state(&mut self, locked: bool) -> Result<(), S::Error> {
        self.send_command(Command::Toggle(Toggle::Lock, locked))
    }

    /// Switch the output off. Used as the safe shutdown action.
    pub fn shutdown(&mut self) -> Result<(), S::Error> {
        log::info!("Disabling output");
        self.set_output_state(false)
    }

    /// Read the status bitmask.
    pub fn get_status(&mut self) -> Result<StatusByte, S::Error> {
        self.send_command(Command::Query(Query::Status))?;
        self.read_status()
    }

    /// Return the measured output voltage, in volts.
    pub fn read_output_voltage(&mut self) -> Result<Decimal, S::Error> {
        self.query(Query::OutputVoltage)
    }

    /// Return the measured output current, in amps.
    pub fn read_output_current(&mut self) -> Result<Decimal, S::Error> {
        self.query(Query::OutputCurrent)
    }

    /// Get the output target voltage, in volts.
    pub fn get_output_voltage(&mut self) -> Result<Decimal, S::Error> {
        self.query(Query::SetVoltage)
    }

    /// Get the output current limit, in amps.
    pub fn get_current_limit(&mut self) -> Result<Decimal, S::Error> {
        self.query(Query::SetCurrent)
    }

    /// Issue all queries of `cycle` in one write, then read the replies in order.
    pub fn run_cycle(&mut self, cycle: Cycle, timestamp: Deciseconds) -> Result<Report, S::Error> {
        let batch = Self::batch(cycle.queries().iter().copied().map(Command::Query))?;
        self.send(&batch)?;

        match cycle {
            Cycle::Short => {
                let voltage_out = self.read_decimal(Query::OutputVoltage)?;
                let current_out = self.read_decimal(Query::OutputCurrent)?;
                Ok(Report::Plain(Sample::new(timestamp, voltage_out, current_out)))
            }
            Cycle::Full => {
                let status = self.read_status()?;
                let voltage_out = self.read_decimal(Query::OutputVoltage)?;
                let current_out = self.read_decimal(Query::OutputCurrent)?;
                let voltage_set = self.read_decimal(Query::SetVoltage)?;
                let current_set = self.read_decimal(Query::SetCurrent)?;
                Ok(Report::Full(Reading::new(
                    timestamp,
                    status,
                    voltage_out,
                    current_out,
                    voltage_set,
                    current_set,
                )))
            }
        }
    }

    /// Write an already built batch of commands.
    pub fn send<const N: usize>(&mut self, batch: &CommandBatch<N>) -> Result<(), S::Error> {
        log::debug!("-> {:?}", batch.as_str());
        self.interface
            .write_all(batch.as_bytes())
            .map_err(Error::TransportWrite)?;
        self.interface.flush().map_err(Error::TransportWrite)
    }

    fn send_command(&mut self, command: Command) -> Result<(), S::Error> {
        let batch = Self::batch([command])?;
        self.send(&batch)
    }

    fn query(&mut self, query: Query) -> Result<Decimal, S::Error> {
        self.send_command(Command::Query(query))?;
        self.read_decimal(query)
    }

    fn batch(commands: impl IntoIterator<Item = Command>) -> Result<CommandBatch, S::Error> {
        let mut batch = CommandBatch::new();
        for command in commands {
            batch.push(command).map_err(|_| Error::CommandBufferFull {
                capacity: batch.capacity(),
            })?;
        }
        Ok(batch)
    }

    fn read_decimal(&mut self, query: Query) -> Result<Decimal, S::Error> {
        let line = self.read_line(query)?;
        Decimal::parse(strip_line_ending(&line))
            .map_err(|reason| Error::MalformedReply { query, reason })
    }

    /// The status reply is a single raw byte. The rest of its line is drained unbounded and
    /// ignored.
    fn read_status(&mut self) -> Result<StatusByte, S::Error> {
        let raw = match self.read_byte()? {
            None => return Err(Error::EndOfStream),
            Some(b'\n') => {
                return Err(Error::MalformedReply {
                    query: Query::Status,
                    reason: ReplyError::Empty,
                });
            }
            Some(raw) => raw,
        };
        let mut discarded = 0usize;
        while let Some(byte) = self.read_byte()? {
            if byte == b'\n' {
                break;
            }
            discarded += 1;
        }
        log::trace!("<- {}: {raw:#04x}, {discarded} trailing bytes", Query::Status);
        let status = StatusByte::from(raw);
        if status.unused() != 0 {
            log::warn!("Status byte {raw:#04x} has unused bits set");
        }
        Ok(status)
    }

    /// Read up to and excluding the next `\n`.
    ///
    /// End of stream after at least one byte ends the line, so a reply missing its newline is
    /// still accepted. End of stream before any byte is an error.
    fn read_line(&mut self, query: Query) -> Result<Line, S::Error> {
        let mut line = Line::new();
        loop {
            match self.read_byte()? {
                None if line.is_empty() => return Err(Error::EndOfStream),
                None => {
                    log::debug!("{query} reply ended without newline");
                    break;
                }
                Some(b'\n') => break,
                Some(byte) => line.push(byte).map_err(|_| Error::MalformedReply {
                    query,
                    reason: ReplyError::TooLong,
                })?,
            }
        }
        log::trace!("<- {query}: {:02X?}", line.as_slice());
        Ok(line)
    }

    /// `None` at end of stream.
    fn read_byte(&mut self) -> Result<Option<u8>, S::Error> {
        let mut byte = [0u8; 1];
        let bytes_read = self
            .interface
            .read(&mut byte)
            .map_err(Error::TransportRead)?;
        Ok((bytes_read > 0).then_some(byte[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::MockSerial;
    use strum::IntoEnumIterator;

    fn psu(replies: &[u8]) -> Ka3005p<MockSerial> {
        Ka3005p::new(MockSerial::with_replies(replies))
    }

    #[test]
    fn test_apply_writes_one_batch_in_order() {
        let mut psu = psu(b"");
        let request = SetRequest::builder()
            .voltage_mv(12_000)
            .current_ma(500)
            .over_current_protection(true)
            .over_voltage_protection(false)
            .panel_locked(true)
            .output_enabled(true)
            .build()
            .unwrap();
        psu.apply(&request).unwrap();
        assert_eq!(
            psu.interface.written_data(),
            b"VSET1:12.000\rISET1:0.500\rOCP1\rOVP0\rLOCK1\rOUT1\r"
        );
    }

    #[test]
    fn test_apply_output_off_goes_first() {
        let mut psu = psu(b"");
        let request = SetRequest {
            output_enabled: Some(false),
            current_ma: Some(5),
            ..Default::default()
        };
        psu.apply(&request).unwrap();
        assert_eq!(psu.interface.written_data(), b"OUT0\rISET1:0.005\r");
    }

    #[test]
    fn test_apply_out_of_range_writes_nothing() {
        let mut psu = psu(b"");
        let request = SetRequest {
            voltage_mv: Some(30_001),
            current_ma: Some(100),
            ..Default::default()
        };
        let result = psu.apply(&request);
        assert!(matches!(result, Err(Error::ValueOutOfRange(_))));
        assert!(psu.interface.written_data().is_empty());

        let request = SetRequest {
            voltage_mv: Some(30_000),
            ..Default::default()
        };
        psu.apply(&request).unwrap();
        assert_eq!(psu.interface.written_data(), b"VSET1:30.000\r");
    }

    #[test]
    fn test_apply_empty_request_writes_nothing() {
        let mut psu = psu(b"");
        psu.apply(&SetRequest::default()).unwrap();
        assert!(psu.interface.written_data().is_empty());
    }

    #[test]
    fn test_set_current_out_of_range() {
        let mut psu = psu(b"");
        assert!(matches!(
            psu.set_current_limit_ma(5_001),
            Err(Error::ValueOutOfRange(_))
        ));
        assert!(psu.interface.written_data().is_empty());
    }

    #[test]
    fn test_single_setters() {
        let mut psu = psu(b"");
        psu.set_output_voltage_mv(5).unwrap();
        psu.set_over_voltage_protection(true).unwrap();
        psu.set_lock_state(false).unwrap();
        psu.shutdown().unwrap();
        assert_eq!(psu.interface.written_data(), b"VSET1:0.005\rOVP1\rLOCK0\rOUT0\r");
    }

    #[test]
    fn test_query_round_trip() {
        for query in Query::iter().filter(|q| *q != Query::Status) {
            let mut psu = psu(b"0004.001\n");
            let value = match query {
                Query::OutputVoltage => psu.read_output_voltage(),
                Query::OutputCurrent => psu.read_output_current(),
                Query::SetVoltage => psu.get_output_voltage(),
                Query::SetCurrent => psu.get_current_limit(),
                Query::Status => unreachable!(),
            }
            .unwrap();
            let mut expected = query.to_string();
            expected.push_str("?\r");
            assert_eq!(psu.interface.written_data(), expected.as_bytes());
            assert_eq!(value.value(), 4.001);
            assert_eq!(value.as_str(), "4.001");
        }

        let mut psu = psu(&[0x51, b'\n']);
        let status = psu.get_status().unwrap();
        assert_eq!(psu.interface.written_data(), b"STATUS?\r");
        assert_eq!(u8::from(status), 0x51);
    }

    #[test]
    fn test_reply_with_crlf() {
        let mut psu = psu(b"12.72\r\n");
        assert_eq!(psu.read_output_voltage().unwrap().as_str(), "12.72");
    }

    #[test]
    fn test_reply_without_newline() {
        let mut psu = psu(b"2.504");
        assert_eq!(psu.read_output_current().unwrap().value(), 2.504);
    }

    #[test]
    fn test_reply_split_over_reads() {
        let mut mock = MockSerial::with_replies(b"15.12\n2.500\n");
        mock.set_max_read(1);
        let mut psu = Ka3005p::new(mock);
        assert_eq!(psu.get_output_voltage().unwrap().as_str(), "15.12");
        assert_eq!(psu.get_current_limit().unwrap().as_str(), "2.500");
    }

    #[test]
    fn test_end_of_stream() {
        let mut psu = psu(b"");
        assert!(matches!(psu.read_output_voltage(), Err(Error::EndOfStream)));
    }

    #[test]
    fn test_read_error() {
        let mut mock = MockSerial::with_replies(b"1.000\n");
        mock.set_read_error(true);
        let mut psu = Ka3005p::new(mock);
        assert!(matches!(psu.read_output_voltage(), Err(Error::TransportRead(_))));
    }

    #[test]
    fn test_write_error() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        let mut psu = Ka3005p::new(mock);
        let result = psu.set_output_state(true);
        assert!(matches!(result, Err(Error::TransportWrite(_))));
        assert!(result.unwrap_err().is_transport());
    }

    #[test]
    fn test_oversized_reply_is_malformed() {
        let mut psu = psu(b"123456789012345678901234567890\n");
        assert!(matches!(
            psu.read_output_voltage(),
            Err(Error::MalformedReply {
                query: Query::OutputVoltage,
                reason: ReplyError::TooLong
            })
        ));
    }

    #[test]
    fn test_non_numeric_reply_is_malformed() {
        let mut psu = psu(b"ERR\n");
        assert!(matches!(
            psu.read_output_current(),
            Err(Error::MalformedReply {
                reason: ReplyError::NotNumeric,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_status_is_malformed() {
        let mut psu = psu(b"\n");
        assert!(matches!(
            psu.get_status(),
            Err(Error::MalformedReply {
                query: Query::Status,
                reason: ReplyError::Empty
            })
        ));
    }

    #[test]
    fn test_long_status_line_is_drained() {
        let mut replies = vec![0x51];
        replies.extend_from_slice(&[b'x'; 40]);
        replies.extend_from_slice(b"\r\n12.72\n");
        let mut psu = psu(&replies);
        assert_eq!(u8::from(psu.get_status().unwrap()), 0x51);
        assert_eq!(psu.interface.unread(), 6);
        assert_eq!(psu.read_output_voltage().unwrap().as_str(), "12.72");
    }

    #[test]
    fn test_status_at_end_of_stream() {
        let mut empty = psu(b"");
        assert!(matches!(empty.get_status(), Err(Error::EndOfStream)));

        let mut unterminated = psu(&[0x40]);
        assert_eq!(u8::from(unterminated.get_status().unwrap()), 0x40);
    }

    #[test]
    fn test_full_cycle() {
        let mut psu = psu(b"\x40\n12.72\n2.504\n15.12\n2.500\n");
        let report = psu.run_cycle(Cycle::Full, Deciseconds(16094888334)).unwrap();
        assert_eq!(
            psu.interface.written_data(),
            b"STATUS?\rVOUT1?\rIOUT1?\rVSET1?\rISET1?\r"
        );
        let Report::Full(reading) = report else {
            panic!("expected a full reading");
        };
        assert!(reading.output_on());
        assert!(!reading.beep_enabled());
        assert_eq!(reading.voltage_set.as_str(), "15.12");
        assert_eq!(
            reading.to_string(),
            "16094888334\tON\t12.72V (15.12V)\t2.504A (2.500A)\t31.85 W\t[CC] [beep off] "
        );
        assert_eq!(psu.interface.unread(), 0);
    }

    #[test]
    fn test_short_cycle() {
        let mut psu = psu(b"05.00\n0.100\n");
        let report = psu.run_cycle(Cycle::Short, Deciseconds(7)).unwrap();
        assert_eq!(psu.interface.written_data(), b"VOUT1?\rIOUT1?\r");
        assert!(matches!(report, Report::Plain(_)));
        assert_eq!(report.to_string(), "7\t5.00 V\t0.100 A\t0.500 W");
    }

    #[test]
    fn test_cycle_with_missing_reply_fails() {
        let mut psu = psu(b"\x40\n12.72\n");
        assert!(matches!(
            psu.run_cycle(Cycle::Full, Deciseconds(0)),
            Err(Error::EndOfStream)
        ));
    }
}
