//! Encoding of the commands understood by the KA3005P.
//!
//! The device speaks a fixed ASCII command set. Every command is terminated by a single
//! carriage return, there is no line feed and no separator between consecutive commands.
//! Set commands get no reply, queries (`...?`) get exactly one reply line each.

use core::fmt::{self, Write};

use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Terminator appended to every command.
pub const TERMINATOR: char = '\r';

/// Default capacity of a [CommandBatch] in bytes.
///
/// The longest batch we build (`OUT0`, both set points, all three toggles) is ~45 bytes.
pub const BATCH_CAPACITY: usize = 64;

/// The five values that can be queried from the device.
#[derive(Debug, Display, EnumIter, IntoStaticStr, PartialEq, Eq, Clone, Copy)]
pub enum Query {
    /// Status bitmask, see [`StatusByte`](crate::status::StatusByte).
    #[strum(serialize = "STATUS")]
    Status,
    /// Measured output voltage, volts.
    #[strum(serialize = "VOUT1")]
    OutputVoltage,
    /// Measured output current, amps.
    #[strum(serialize = "IOUT1")]
    OutputCurrent,
    /// Target voltage, volts.
    #[strum(serialize = "VSET1")]
    SetVoltage,
    /// Current limit, amps.
    #[strum(serialize = "ISET1")]
    SetCurrent,
}

/// On/off switches that share the `<NAME><0|1>` encoding.
#[derive(Debug, Display, EnumIter, IntoStaticStr, PartialEq, Eq, Clone, Copy)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Toggle {
    /// Over-current protection.
    Ocp,
    /// Over-voltage protection.
    Ovp,
    /// Front panel key lock.
    Lock,
}

/// A single command, not yet terminated.
///
/// Its [Display] impl gives the command text without the trailing [TERMINATOR].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Command {
    /// `VSET1:<W.DDD>`, value in millivolts.
    SetVoltage(u32),
    /// `ISET1:<W.DDD>`, value in milliamps.
    SetCurrent(u32),
    /// `OCP<0|1>`, `OVP<0|1>` or `LOCK<0|1>`.
    Toggle(Toggle, bool),
    /// `OUT<0|1>`.
    Output(bool),
    /// `<KIND>?`.
    Query(Query),
}

impl Command {
    /// Write this command followed by the terminator.
    pub fn encode<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, "{self}{TERMINATOR}")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Command::SetVoltage(mv) => write!(f, "VSET1:{}", format_fixed_point(mv)),
            Command::SetCurrent(ma) => write!(f, "ISET1:{}", format_fixed_point(ma)),
            Command::Toggle(toggle, on) => write!(f, "{toggle}{}", on as u8),
            Command::Output(on) => write!(f, "OUT{}", on as u8),
            Command::Query(query) => write!(f, "{query}?"),
        }
    }
}

pub fn encode_set_voltage(voltage_mv: u32) -> Command {
    Command::SetVoltage(voltage_mv)
}

pub fn encode_set_current(current_ma: u32) -> Command {
    Command::SetCurrent(current_ma)
}

pub fn encode_toggle(toggle: Toggle, on: bool) -> Command {
    Command::Toggle(toggle, on)
}

pub fn encode_output(on: bool) -> Command {
    Command::Output(on)
}

pub fn encode_query(query: Query) -> Command {
    Command::Query(query)
}

/// A value in thousandths of a unit, displayed as `W.DDD`.
///
/// The device expects fixed-width 3-decimal fields, so the fractional part is always
/// zero padded: `5` => `0.005`, `50` => `0.050`, `30000` => `30.000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint(pub u32);

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// Format a value given in thousandths of a unit (mV, mA) as device fixed-point text.
pub fn format_fixed_point(value: u32) -> FixedPoint {
    FixedPoint(value)
}

/// Several commands concatenated into one write.
///
/// Pushing past the capacity fails instead of truncating, so a batch is either sent whole
/// or not at all.
#[derive(Debug, Default)]
pub struct CommandBatch<const N: usize = BATCH_CAPACITY> {
    buf: heapless::String<N>,
    queries: heapless::Vec<Query, 8>,
}

/// Returned when a [CommandBatch] runs out of room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFull;

impl<const N: usize> CommandBatch<N> {
    pub fn new() -> Self {
        Self {
            buf: heapless::String::new(),
            queries: heapless::Vec::new(),
        }
    }

    /// Append a command. On failure the batch is left as it was before the call.
    pub fn push(&mut self, command: Command) -> Result<(), BatchFull> {
        let len = self.buf.len();
        if command.encode(&mut self.buf).is_err() {
            self.buf.truncate(len);
            return Err(BatchFull);
        }
        if let Command::Query(query) = command {
            if self.queries.push(query).is_err() {
                self.buf.truncate(len);
                return Err(BatchFull);
            }
        }
        Ok(())
    }

    /// The queries in this batch, in the order their replies will arrive.
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}
