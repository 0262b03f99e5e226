//! The status byte returned by `STATUS?`.

use core::fmt;

use modular_bitfield::prelude::*;

/// "Status register", as reported by the first byte of the `STATUS?` reply.
///
/// Bit layout is fixed by the firmware:
/// * bit 0 - Regulation mode. `1` => CV, `0` => CC.
/// * bits 1-3 - Unused.
/// * bit 4 - Beep enabled.
/// * bit 5 - OCP engaged.
/// * bit 6 - Output on.
/// * bit 7 - OVP engaged.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte {
    pub constant_voltage: bool,
    pub unused: B3,
    pub beep: bool,
    pub ocp: bool,
    pub output: bool,
    pub ovp: bool,
}

/// Represents the two possible power supply control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Constant voltage regulation mode.
    ConstantVoltage,
    /// Constant current regulation mode.
    ConstantCurrent,
}

impl From<u8> for StatusByte {
    fn from(value: u8) -> Self {
        StatusByte::from_bytes([value])
    }
}

impl From<StatusByte> for u8 {
    fn from(value: StatusByte) -> Self {
        value.into_bytes()[0]
    }
}

impl StatusByte {
    /// Active regulation mode. Only meaningful while the output is on.
    pub fn mode(&self) -> ControlMode {
        if self.constant_voltage() {
            ControlMode::ConstantVoltage
        } else {
            ControlMode::ConstantCurrent
        }
    }

    /// Human readable flags, e.g. `[CC] [beep off] `.
    pub fn decorations(&self) -> Decorations {
        Decorations(*self)
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::ConstantVoltage => f.write_str("CV"),
            ControlMode::ConstantCurrent => f.write_str("CC"),
        }
    }
}

/// Display adapter for the status flags column.
///
/// Each flag is followed by a single space. Nothing is shown while the output is off, the
/// flags are still available on the [StatusByte] itself.
#[derive(Debug, Clone, Copy)]
pub struct Decorations(StatusByte);

impl fmt::Display for Decorations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.0;
        if !status.output() {
            return Ok(());
        }
        write!(f, "[{}] ", status.mode())?;
        if !status.beep() {
            f.write_str("[beep off] ")?;
        }
        if status.ocp() {
            f.write_str("[OCP on] ")?;
        }
        if status.ovp() {
            f.write_str("[OVP on] ")?;
        }
        Ok(())
    }
}
