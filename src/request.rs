//! Settings to apply to the PSU in one go.

use strum_macros::Display;
use thiserror::Error;

use crate::command::{Command, Toggle};

/// Highest voltage the KA3005P accepts, in millivolts.
pub const MAX_VOLTAGE_MV: u32 = 30_000;
/// Highest current limit the KA3005P accepts, in milliamps.
pub const MAX_CURRENT_MA: u32 = 5_000;

/// A quantity with a device imposed range.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    #[strum(serialize = "voltage")]
    Voltage,
    #[strum(serialize = "current")]
    Current,
}

impl Quantity {
    /// Inclusive upper bound in thousandths of the unit.
    pub const fn max_milli(&self) -> u32 {
        match self {
            Quantity::Voltage => MAX_VOLTAGE_MV,
            Quantity::Current => MAX_CURRENT_MA,
        }
    }

    pub const fn milli_unit(&self) -> &'static str {
        match self {
            Quantity::Voltage => "mV",
            Quantity::Current => "mA",
        }
    }

    /// Check a value given in thousandths of the unit.
    pub fn check(self, milli: i64) -> Result<u32, OutOfRange> {
        match u32::try_from(milli) {
            Ok(value) if value <= self.max_milli() => Ok(value),
            _ => Err(OutOfRange {
                quantity: self,
                value: milli,
            }),
        }
    }

    /// Convert a value in volts or amps to thousandths and check it.
    ///
    /// The value is rounded to the nearest thousandth, so `12.345` gives `12345` even
    /// though `12.345 * 1000.0` is slightly below it in binary.
    ///
    /// NaN is reported as above the maximum. Infinities saturate and fail the same way.
    pub fn from_units(self, units: f64) -> Result<u32, OutOfRange> {
        if units.is_nan() {
            return Err(OutOfRange {
                quantity: self,
                value: i64::MAX,
            });
        }
        let scaled = units * 1000.0;
        let rounded = if scaled < 0.0 { scaled - 0.5 } else { scaled + 0.5 };
        self.check(rounded as i64)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{quantity} out of range: {value} {} (allowed 0 - {})", .quantity.milli_unit(), .quantity.max_milli())]
pub struct OutOfRange {
    pub quantity: Quantity,
    pub value: i64,
}

/// What to change on the device. `None` fields are left untouched and produce no bytes.
///
/// Use [SetRequestBuilder] to create one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SetRequest {
    pub voltage_mv: Option<u32>,
    pub current_ma: Option<u32>,
    pub over_voltage_protection: Option<bool>,
    pub over_current_protection: Option<bool>,
    pub output_enabled: Option<bool>,
    pub panel_locked: Option<bool>,
}

impl SetRequest {
    pub fn builder() -> SetRequestBuilder {
        SetRequestBuilder::default()
    }

    /// True if applying this request would not send anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Range check every field. Done before anything is sent, so an invalid request is
    /// never partially applied.
    pub fn validate(&self) -> Result<(), OutOfRange> {
        if let Some(mv) = self.voltage_mv {
            Quantity::Voltage.check(mv.into())?;
        }
        if let Some(ma) = self.current_ma {
            Quantity::Current.check(ma.into())?;
        }
        Ok(())
    }

    /// The commands for this request, in the order they must be sent.
    ///
    /// Disabling the output goes first and enabling it goes last, so new set points are
    /// never applied to a live output.
    pub fn commands(&self) -> impl Iterator<Item = Command> {
        let output_off = (self.output_enabled == Some(false)).then_some(Command::Output(false));
        let output_on = (self.output_enabled == Some(true)).then_some(Command::Output(true));
        output_off
            .into_iter()
            .chain(self.voltage_mv.map(Command::SetVoltage))
            .chain(self.current_ma.map(Command::SetCurrent))
            .chain(self.over_current_protection.map(|on| Command::Toggle(Toggle::Ocp, on)))
            .chain(self.over_voltage_protection.map(|on| Command::Toggle(Toggle::Ovp, on)))
            .chain(self.panel_locked.map(|on| Command::Toggle(Toggle::Lock, on)))
            .chain(output_on)
    }
}

/// Use this type to create a [SetRequest].
#[derive(Debug, Default)]
pub struct SetRequestBuilder {
    request: SetRequest,
}

impl SetRequestBuilder {
    pub fn voltage_mv(mut self, voltage_mv: u32) -> Self {
        self.request.voltage_mv = Some(voltage_mv);
        self
    }

    pub fn current_ma(mut self, current_ma: u32) -> Self {
        self.request.current_ma = Some(current_ma);
        self
    }

    pub fn over_voltage_protection(mut self, on: bool) -> Self {
        self.request.over_voltage_protection = Some(on);
        self
    }

    pub fn over_current_protection(mut self, on: bool) -> Self {
        self.request.over_current_protection = Some(on);
        self
    }

    pub fn output_enabled(mut self, on: bool) -> Self {
        self.request.output_enabled = Some(on);
        self
    }

    pub fn panel_locked(mut self, on: bool) -> Self {
        self.request.panel_locked = Some(on);
        self
    }

    /// Validate and return the request.
    pub fn build(self) -> Result<SetRequest, OutOfRange> {
        self.request.validate()?;
        Ok(self.request)
    }
}
