//! Snapshots of the PSU state and their one-line text form.

use core::fmt::{self, Write as _};

use crate::{
    reply::Decimal,
    status::{ControlMode, StatusByte},
};

/// Whole tenths of a second since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deciseconds(pub u64);

impl Deciseconds {
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros / 100_000)
    }
}

impl fmt::Display for Deciseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a short query cycle: delivered voltage and current only.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: Deciseconds,
    pub voltage_out: Decimal,
    pub current_out: Decimal,
    pub power_w: f64,
}

impl Sample {
    pub fn new(timestamp: Deciseconds, voltage_out: Decimal, current_out: Decimal) -> Self {
        let power_w = power(&voltage_out, &current_out);
        Self {
            timestamp,
            voltage_out,
            current_out,
            power_w,
        }
    }
}

/// `<ts>\t<V> V\t<A> A\t<P> W`
///
/// Power gets three decimals while it rounds to below 10 W and two from there on.
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{} V\t{} A\t",
            self.timestamp, self.voltage_out, self.current_out
        )?;
        let mut fine = heapless::String::<32>::new();
        let below_ten = write!(fine, "{:.3}", self.power_w).is_ok()
            && fine.split('.').next().is_some_and(|whole| whole.len() < 2);
        if below_ten {
            write!(f, "{fine} W")
        } else {
            write!(f, "{:.2} W", self.power_w)
        }
    }
}

/// Result of a full query cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: Deciseconds,
    pub status: StatusByte,
    pub voltage_out: Decimal,
    pub voltage_set: Decimal,
    pub current_out: Decimal,
    pub current_set: Decimal,
    pub power_w: f64,
}

impl Reading {
    pub fn new(
        timestamp: Deciseconds,
        status: StatusByte,
        voltage_out: Decimal,
        current_out: Decimal,
        voltage_set: Decimal,
        current_set: Decimal,
    ) -> Self {
        let power_w = power(&voltage_out, &current_out);
        Self {
            timestamp,
            status,
            voltage_out,
            voltage_set,
            current_out,
            current_set,
            power_w,
        }
    }

    pub fn output_on(&self) -> bool {
        self.status.output()
    }

    /// Regulation mode. `None` while the output is off.
    pub fn mode(&self) -> Option<ControlMode> {
        self.output_on().then(|| self.status.mode())
    }

    pub fn beep_enabled(&self) -> bool {
        self.status.beep()
    }

    pub fn ocp_active(&self) -> bool {
        self.status.ocp()
    }

    pub fn ovp_active(&self) -> bool {
        self.status.ovp()
    }
}

/// `<ts>\t<ON|off>\t<Vout>V (<Vset>V)\t<Iout>A (<Iset>A)\t<P> W\t<flags>`
impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}V ({}V)\t{}A ({}A)\t{:.2} W\t{}",
            self.timestamp,
            if self.output_on() { "ON" } else { "off" },
            self.voltage_out,
            self.voltage_set,
            self.current_out,
            self.current_set,
            self.power_w,
            self.status.decorations(),
        )
    }
}

/// Whatever a query cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Plain(Sample),
    Full(Reading),
}

impl Report {
    pub fn timestamp(&self) -> Deciseconds {
        match self {
            Report::Plain(sample) => sample.timestamp,
            Report::Full(reading) => reading.timestamp,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Plain(sample) => fmt::Display::fmt(sample, f),
            Report::Full(reading) => fmt::Display::fmt(reading, f),
        }
    }
}

fn power(voltage: &Decimal, current: &Decimal) -> f64 {
    voltage.value() * current.value()
}
