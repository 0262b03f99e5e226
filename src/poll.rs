//! Fixed rate polling of the PSU.
//!
//! The schedule is additive: after every cycle the deadline moves forward by exactly one
//! period, independent of how long the cycle took. A slow cycle therefore makes the next one
//! fire immediately instead of pushing every later sample back.

use core::sync::atomic::{AtomicBool, Ordering};

use fugit::{MicrosDurationU64, TimerInstantU64};

use crate::{command::Query, error::Result, psu::Ka3005p, reading::{Deciseconds, Report}};

/// Microseconds since the UNIX epoch.
pub type Instant = TimerInstantU64<1_000_000>;

/// Nominal polling period, 10 Hz.
pub const POLL_PERIOD: MicrosDurationU64 = MicrosDurationU64::micros(100_000);

/// Source of wall-clock time and a way to wait.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&mut self) -> Instant;

    /// Block without spinning for `duration`.
    fn sleep(&mut self, duration: MicrosDurationU64);
}

/// Which queries a poll cycle issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// `VOUT1?`, `IOUT1?`. Produces [`Report::Plain`].
    Short,
    /// `STATUS?`, `VOUT1?`, `IOUT1?`, `VSET1?`, `ISET1?`. Produces [`Report::Full`].
    Full,
}

impl Cycle {
    /// The queries of this cycle, in the order the replies are read back.
    pub const fn queries(&self) -> &'static [Query] {
        match self {
            Cycle::Short => &[Query::OutputVoltage, Query::OutputCurrent],
            Cycle::Full => &[
                Query::Status,
                Query::OutputVoltage,
                Query::OutputCurrent,
                Query::SetVoltage,
                Query::SetCurrent,
            ],
        }
    }
}

/// Drives query cycles at a fixed period.
///
/// The cycle variant is chosen at construction and cannot change during a run.
pub struct Poller<C: Clock> {
    clock: C,
    cycle: Cycle,
    period: MicrosDurationU64,
    next_deadline: Instant,
}

impl<C: Clock> Poller<C> {
    /// Poll at [POLL_PERIOD], first cycle due immediately.
    pub fn new(clock: C, cycle: Cycle) -> Self {
        Self::with_period(clock, cycle, POLL_PERIOD)
    }

    pub fn with_period(mut clock: C, cycle: Cycle, period: MicrosDurationU64) -> Self {
        let next_deadline = clock.now();
        Self {
            clock,
            cycle,
            period,
            next_deadline,
        }
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// When the next cycle is due.
    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Wait for the next deadline, then run one cycle.
    ///
    /// Returns `Ok(None)` once `stop` is set. The flag is checked before each cycle and after
    /// each sleep, never in the middle of a cycle.
    pub fn poll<S: embedded_io::Read + embedded_io::Write>(
        &mut self,
        psu: &mut Ka3005p<S>,
        stop: &AtomicBool,
    ) -> Result<Option<Report>, S::Error> {
        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(None);
            }
            let now = self.clock.now();
            match self.next_deadline.checked_duration_since(now) {
                Some(wait) if wait.ticks() > 0 => self.clock.sleep(wait),
                _ => {
                    let timestamp = Deciseconds::from_micros(now.ticks());
                    let report = psu.run_cycle(self.cycle, timestamp)?;
                    self.next_deadline = self.next_deadline + self.period;
                    return Ok(Some(report));
                }
            }
        }
    }

    /// Poll until `stop` is set, handing every report to `emit`.
    ///
    /// Returns the number of completed cycles. Any failed cycle ends the run with its error.
    pub fn run<S, F>(
        &mut self,
        psu: &mut Ka3005p<S>,
        stop: &AtomicBool,
        mut emit: F,
    ) -> Result<u64, S::Error>
    where
        S: embedded_io::Read + embedded_io::Write,
        F: FnMut(&Report),
    {
        let mut cycles = 0;
        while let Some(report) = self.poll(psu, stop)? {
            emit(&report);
            cycles += 1;
        }
        log::debug!("Polling stopped after {cycles} cycles");
        Ok(cycles)
    }
}

/// [Clock] backed by [std::time::SystemTime] and [std::thread::sleep].
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&mut self) -> Instant {
        // A clock set before 1970 reads as the epoch.
        let micros = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_micros() as u64)
            .unwrap_or_default();
        Instant::from_ticks(micros)
    }

    fn sleep(&mut self, duration: MicrosDurationU64) {
        std::thread::sleep(std::time::Duration::from_micros(duration.to_micros()));
    }
}
