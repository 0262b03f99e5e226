//! This crate provides an interface for controlling and polling the Korad KA3005P single channel
//! programmable power supply over its serial ASCII protocol.
//!
//! Without the `std` feature it is `no-std`. The driver only needs an [embedded_io] interface,
//! and the polling loop a [Clock](poll::Clock).
//!
//! PSU models which this should work with, as they share the same command set:
//! * KA3005P
//! * KD3005P
//! * RND 320-KA3005P
//! * Tenma 72-2540
//!
//! Multi channel variants (KA3305P etc.) are not supported.
//!
//! The serial port used for PSU comms should be configured like so:
//! * Baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * Raw mode, no echo
//!
//! ```ignore
//! let mut psu = Ka3005p::new(port);
//! psu.apply(&SetRequest::builder().voltage_mv(5000).current_ma(100).output_enabled(true).build()?)?;
//! let report = psu.run_cycle(Cycle::Full, Deciseconds(0))?;
//! println!("{report}");
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod command;
pub mod error;
pub mod poll;
pub mod psu;
pub mod reading;
pub mod reply;
pub mod request;
#[cfg(feature = "std")]
pub mod serial;
pub mod status;

#[cfg(test)]
mod mock_serial;

pub use error::Error;
pub use poll::{Clock, Cycle, Poller};
pub use psu::Ka3005p;
pub use reading::{Deciseconds, Reading, Report, Sample};
pub use request::SetRequest;
