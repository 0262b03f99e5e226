//! `koctl`: set up and log a Korad KA3005P from the command line.
//!
//! Usage:
//!   koctl -u 12 -i 0.5 -o 1     # set 12 V / 500 mA and switch the output on
//!   koctl -l -x                 # log at 10 Hz until interrupted, then switch the output off
//!   koctl                       # print one reading

use std::{
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::Context;
use clap::Parser;

use korad_ka3005p::{
    Clock, Cycle, Deciseconds, Ka3005p, Poller, SetRequest,
    poll::SystemClock,
    request::Quantity,
    serial::{DEFAULT_BAUD_RATE, SerialTransport},
};

const OUTPUT_HELP: &str = "\
When no set option and no -l is given, -q is implied.

The output looks like this:
16094888334\tON\t12.72V (15.12V)\t2.504A (2.500A)\t31.85 W\t[CC] ...
where the first column is a unix timestamp in 10ths of a second.
Values within parentheses are what's set, the others what's being delivered.
With -s only the delivered voltage, current and power are shown.";

/// Control and monitor a Korad KA3005P power supply
#[derive(Parser, Debug)]
#[command(name = "koctl", version, about, after_help = OUTPUT_HELP)]
struct Args {
    /// UART device
    #[arg(short, long, env = "KOCTL_DEVICE", default_value = "/dev/ttyACM0")]
    device: String,

    /// Set target voltage (0.0 - 30.0)
    #[arg(
        short = 'u',
        long,
        value_name = "VOLTS",
        allow_negative_numbers = true,
        value_parser = parse_units
    )]
    voltage: Option<f64>,

    /// Set target current (0.0 - 5.0)
    #[arg(
        short = 'i',
        long,
        value_name = "AMPS",
        allow_negative_numbers = true,
        value_parser = parse_units
    )]
    current: Option<f64>,

    /// Enable/disable over-voltage protection
    #[arg(short = 'U', long, value_name = "1|0", value_parser = parse_switch)]
    ovp: Option<bool>,

    /// Enable/disable over-current protection
    #[arg(short = 'I', long, value_name = "1|0", value_parser = parse_switch)]
    ocp: Option<bool>,

    /// Enable/disable output
    #[arg(short = 'o', long, value_name = "1|0", value_parser = parse_switch)]
    output: Option<bool>,

    /// Enable/disable front panel lock
    #[arg(short = 'L', long, value_name = "1|0", value_parser = parse_switch)]
    lock: Option<bool>,

    /// Log readings to stdout at 10 Hz until interrupted
    #[arg(short, long)]
    log: bool,

    /// Force one reading after applying settings
    #[arg(short, long)]
    query: bool,

    /// Try to disable the output upon termination (use with -l)
    #[arg(short = 'x', long)]
    kill_on_exit: bool,

    /// Only query delivered voltage and current
    #[arg(short, long)]
    short: bool,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Per-read timeout in milliseconds, 0 waits forever
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    timeout: u64,
}

impl Args {
    /// Everything to change on the device, range checked.
    fn set_request(&self) -> anyhow::Result<SetRequest> {
        let request = SetRequest {
            voltage_mv: self
                .voltage
                .map(|volts| Quantity::Voltage.from_units(volts))
                .transpose()?,
            current_ma: self
                .current
                .map(|amps| Quantity::Current.from_units(amps))
                .transpose()?,
            over_voltage_protection: self.ovp,
            over_current_protection: self.ocp,
            output_enabled: self.output,
            panel_locked: self.lock,
        };
        request.validate()?;
        Ok(request)
    }

    fn cycle(&self) -> Cycle {
        if self.short { Cycle::Short } else { Cycle::Full }
    }

    fn read_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_millis(self.timeout))
    }
}

/// Accepts `1`/`0` as well as the usual spellings of on and off. Any other number counts as on.
fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        number => number
            .parse::<u32>()
            .map(|n| n != 0)
            .map_err(|_| format!("expected 1 or 0, got {value:?}")),
    }
}

/// A finite number of volts or amps. Range checking happens later, with the unit known.
fn parse_units(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(units) if units.is_finite() => Ok(units),
        Ok(_) => Err(format!("expected a finite number, got {value:?}")),
        Err(err) => Err(err.to_string()),
    }
}

/// Set up a handler for SIGINT, SIGTERM and SIGHUP that raises the returned flag.
fn stop_on_signal() -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;
    Ok(stop)
}

/// Apply `request`, then print one reading or log until `stop` is raised.
fn drive<S, C>(
    psu: &mut Ka3005p<S>,
    args: &Args,
    request: &SetRequest,
    mut clock: C,
    stop: &AtomicBool,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    S: embedded_io::Read + embedded_io::Write,
    S::Error: Send + Sync + 'static,
    C: Clock,
{
    psu.apply(request).context("Failed to apply settings")?;

    if args.log {
        log::info!("Logging {:?} cycles until interrupted", args.cycle());
        let mut poller = Poller::new(clock, args.cycle());
        while let Some(report) = poller.poll(psu, stop).context("Polling failed")? {
            writeln!(out, "{report}")?;
            out.flush()?;
        }
    } else if args.query || request.is_empty() {
        let now = clock.now();
        let report = psu
            .run_cycle(args.cycle(), Deciseconds::from_micros(now.ticks()))
            .context("Query failed")?;
        writeln!(out, "{report}")?;
    }
    Ok(())
}

/// [drive], followed by `OUT0` with `-x` whether or not it succeeded.
fn session<S, C>(
    psu: &mut Ka3005p<S>,
    args: &Args,
    request: &SetRequest,
    clock: C,
    stop: &AtomicBool,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    S: embedded_io::Read + embedded_io::Write,
    S::Error: Send + Sync + 'static,
    C: Clock,
{
    let result = drive(psu, args, request, clock, stop, out);

    if args.kill_on_exit {
        if let Err(err) = psu.shutdown() {
            log::warn!("Failed to disable output: {err}");
        }
    }
    result
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let request = args.set_request()?;
    let stop = stop_on_signal()?;
    let port = SerialTransport::open(&args.device, args.baud, args.read_timeout())?;
    let mut psu = Ka3005p::new(port);

    session(
        &mut psu,
        &args,
        &request,
        SystemClock,
        &stop,
        &mut io::stdout().lock(),
    )
}
