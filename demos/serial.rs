use std::env;

use korad_ka3005p::{
    Cycle, Deciseconds, Ka3005p,
    serial::{DEFAULT_BAUD_RATE, SerialTransport},
};

// Configuration constants - adjust these for your setup
const DEFAULT_PORT: &str = "/dev/ttyACM0";
const SERIAL_TIMEOUT_MS: u64 = 500;
const OUTPUT_VOLTAGE_MV: u32 = 5500; // 5.5V
const CURRENT_LIMIT_MA: u32 = 100; // 0.1A
const STABILIZATION_DELAY_MS: u64 = 1000;

fn main() {
    let port_name = env::args().nth(1).unwrap_or_else(|| DEFAULT_PORT.to_owned());
    println!("Using port: {}", port_name);

    let port = SerialTransport::open(
        &port_name,
        DEFAULT_BAUD_RATE,
        Some(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS)),
    )
    .expect("Failed to open serial port");

    let mut psu = Ka3005p::new(port);

    let status = psu.get_status().unwrap();
    println!("Status: {:#?}", status);

    psu.set_output_voltage_mv(OUTPUT_VOLTAGE_MV).unwrap();
    println!("Set output voltage to {}V", OUTPUT_VOLTAGE_MV as f32 / 1000.0);

    psu.set_current_limit_ma(CURRENT_LIMIT_MA).unwrap();
    println!("Set current limit to {}A", CURRENT_LIMIT_MA as f32 / 1000.0);

    psu.set_output_state(true).unwrap();
    println!("Output enabled");

    std::thread::sleep(std::time::Duration::from_millis(STABILIZATION_DELAY_MS));

    let measured = psu.read_output_voltage().unwrap();
    println!("Measured output voltage: {}V", measured);
    println!("Voltage setpoint read back: {}V", psu.get_output_voltage().unwrap());

    println!("\n--- Full reading ---");
    let report = psu.run_cycle(Cycle::Full, Deciseconds(0)).unwrap();
    println!("{}", report);

    psu.shutdown().unwrap();
    println!("Output disabled");
}
