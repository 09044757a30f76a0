//! Serial Bench Example
//!
//! Serves the command console on a serial port, backed by the simulated
//! bench. Connect a terminal (9600 8N1) to the other end of the link and
//! send `START:1,2` or `FULLTEST:1,2`.
//!
//! Usage:
//!   cargo run --example serial_bench                  # Interactive mode
//!   cargo run --example serial_bench -- /dev/ttyUSB0
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example serial_bench

use discharge_tester::serial::{list_ports, SerialConsole};
use discharge_tester::sim::{CellModel, SimulatedBench};
use discharge_tester::{Result, Tester, TesterConfig};
use inquire::Select;
use log::info;

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let ports = list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| std::io::Error::other(format!("Selection cancelled: {}", e)))?;

    // Extract just the port name (before " - ")
    let port_name = selection.split(" - ").next().unwrap_or_default().to_string();
    Ok(port_name)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port_name = std::env::args()
        .nth(1)
        .map(Ok)
        .unwrap_or_else(select_port)?;

    info!("Serving discharge tester console on {}...", port_name);
    let mut console = SerialConsole::open(&port_name)?;
    let (input, out) = console.split();

    let config = TesterConfig::default();
    let bench = SimulatedBench::new(&config, CellModel::default())
        .with_time_scale(1.0)
        .shared();
    let mut tester = Tester::new(config, bench.clone(), bench.clone(), bench)?;

    tester.start(out)?;
    let summaries = tester.run(input, out)?;
    info!("Console closed after {} test(s)", summaries.len());

    Ok(())
}
