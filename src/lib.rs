//! # Discharge Tester
//!
//! A Rust library that runs discharge tests on several batteries at once.
//! It switches load relays, samples voltage and shunt current once per
//! second, integrates delivered capacity, and streams measurement lines back
//! over a serial console driven by short text commands.
//!
//! ## Features
//!
//! - Timed tests (`START:1,2:60`) and run-to-cutoff tests (`FULLTEST:1,2`)
//! - Filtered ADC reads with calibrated voltage, current and capacity
//! - Hardware behind small traits, with deterministic fakes and a simulated bench
//! - Lenient command parsing by default, strict parsing on request
//! - JSON configuration and per-test summaries
//!
//! ## Example
//!
//! ```no_run
//! use discharge_tester::sim::{CellModel, SimulatedBench};
//! use discharge_tester::{Tester, TesterConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TesterConfig::default();
//!     let bench = SimulatedBench::new(&config, CellModel::default()).shared();
//!     let mut tester = Tester::new(config, bench.clone(), bench.clone(), bench)?;
//!
//!     let mut out = std::io::stdout();
//!     tester.start(&mut out)?;
//!     tester.handle_line("START:1,2:10", &mut out);
//!     Ok(())
//! }
//! ```

pub mod channels;
pub mod command;
pub mod config;
pub mod console;
pub mod constants;
pub mod controller;
pub mod error;
pub mod hal;
pub mod measurement;
pub mod mock;
pub mod report;
pub mod serial;
pub mod sim;
pub mod types;

pub use config::TesterConfig;
pub use console::Tester;
pub use controller::{CancelFlag, TestController};
pub use error::{Result, TesterError};
pub use types::*;
