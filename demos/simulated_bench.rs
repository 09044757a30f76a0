//! Simulated Bench Example
//!
//! Runs the tester against a simulated two-channel bench and reads commands
//! from stdin, so the line protocol can be tried without any hardware:
//!
//!   START:1,2        -> Timed test (default 30s)
//!   START:1,2:60     -> Timed test (60s)
//!   FULLTEST:1,2     -> Full discharge test
//!
//! Usage:
//!   cargo run --example simulated_bench
//!   cargo run --example simulated_bench -- bench.json     # load a config
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example simulated_bench

use discharge_tester::sim::{CellModel, SimulatedBench};
use discharge_tester::{Result, Tester, TesterConfig};
use log::info;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            TesterConfig::from_json_file(path)?
        }
        None => TesterConfig::default(),
    };

    // 0.1 Ah cells at 60x: a full discharge takes seconds, not minutes
    let bench = SimulatedBench::new(&config, CellModel::default())
        .with_time_scale(60.0)
        .shared();
    bench.set_state_of_charge(1, 0.6);

    let mut tester = Tester::new(config, bench.clone(), bench.clone(), bench)?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();

    tester.start(&mut out)?;
    let summaries = tester.run(&mut input, &mut out)?;

    info!("Ran {} test(s)", summaries.len());
    for summary in &summaries {
        for channel in &summary.channels {
            info!(
                "{:?} battery {}: {:.1} mAh, final {:.3} V",
                summary.kind, channel.channel, channel.capacity_mah, channel.final_voltage
            );
        }
    }

    Ok(())
}
