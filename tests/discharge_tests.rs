//! End-to-end tests of the command console over in-memory I/O.

use discharge_tester::config::Calibration;
use discharge_tester::mock::{MockClock, MockRelays, MockSampler};
use discharge_tester::report::{ControlLine, MeasurementRecord};
use discharge_tester::sim::{CellModel, SimulatedBench};
use discharge_tester::{CancelFlag, TestKind, Tester, TesterConfig};
use std::io::Cursor;

/// 0.01 V per raw count
fn centivolt_config() -> TesterConfig {
    TesterConfig {
        calibration: Calibration {
            v_ref: 10.23,
            ..Calibration::default()
        },
        ..TesterConfig::default()
    }
}

fn records(output: &[u8]) -> Vec<MeasurementRecord> {
    String::from_utf8_lossy(output)
        .lines()
        .filter_map(|l| l.parse().ok())
        .collect()
}

fn control_lines(output: &[u8]) -> Vec<ControlLine> {
    String::from_utf8_lossy(output)
        .lines()
        .filter_map(|l| l.parse().ok())
        .collect()
}

#[test]
fn timed_test_three_seconds_end_to_end() {
    let config = centivolt_config();
    let ch = config.channels[0];
    let mut sampler = MockSampler::new();
    sampler
        .set(ch.loaded_voltage, 370)
        .set(ch.unloaded_voltage, 370)
        .set(ch.shunt_high, 50)
        .set(ch.shunt_low, 42);
    let mut relays = MockRelays::new();
    let mut clock = MockClock::new();
    let mut out = Vec::new();

    let summaries = {
        let mut tester = Tester::new(config, &mut sampler, &mut relays, &mut clock).unwrap();
        tester.run(&mut Cursor::new("START:1:3\n"), &mut out).unwrap()
    };

    let recs = records(&out);
    let secs: Vec<i32> = recs.iter().map(|r| r.elapsed_secs).collect();
    assert_eq!(secs, vec![-2, 0, 1, 2, 6]);
    assert!(recs.iter().all(|r| r.channel == 1));
    assert!(recs.iter().all(|r| (r.voltage - 3.7).abs() < 1e-3));
    assert!(recs.iter().all(|r| (r.current - 0.1).abs() < 1e-3));
    assert_eq!(control_lines(&out), vec![ControlLine::TestComplete]);

    assert_eq!(summaries.len(), 1);
    let capacity_ah = summaries[0].channels[0].capacity_mah / 1000.0;
    assert!((capacity_ah - 0.1 * 3.0 / 3600.0).abs() < 1e-6);
}

#[test]
fn constant_current_capacity_matches_integration_rule() {
    let config = centivolt_config();
    let ch = config.channels[1];
    let mut sampler = MockSampler::new();
    sampler.set(ch.shunt_high, 90).set(ch.shunt_low, 10);
    let mut relays = MockRelays::new();
    let mut clock = MockClock::new();
    let mut out = Vec::new();

    let summary = {
        let mut tester = Tester::new(config, &mut sampler, &mut relays, &mut clock).unwrap();
        tester.handle_line("START:2:120", &mut out).unwrap()
    };

    // 0.8 V across 0.8 ohm; seconds 1..=119 plus the post reading
    let current = 1.0;
    let expected_mah = 120.0 * current / 3600.0 * 1000.0;
    assert!((summary.channels[0].capacity_mah - expected_mah).abs() < 0.01);

    let last = records(&out).pop().unwrap();
    assert_eq!(last.elapsed_secs, 123);
    assert!((last.capacity_mah - expected_mah).abs() < 0.05);
}

#[test]
fn capacity_resets_between_runs() {
    let config = centivolt_config();
    let ch = config.channels[0];
    let mut sampler = MockSampler::new();
    sampler.set(ch.shunt_high, 50).set(ch.shunt_low, 42);
    let mut relays = MockRelays::new();
    let mut clock = MockClock::new();
    let mut out = Vec::new();

    let (first, second) = {
        let mut tester = Tester::new(config, &mut sampler, &mut relays, &mut clock).unwrap();
        let first = tester.handle_line("START:1:10", &mut out).unwrap();
        let second = tester.handle_line("START:1:10", &mut out).unwrap();
        (first, second)
    };

    assert!(first.channels[0].capacity_mah > 0.0);
    assert!((first.channels[0].capacity_mah - second.channels[0].capacity_mah).abs() < 1e-6);
}

#[test]
fn unknown_commands_produce_nothing() {
    let mut sampler = MockSampler::new();
    let mut relays = MockRelays::new();
    let mut clock = MockClock::new();
    let mut out = Vec::new();

    let summaries = {
        let mut tester =
            Tester::new(TesterConfig::default(), &mut sampler, &mut relays, &mut clock).unwrap();
        let input = "FOO:1\n\nstart:1\nSTATUS\n";
        tester.run(&mut Cursor::new(input), &mut out).unwrap()
    };

    assert!(summaries.is_empty());
    assert!(out.is_empty());
    assert!(relays.history().is_empty());
    assert_eq!(clock.now_us(), 0);
}

#[test]
fn line_noise_does_not_stop_the_command_loop() {
    let config = centivolt_config();
    let ch = config.channels[0];
    let mut sampler = MockSampler::new();
    sampler.set(ch.loaded_voltage, 370).set(ch.shunt_high, 50).set(ch.shunt_low, 42);
    let mut relays = MockRelays::new();
    let mut clock = MockClock::new();
    let mut out = Vec::new();

    let mut input = Vec::new();
    input.extend_from_slice(&[0xFF, b'\n']);
    input.extend_from_slice(b"ST\x80ART:2\n");
    input.extend_from_slice(b"START:1:1\n");

    let summaries = {
        let mut tester = Tester::new(config, &mut sampler, &mut relays, &mut clock).unwrap();
        tester.run(&mut Cursor::new(input), &mut out).unwrap()
    };

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].channels[0].channel, 1);
    let secs: Vec<i32> = records(&out).iter().map(|r| r.elapsed_secs).collect();
    assert_eq!(secs, vec![-2, 0, 4]);
    assert_eq!(control_lines(&out), vec![ControlLine::TestComplete]);
}

#[test]
fn full_discharge_on_simulated_bench() {
    let config = TesterConfig::default();
    let bench = SimulatedBench::new(&config, CellModel::default()).shared();
    bench.set_state_of_charge(0, 0.3);
    bench.set_state_of_charge(1, 0.2);
    let mut out = Vec::new();

    let summaries = {
        let mut tester =
            Tester::new(config.clone(), bench.clone(), bench.clone(), bench.clone()).unwrap();
        tester.run(&mut Cursor::new("FULLTEST:1,2\n"), &mut out).unwrap()
    };

    let summary = &summaries[0];
    assert_eq!(summary.kind, TestKind::FullDischarge);
    assert!(!summary.aborted);

    let controls = control_lines(&out);
    assert_eq!(controls.len(), 2);
    assert!(controls.contains(&ControlLine::ChannelComplete(1)));
    assert!(controls.contains(&ControlLine::ChannelComplete(2)));

    // the emptier cell finishes first
    let cutoff_1 = summary.channels[0].cutoff_at.unwrap();
    let cutoff_2 = summary.channels[1].cutoff_at.unwrap();
    assert!(cutoff_2 < cutoff_1);

    // each channel's last loaded record is the first at or below cutoff
    for (channel, cutoff) in [(1, cutoff_1), (2, cutoff_2)] {
        let loaded: Vec<MeasurementRecord> = records(&out)
            .into_iter()
            .filter(|r| r.channel == channel && r.elapsed_secs >= 0)
            .collect();
        let last = loaded.last().unwrap();
        assert_eq!(last.elapsed_secs, cutoff as i32);
        assert!(last.voltage <= config.cutoff_voltage);
        // records carry 3 decimals, so allow for rounding down onto the cutoff
        assert!(loaded[..loaded.len() - 1]
            .iter()
            .all(|r| r.voltage >= config.cutoff_voltage - 1e-3));
        assert!(last.capacity_mah > 0.0);
    }
}

#[test]
fn cancelled_full_discharge_opens_relays() {
    let config = centivolt_config();
    let ch = config.channels[0];
    let mut sampler = MockSampler::new();
    sampler.set(ch.loaded_voltage, 400);
    let mut relays = MockRelays::new();
    let mut clock = MockClock::new();
    let mut out = Vec::new();
    let flag = CancelFlag::new();
    flag.cancel();

    let summary = {
        let mut tester = Tester::new(config, &mut sampler, &mut relays, &mut clock).unwrap();
        tester.set_cancel_flag(flag);
        tester.handle_line("FULLTEST:1", &mut out).unwrap()
    };

    assert!(summary.aborted);
    assert_eq!(control_lines(&out), vec![ControlLine::Aborted]);
    assert!(!relays.is_on(ch.relay));
}

#[test]
fn summary_serializes_to_json() {
    let mut sampler = MockSampler::new();
    let mut relays = MockRelays::new();
    let mut clock = MockClock::new();
    let mut out = Vec::new();

    let summary = {
        let mut tester =
            Tester::new(TesterConfig::default(), &mut sampler, &mut relays, &mut clock).unwrap();
        tester.handle_line("START:1,2:1", &mut out).unwrap()
    };

    let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["kind"], "Timed");
    assert_eq!(json["ticks"], 1);
    assert_eq!(json["channels"].as_array().unwrap().len(), 2);
    assert_eq!(json["channels"][1]["channel"], 2);
}
