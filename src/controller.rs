//! Timed and full-discharge test state machines.
//!
//! Both tests run to completion before returning. `&mut self` on every entry
//! point means only one test can be in flight per controller; share a
//! controller between threads through a `Mutex` to keep it that way.

use crate::channels::ChannelSet;
use crate::config::{TesterConfig, Timing};
use crate::constants::*;
use crate::hal::{Clock, RelayDriver, Sampler};
use crate::measurement::MeasurementEngine;
use crate::report::{ControlLine, MeasurementRecord};
use crate::types::{ChannelSummary, LineId, TestKind, TestSummary, TickCadence};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fmt::Display;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request, checked once per sampling tick
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// State of one test invocation
struct TestRun {
    kind: TestKind,
    started_at: DateTime<Utc>,
    /// 0-based channels under test
    channels: Vec<usize>,
    finished: Vec<bool>,
    cutoff_at: Vec<Option<u32>>,
    ticks: u32,
}

impl TestRun {
    fn new(kind: TestKind, channels: Vec<usize>) -> Self {
        let count = channels.len();
        Self {
            kind,
            started_at: Utc::now(),
            channels,
            finished: vec![false; count],
            cutoff_at: vec![None; count],
            ticks: 0,
        }
    }
}

/// Write one line of the output stream. A failed write is logged and the
/// test carries on.
pub(crate) fn emit<W: Write>(out: &mut W, line: impl Display) {
    if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
        warn!("failed to write {:?}: {}", line.to_string(), e);
    }
}

/// Drives the relays and measurements of a bench
pub struct TestController<S, R, C> {
    sampler: S,
    relays: R,
    clock: C,
    channels: ChannelSet,
    engine: MeasurementEngine,
    timing: Timing,
    cutoff_voltage: f32,
    max_full_discharge_secs: Option<u32>,
    cancel: Option<CancelFlag>,
}

impl<S, R, C> TestController<S, R, C>
where
    S: Sampler,
    R: RelayDriver,
    C: Clock,
{
    pub fn new(config: &TesterConfig, sampler: S, relays: R, clock: C) -> Self {
        Self {
            sampler,
            relays,
            clock,
            channels: ChannelSet::new(config.channels.clone()),
            engine: MeasurementEngine::new(config.calibration),
            timing: config.timing,
            cutoff_voltage: config.cutoff_voltage,
            max_full_discharge_secs: config.max_full_discharge_secs,
            cancel: None,
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelSet {
        &mut self.channels
    }

    /// Install a flag that stops a running test at the next tick
    pub fn set_cancel_flag(&mut self, flag: CancelFlag) {
        self.cancel = Some(flag);
    }

    /// Single unfiltered read of a line, in volts
    pub fn read_raw_volts(&mut self, line: LineId) -> f32 {
        self.sampler.read(line) as f32 * self.engine.calibration().volts_per_count()
    }

    /// Open every relay, active or not
    pub fn release_all(&mut self) {
        for channel in self.channels.channels() {
            self.relays.set_relay(channel.relay, false);
        }
    }

    /// Run a test of `kind` on the currently active channels
    pub fn run<W: Write>(&mut self, kind: TestKind, duration_secs: u32, out: &mut W) -> TestSummary {
        match kind {
            TestKind::Timed => self.run_timed(duration_secs, out),
            TestKind::FullDischarge => self.run_full_discharge(out),
        }
    }

    /// Load every active channel for `duration_secs` one-second ticks.
    ///
    /// Emits a no-load record at -2 s, one record per channel per tick, a
    /// no-load record at `duration + 3` s after the rest period, then
    /// `TEST_COMPLETE`.
    pub fn run_timed<W: Write>(&mut self, duration_secs: u32, out: &mut W) -> TestSummary {
        let mut run = TestRun::new(TestKind::Timed, self.channels.active_indices());
        info!("timed test on {:?} for {}s", one_based(&run.channels), duration_secs);

        self.pre_measure(&run, out);
        self.activate(&run);

        for sec in 0..duration_secs {
            if self.cancel_requested() {
                return self.abort(run, out);
            }

            let tick_start = self.clock.now_ms();
            for &index in &run.channels {
                self.measure_and_report(index, sec as i32, out);
            }
            run.ticks += 1;
            self.end_tick(tick_start, self.timing.timed_cadence);
        }

        self.release_all();

        self.clock.delay_ms(self.timing.rest_ms);
        let post_secs = duration_secs as i32 + POST_MEASURE_OFFSET_SECS;
        for &index in &run.channels {
            self.measure_and_report(index, post_secs, out);
        }

        emit(out, ControlLine::TestComplete);
        self.finish(run, false)
    }

    /// Load every active channel until its loaded voltage reaches cutoff.
    ///
    /// Each channel's relay opens on the tick it first reads at or below
    /// the cutoff, and `TEST_COMPLETE:<n>` is emitted for it. The test ends
    /// once every channel has finished, followed by the rest period.
    pub fn run_full_discharge<W: Write>(&mut self, out: &mut W) -> TestSummary {
        let mut run = TestRun::new(TestKind::FullDischarge, self.channels.active_indices());
        info!(
            "full discharge test on {:?}, cutoff {:.2} V",
            one_based(&run.channels),
            self.cutoff_voltage
        );

        self.pre_measure(&run, out);
        self.activate(&run);

        let mut sec: u32 = 0;
        loop {
            let limit_reached = self.max_full_discharge_secs.is_some_and(|max| sec >= max);
            if limit_reached || self.cancel_requested() {
                if limit_reached {
                    warn!("full discharge stopped after {}s tick limit", sec);
                }
                return self.abort(run, out);
            }

            let tick_start = self.clock.now_ms();
            let mut still_running = false;

            for slot in 0..run.channels.len() {
                if run.finished[slot] {
                    continue;
                }
                let index = run.channels[slot];
                let voltage = self.measure_and_report(index, sec as i32, out);

                if voltage <= self.cutoff_voltage {
                    run.finished[slot] = true;
                    run.cutoff_at[slot] = Some(sec);
                    if let Some(channel) = self.channels.channel(index) {
                        self.relays.set_relay(channel.relay, false);
                    }
                    info!("channel {} reached cutoff at {}s ({:.3} V)", index + 1, sec, voltage);
                    emit(out, ControlLine::ChannelComplete(index + 1));
                } else {
                    still_running = true;
                }
            }

            self.end_tick(tick_start, self.timing.full_discharge_cadence);
            sec += 1;
            run.ticks = sec;

            if !still_running {
                break;
            }
        }

        self.clock.delay_ms(self.timing.rest_ms);
        self.finish(run, false)
    }

    fn pre_measure<W: Write>(&mut self, run: &TestRun, out: &mut W) {
        for &index in &run.channels {
            self.measure_and_report(index, PRE_MEASURE_SECS, out);
        }
    }

    /// Close the relays under test, zero their accumulators and let the
    /// load settle
    fn activate(&mut self, run: &TestRun) {
        for &index in &run.channels {
            if let Some(channel) = self.channels.channel(index) {
                self.relays.set_relay(channel.relay, true);
            }
            self.channels.reset_accumulators(index);
        }
        self.clock.delay_ms(self.timing.relay_settle_ms);
    }

    /// Measure, report, and return the fresh voltage
    fn measure_and_report<W: Write>(&mut self, index: usize, elapsed_secs: i32, out: &mut W) -> f32 {
        let Some((channel, state)) = self.channels.split_mut(index) else {
            return f32::NAN;
        };
        self.engine
            .measure(&mut self.sampler, &mut self.clock, channel, state, elapsed_secs);
        emit(out, MeasurementRecord::from_state(index, elapsed_secs, state));
        state.voltage
    }

    fn end_tick(&mut self, tick_start: u64, cadence: TickCadence) {
        match cadence {
            TickCadence::Corrected => self.clock.sleep_until(tick_start + self.timing.tick_ms),
            TickCadence::FixedDelay => self.clock.delay_ms(self.timing.tick_ms),
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    fn abort<W: Write>(&mut self, run: TestRun, out: &mut W) -> TestSummary {
        self.release_all();
        if let Some(flag) = &self.cancel {
            flag.reset();
        }
        warn!("{:?} test aborted after {} ticks", run.kind, run.ticks);
        emit(out, ControlLine::Aborted);
        self.finish(run, true)
    }

    fn finish(&self, run: TestRun, aborted: bool) -> TestSummary {
        let channels = run
            .channels
            .iter()
            .zip(&run.cutoff_at)
            .filter_map(|(&index, &cutoff_at)| {
                let state = self.channels.state(index)?;
                Some(ChannelSummary {
                    channel: index + 1,
                    final_voltage: state.voltage,
                    capacity_mah: state.capacity_mah(),
                    cutoff_at,
                })
            })
            .collect();

        let summary = TestSummary {
            kind: run.kind,
            started_at: run.started_at,
            finished_at: Utc::now(),
            ticks: run.ticks,
            aborted,
            channels,
        };
        debug!("{:?} test finished: {:?}", summary.kind, summary);
        summary
    }
}

fn one_based(indices: &[usize]) -> Vec<usize> {
    indices.iter().map(|i| i + 1).collect()
}
