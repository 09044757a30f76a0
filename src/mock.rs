//! Deterministic fakes for the hardware traits.
//!
//! Used by the unit and integration tests to drive the controller without a
//! board. Time only moves when something waits on the [`MockClock`].

use crate::config::Calibration;
use crate::hal::{Clock, RelayDriver, Sampler};
use crate::types::LineId;
use std::collections::{HashMap, VecDeque};

/// Scripted values for one line
#[derive(Debug, Clone)]
struct Script {
    values: VecDeque<u16>,
    /// Reads each value is held for
    hold: usize,
    served: usize,
}

/// Sampler returning a fixed or scripted raw count per line
#[derive(Debug, Clone, Default)]
pub struct MockSampler {
    fixed: HashMap<LineId, u16>,
    scripts: HashMap<LineId, Script>,
    reads: HashMap<LineId, usize>,
}

impl MockSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `counts` on every read of `line`
    pub fn set(&mut self, line: LineId, counts: u16) -> &mut Self {
        self.fixed.insert(line, counts);
        self
    }

    pub fn set_volts(&mut self, line: LineId, volts: f32, calibration: &Calibration) -> &mut Self {
        self.set(line, calibration.to_counts(volts))
    }

    /// Serve `values` in order, each for `hold` consecutive reads. The last
    /// value stays once the script is exhausted.
    pub fn script(&mut self, line: LineId, values: &[u16], hold: usize) -> &mut Self {
        self.scripts.insert(
            line,
            Script {
                values: values.iter().copied().collect(),
                hold: hold.max(1),
                served: 0,
            },
        );
        self
    }

    pub fn script_volts(
        &mut self,
        line: LineId,
        volts: &[f32],
        hold: usize,
        calibration: &Calibration,
    ) -> &mut Self {
        let counts: Vec<u16> = volts.iter().map(|&v| calibration.to_counts(v)).collect();
        self.script(line, &counts, hold)
    }

    /// Number of reads made on `line`
    pub fn reads(&self, line: LineId) -> usize {
        self.reads.get(&line).copied().unwrap_or(0)
    }
}

impl Sampler for MockSampler {
    fn read(&mut self, line: LineId) -> u16 {
        *self.reads.entry(line).or_insert(0) += 1;

        if let Some(script) = self.scripts.get_mut(&line) {
            if script.values.len() > 1 && script.served == script.hold {
                script.values.pop_front();
                script.served = 0;
            }
            if let Some(&value) = script.values.front() {
                script.served += 1;
                return value;
            }
        }

        self.fixed.get(&line).copied().unwrap_or(0)
    }
}

/// Relay driver that remembers every switch
#[derive(Debug, Clone, Default)]
pub struct MockRelays {
    states: HashMap<LineId, bool>,
    history: Vec<(LineId, bool)>,
}

impl MockRelays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self, line: LineId) -> bool {
        self.states.get(&line).copied().unwrap_or(false)
    }

    pub fn history(&self) -> &[(LineId, bool)] {
        &self.history
    }
}

impl RelayDriver for MockRelays {
    fn set_relay(&mut self, line: LineId, on: bool) {
        self.states.insert(line, on);
        self.history.push((line, on));
    }
}

/// Virtual clock advanced only by delays
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now_us: u64,
    delays_ms: Vec<u64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// Every millisecond delay requested, in order
    pub fn delays_ms(&self) -> &[u64] {
        &self.delays_ms
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_us / 1000
    }

    fn delay_ms(&mut self, ms: u64) {
        self.delays_ms.push(ms);
        self.now_us = self.now_us.wrapping_add(ms.saturating_mul(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.now_us = self.now_us.wrapping_add(us as u64);
    }
}
