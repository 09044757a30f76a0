use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an analog sense line or relay output
pub type LineId = u8;

/// Hardware lines wired to one battery slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Relay control output
    pub relay: LineId,
    /// Battery voltage measured through the load
    pub loaded_voltage: LineId,
    /// Battery voltage measured directly at the positive terminal
    pub unloaded_voltage: LineId,
    /// Shunt high side
    pub shunt_high: LineId,
    /// Shunt low side
    pub shunt_low: LineId,
}

/// Latest measurement snapshot of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub voltage: f32,
    pub shunt_high: f32,
    pub shunt_low: f32,
    /// `shunt_high - shunt_low`
    pub shunt_diff: f32,
    /// Amps
    pub current: f32,
    /// Accumulated capacity in amp-hours
    pub capacity: f32,
    /// Reserved for current smoothing
    pub last_current: f32,
}

impl ChannelState {
    /// Capacity in milliamp-hours, as reported on the wire
    pub fn capacity_mah(&self) -> f32 {
        self.capacity * 1000.0
    }
}

/// Kind of discharge test requested by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    /// Fixed-duration test (`START`)
    Timed,
    /// Run every channel down to the cutoff voltage (`FULLTEST`)
    FullDischarge,
}

/// Channels and duration selected by one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPlan {
    active: Vec<bool>,
    /// Timed test length in seconds; unused by full-discharge tests
    pub duration_secs: u32,
}

impl ActivationPlan {
    /// Plan with every channel inactive and the given duration
    pub fn new(channel_count: usize, duration_secs: u32) -> Self {
        Self {
            active: vec![false; channel_count],
            duration_secs,
        }
    }

    /// Mark a 0-based channel active. Returns false if out of range.
    pub fn activate(&mut self, index: usize) -> bool {
        match self.active.get_mut(index) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    pub fn flags(&self) -> &[bool] {
        &self.active
    }
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: TestKind,
    pub plan: ActivationPlan,
}

/// How the parser treats malformed tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Drop bad tokens and unknown lines silently
    #[default]
    Lenient,
    /// Reject the whole line on the first bad token
    Strict,
}

/// How a sampling tick is paced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickCadence {
    /// Tick ends one tick length after it started; measurement time is absorbed
    Corrected,
    /// A full tick length is waited after the measurements
    FixedDelay,
}

/// Final figures for one channel after a test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// 1-based channel number
    pub channel: usize,
    pub final_voltage: f32,
    pub capacity_mah: f32,
    /// Tick on which the channel reached cutoff (full-discharge only)
    pub cutoff_at: Option<u32>,
}

/// Outcome of one test run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSummary {
    pub kind: TestKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Sampling ticks executed
    pub ticks: u32,
    /// Stopped by cancellation or the tick limit
    pub aborted: bool,
    pub channels: Vec<ChannelSummary>,
}
