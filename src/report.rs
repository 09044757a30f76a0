//! Line formats of the output stream.

use crate::constants::*;
use crate::error::TesterError;
use crate::types::ChannelState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One measurement line:
/// `BATT:<n>|SEC:<s>|V_BAT:<v>|V_SH_H:<h>|V_SH_L:<l>|V_DIFF:<d>|A:<a>|mAh:<c>`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// 1-based channel number
    pub channel: usize,
    pub elapsed_secs: i32,
    pub voltage: f32,
    pub shunt_high: f32,
    pub shunt_low: f32,
    pub shunt_diff: f32,
    pub current: f32,
    pub capacity_mah: f32,
}

impl MeasurementRecord {
    /// Snapshot of a 0-based channel's state
    pub fn from_state(index: usize, elapsed_secs: i32, state: &ChannelState) -> Self {
        Self {
            channel: index + 1,
            elapsed_secs,
            voltage: state.voltage,
            shunt_high: state.shunt_high,
            shunt_low: state.shunt_low,
            shunt_diff: state.shunt_diff,
            current: state.current,
            capacity_mah: state.capacity_mah(),
        }
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BATT:{}|SEC:{}|V_BAT:{:.3}|V_SH_H:{:.4}|V_SH_L:{:.4}|V_DIFF:{:.4}|A:{:.3}|mAh:{:.1}",
            self.channel,
            self.elapsed_secs,
            self.voltage,
            self.shunt_high,
            self.shunt_low,
            self.shunt_diff,
            self.current,
            self.capacity_mah
        )
    }
}

fn field<'a, I>(fields: &mut I, key: &str, line: &str) -> Result<&'a str, TesterError>
where
    I: Iterator<Item = &'a str>,
{
    fields
        .next()
        .and_then(|f| f.strip_prefix(key))
        .and_then(|f| f.strip_prefix(':'))
        .ok_or_else(|| TesterError::InvalidRecord(format!("missing {} in {:?}", key, line)))
}

fn number<T: FromStr>(value: &str, key: &str) -> Result<T, TesterError> {
    value
        .parse()
        .map_err(|_| TesterError::InvalidRecord(format!("bad {} value {:?}", key, value)))
}

impl FromStr for MeasurementRecord {
    type Err = TesterError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let mut fields = line.split('|');

        let record = Self {
            channel: number(field(&mut fields, "BATT", line)?, "BATT")?,
            elapsed_secs: number(field(&mut fields, "SEC", line)?, "SEC")?,
            voltage: number(field(&mut fields, "V_BAT", line)?, "V_BAT")?,
            shunt_high: number(field(&mut fields, "V_SH_H", line)?, "V_SH_H")?,
            shunt_low: number(field(&mut fields, "V_SH_L", line)?, "V_SH_L")?,
            shunt_diff: number(field(&mut fields, "V_DIFF", line)?, "V_DIFF")?,
            current: number(field(&mut fields, "A", line)?, "A")?,
            capacity_mah: number(field(&mut fields, "mAh", line)?, "mAh")?,
        };

        if fields.next().is_some() {
            return Err(TesterError::InvalidRecord(format!("trailing fields in {:?}", line)));
        }
        Ok(record)
    }
}

/// Non-measurement lines of the output stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLine {
    /// Timed test finished
    TestComplete,
    /// Full-discharge channel reached cutoff (1-based)
    ChannelComplete(usize),
    /// Test stopped before completion
    Aborted,
    /// Strict-mode parse failure
    Error(String),
}

impl fmt::Display for ControlLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlLine::TestComplete => write!(f, "{}", TEST_COMPLETE),
            ControlLine::ChannelComplete(channel) => write!(f, "{}:{}", TEST_COMPLETE, channel),
            ControlLine::Aborted => write!(f, "{}", TEST_ABORTED),
            ControlLine::Error(message) => write!(f, "ERROR:{}", message),
        }
    }
}

impl FromStr for ControlLine {
    type Err = TesterError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line == TEST_COMPLETE {
            return Ok(ControlLine::TestComplete);
        }
        if line == TEST_ABORTED {
            return Ok(ControlLine::Aborted);
        }
        if let Some(channel) = line.strip_prefix(TEST_COMPLETE).and_then(|s| s.strip_prefix(':')) {
            return Ok(ControlLine::ChannelComplete(number(channel, TEST_COMPLETE)?));
        }
        if let Some(message) = line.strip_prefix("ERROR:") {
            return Ok(ControlLine::Error(message.to_string()));
        }
        Err(TesterError::InvalidRecord(format!("not a control line: {:?}", line)))
    }
}

/// Startup banner; `first_voltage` is a single raw reading of channel 1
pub fn banner(first_voltage: f32) -> Vec<String> {
    vec![
        "System Ready".to_string(),
        "START:1,2        -> Timed test (default 30s)".to_string(),
        "START:1,2:60     -> Timed test (60s)".to_string(),
        "FULLTEST:1,2     -> Full discharge test".to_string(),
        format!("Battery 1 voltage before test: {:.2}", first_voltage),
    ]
}
