//! Bench configuration.
//!
//! Every value has a default matching the stock two-channel board, so an
//! empty JSON object is a valid configuration.

use crate::constants::*;
use crate::error::{Result, TesterError};
use crate::types::{Channel, ParseMode, TickCadence};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ADC and shunt calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// ADC reference voltage
    pub v_ref: f32,
    /// Highest raw ADC count
    pub full_scale: u16,
    /// Shunt resistance in ohms
    pub shunt_ohms: f32,
    /// Samples averaged per filtered read
    pub filter_samples: u16,
    pub settle_delay_us: u32,
    pub sample_delay_us: u32,
}

impl Calibration {
    /// Volts per raw count
    pub fn volts_per_count(&self) -> f32 {
        self.v_ref / self.full_scale as f32
    }

    /// Raw count the ADC would return for `volts`, clamped to the ADC range
    pub fn to_counts(&self, volts: f32) -> u16 {
        let counts = (volts / self.volts_per_count()).round();
        counts.clamp(0.0, self.full_scale as f32) as u16
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            v_ref: V_REF,
            full_scale: ADC_FULL_SCALE,
            shunt_ohms: SHUNT_RESISTANCE,
            filter_samples: FILTER_SAMPLES,
            settle_delay_us: SETTLE_DELAY_US,
            sample_delay_us: SAMPLE_DELAY_US,
        }
    }
}

/// Delays and tick pacing of the test state machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub relay_settle_ms: u64,
    pub tick_ms: u64,
    pub rest_ms: u64,
    pub timed_cadence: TickCadence,
    pub full_discharge_cadence: TickCadence,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            relay_settle_ms: RELAY_SETTLE_MS,
            tick_ms: TICK_MS,
            rest_ms: REST_MS,
            timed_cadence: TickCadence::Corrected,
            full_discharge_cadence: TickCadence::FixedDelay,
        }
    }
}

/// Complete tester configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    pub channels: Vec<Channel>,
    pub calibration: Calibration,
    pub timing: Timing,
    pub default_duration_secs: u32,
    pub max_duration_secs: u32,
    pub cutoff_voltage: f32,
    pub parse_mode: ParseMode,
    /// Stop a full-discharge test after this many ticks
    pub max_full_discharge_secs: Option<u32>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            calibration: Calibration::default(),
            timing: Timing::default(),
            default_duration_secs: DEFAULT_TEST_DURATION,
            max_duration_secs: MAX_TEST_DURATION,
            cutoff_voltage: CUTOFF_VOLTAGE,
            parse_mode: ParseMode::Lenient,
            max_full_discharge_secs: None,
        }
    }
}

/// Pin map of the stock board.
///
/// Relays on D2/D3. Analog lines are numbered as the ADC mux inputs
/// (A0 = 0 ... A7 = 7).
pub fn default_channels() -> Vec<Channel> {
    vec![
        Channel {
            relay: 2,
            loaded_voltage: 0,
            shunt_high: 1,
            shunt_low: 2,
            unloaded_voltage: 6,
        },
        Channel {
            relay: 3,
            loaded_voltage: 3,
            shunt_high: 4,
            shunt_low: 5,
            unloaded_voltage: 7,
        },
    ]
}

impl TesterConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values that would make measurement or parsing meaningless
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(TesterError::Config("no channels configured".to_string()));
        }
        if self.calibration.full_scale == 0 {
            return Err(TesterError::Config("full_scale must be non-zero".to_string()));
        }
        if !(self.calibration.shunt_ohms > 0.0) {
            return Err(TesterError::Config("shunt_ohms must be positive".to_string()));
        }
        if self.calibration.filter_samples == 0 {
            return Err(TesterError::Config("filter_samples must be non-zero".to_string()));
        }
        if self.max_duration_secs == 0
            || self.default_duration_secs == 0
            || self.default_duration_secs > self.max_duration_secs
        {
            return Err(TesterError::Config(format!(
                "default duration {}s must be within 1..={}",
                self.default_duration_secs, self.max_duration_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = TesterConfig::from_json_str("{}").unwrap();
        assert_eq!(config, TesterConfig::default());
        assert_eq!(config.channels.len(), NUM_CHANNELS);
        assert_eq!(config.timing.full_discharge_cadence, TickCadence::FixedDelay);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "calibration": { "shunt_ohms": 1.0 },
            "timing": { "full_discharge_cadence": "corrected" },
            "parse_mode": "strict",
            "max_full_discharge_secs": 7200
        }"#;
        let config = TesterConfig::from_json_str(json).unwrap();
        assert_eq!(config.calibration.shunt_ohms, 1.0);
        assert_eq!(config.calibration.v_ref, V_REF);
        assert_eq!(config.timing.full_discharge_cadence, TickCadence::Corrected);
        assert_eq!(config.timing.tick_ms, TICK_MS);
        assert_eq!(config.parse_mode, ParseMode::Strict);
        assert_eq!(config.max_full_discharge_secs, Some(7200));
    }

    #[test]
    fn test_rejects_zero_shunt() {
        let err = TesterConfig::from_json_str(r#"{ "calibration": { "shunt_ohms": 0.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, TesterError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_channel_map() {
        let err = TesterConfig::from_json_str(r#"{ "channels": [] }"#).unwrap_err();
        assert!(matches!(err, TesterError::Config(_)));
    }

    #[test]
    fn test_volts_per_count() {
        let cal = Calibration::default();
        assert!((cal.volts_per_count() * 1023.0 - 5.01).abs() < 1e-5);
    }

    #[test]
    fn test_to_counts_clamps() {
        let cal = Calibration::default();
        assert_eq!(cal.to_counts(-1.0), 0);
        assert_eq!(cal.to_counts(99.0), cal.full_scale);
        assert_eq!(cal.to_counts(5.01), 1023);
        assert_eq!(cal.to_counts(2.5), 510);
    }
}
