//! Filtered ADC reads and the voltage/current/capacity conversions.

use crate::config::Calibration;
use crate::constants::SECONDS_PER_HOUR;
use crate::hal::{Clock, Sampler};
use crate::types::{Channel, ChannelState, LineId};
use log::debug;

/// Converts raw samples into calibrated channel measurements
#[derive(Debug, Clone, Copy)]
pub struct MeasurementEngine {
    calibration: Calibration,
}

impl MeasurementEngine {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Noise-reduced voltage on one line.
    ///
    /// The first sample is thrown away so the ADC mux can settle, then
    /// `filter_samples` reads are averaged.
    pub fn read_filtered<S, C>(&self, sampler: &mut S, clock: &mut C, line: LineId) -> f32
    where
        S: Sampler,
        C: Clock,
    {
        sampler.read(line);
        clock.delay_us(self.calibration.settle_delay_us);

        let mut sum = 0.0f32;
        for _ in 0..self.calibration.filter_samples {
            sum += sampler.read(line) as f32;
            clock.delay_us(self.calibration.sample_delay_us);
        }

        (sum / self.calibration.filter_samples as f32) * self.calibration.volts_per_count()
    }

    /// Refresh `state` from the channel's sense lines.
    ///
    /// A negative `elapsed_secs` selects the unloaded (direct) voltage line.
    /// Capacity only accumulates for `elapsed_secs > 0`, one second's worth
    /// per call; the current is not clamped, so a negative reading lowers it.
    pub fn measure<S, C>(
        &self,
        sampler: &mut S,
        clock: &mut C,
        channel: &Channel,
        state: &mut ChannelState,
        elapsed_secs: i32,
    ) where
        S: Sampler,
        C: Clock,
    {
        let voltage_line = if elapsed_secs < 0 {
            channel.unloaded_voltage
        } else {
            channel.loaded_voltage
        };

        state.voltage = self.read_filtered(sampler, clock, voltage_line);
        state.shunt_high = self.read_filtered(sampler, clock, channel.shunt_high);
        state.shunt_low = self.read_filtered(sampler, clock, channel.shunt_low);

        state.shunt_diff = state.shunt_high - state.shunt_low;
        state.current = state.shunt_diff / self.calibration.shunt_ohms;

        if elapsed_secs > 0 {
            state.capacity += state.current / SECONDS_PER_HOUR;
        }

        debug!(
            "measured relay {} at {}s: {:.3} V, {:.3} A, {:.4} Ah",
            channel.relay, elapsed_secs, state.voltage, state.current, state.capacity
        );
    }
}
