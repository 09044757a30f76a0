//! Protocol and hardware constants for the discharge tester.
//!
//! This module defines the command tokens, output markers, calibration
//! defaults and timing parameters used by the test controller.

/// Command prefix for a fixed-duration test
pub const START_PREFIX: &str = "START:";

/// Command prefix for a run-to-cutoff test
pub const FULLTEST_PREFIX: &str = "FULLTEST:";

/// Separator between the channel list and the duration
pub const FIELD_SEPARATOR: char = ':';

/// Separator between channel numbers in the channel list
pub const CHANNEL_SEPARATOR: char = ',';

/// Marker emitted when a timed test has finished
pub const TEST_COMPLETE: &str = "TEST_COMPLETE";

/// Marker emitted when a test is stopped before completion
pub const TEST_ABORTED: &str = "TEST_ABORTED";

/// Number of battery channels on the stock board
pub const NUM_CHANNELS: usize = 2;

/// Shunt resistance in ohms
pub const SHUNT_RESISTANCE: f32 = 0.8;

/// ADC reference voltage
pub const V_REF: f32 = 5.01;

/// Highest raw count the ADC returns (10-bit)
pub const ADC_FULL_SCALE: u16 = 1023;

/// Samples averaged per filtered read (after the discarded settling sample)
pub const FILTER_SAMPLES: u16 = 10;

/// Delay after the discarded settling sample
pub const SETTLE_DELAY_US: u32 = 300;

/// Delay between averaged samples
pub const SAMPLE_DELAY_US: u32 = 150;

/// Default timed test duration in seconds
pub const DEFAULT_TEST_DURATION: u32 = 30;

/// Longest accepted timed test duration in seconds
pub const MAX_TEST_DURATION: u32 = 3600;

/// Full-discharge cutoff voltage
pub const CUTOFF_VOLTAGE: f32 = 3.0;

/// Elapsed-seconds value used for the no-load reading before a test
pub const PRE_MEASURE_SECS: i32 = -2;

/// Offset added to the duration for the no-load reading after a timed test
pub const POST_MEASURE_OFFSET_SECS: i32 = 3;

/// Seconds per hour, used to integrate amps into amp-hours at 1 Hz
pub const SECONDS_PER_HOUR: f32 = 3600.0;

/// Delay after closing the relays before sampling starts
pub const RELAY_SETTLE_MS: u64 = 500;

/// Length of one sampling tick
pub const TICK_MS: u64 = 1000;

/// Rest period after the load is removed
pub const REST_MS: u64 = 3000;

/// Serial baud rate of the command console
pub const BAUD_RATE: u32 = 9600;

/// Serial read timeout in milliseconds
pub const TIMEOUT_MS: u64 = 2000;
