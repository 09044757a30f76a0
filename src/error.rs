//! Error types for discharge tester operations.

use thiserror::Error;

/// Result type alias for tester operations.
pub type Result<T> = std::result::Result<T, TesterError>;

/// Error types for the discharge tester.
///
/// The command loop runs in lenient mode by default and never surfaces the
/// parse variants; they are only returned by the strict parser.
#[derive(Error, Debug)]
pub enum TesterError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Line does not start with a known command prefix
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command carried no channel numbers
    #[error("Missing channel list")]
    MissingChannelList,

    /// Channel token is not a number
    #[error("Invalid channel: {0:?}")]
    InvalidChannel(String),

    /// Channel number outside 1..=count
    #[error("Channel {channel} out of range (1..={count})")]
    ChannelOutOfRange {
        /// 1-based channel number as received
        channel: i64,
        /// Number of channels on the bench
        count: usize,
    },

    /// Duration token is not a number
    #[error("Invalid duration: {0:?}")]
    InvalidDuration(String),

    /// Duration outside the accepted range
    #[error("Duration {value}s out of range (1..={max})")]
    DurationOutOfRange {
        /// Duration as received
        value: i64,
        /// Longest accepted duration
        max: u32,
    },

    /// Measurement line could not be parsed
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}
