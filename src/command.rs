//! Command line interpretation.
//!
//! `START:<channels>[:<secs>]` and `FULLTEST:<channels>` are turned into a
//! [`Command`]. In lenient mode bad channel or duration tokens are dropped
//! with a warning; strict mode rejects the line.

use crate::constants::*;
use crate::error::{Result, TesterError};
use crate::types::{ActivationPlan, Command, ParseMode, TestKind};
use log::warn;

/// Parses command lines against a fixed channel count
#[derive(Debug, Clone, Copy)]
pub struct CommandParser {
    channel_count: usize,
    default_duration: u32,
    max_duration: u32,
    mode: ParseMode,
}

impl CommandParser {
    pub fn new(channel_count: usize, default_duration: u32, max_duration: u32, mode: ParseMode) -> Self {
        Self {
            channel_count,
            default_duration,
            max_duration,
            mode,
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Parse one line.
    ///
    /// Lines without a known prefix are `UnknownCommand` in both modes; the
    /// caller decides whether that is worth mentioning.
    pub fn parse(&self, line: &str) -> Result<Command> {
        let line = line.trim();

        let (kind, body) = if let Some(body) = line.strip_prefix(START_PREFIX) {
            (TestKind::Timed, body)
        } else if let Some(body) = line.strip_prefix(FULLTEST_PREFIX) {
            (TestKind::FullDischarge, body)
        } else {
            return Err(TesterError::UnknownCommand(line.to_string()));
        };

        let body = body.trim();
        let (channel_part, duration_part) = match body.split_once(FIELD_SEPARATOR) {
            Some((channels, duration)) => (channels, Some(duration)),
            None => (body, None),
        };

        let mut plan = ActivationPlan::new(self.channel_count, self.default_duration);
        self.parse_channels(channel_part, &mut plan)?;
        if let Some(duration) = duration_part.filter(|d| !d.is_empty()) {
            self.parse_duration(duration, &mut plan)?;
        }

        Ok(Command { kind, plan })
    }

    fn parse_channels(&self, list: &str, plan: &mut ActivationPlan) -> Result<()> {
        if list.is_empty() {
            return match self.mode {
                ParseMode::Lenient => Ok(()),
                ParseMode::Strict => Err(TesterError::MissingChannelList),
            };
        }

        let mut tokens: Vec<&str> = list.split(CHANNEL_SEPARATOR).collect();
        // "1,2," ends the list rather than naming an empty channel
        if tokens.len() > 1 && tokens.last() == Some(&"") {
            tokens.pop();
        }

        for token in tokens {
            let channel = match self.mode {
                ParseMode::Lenient => leading_int(token),
                ParseMode::Strict => token
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| TesterError::InvalidChannel(token.to_string()))?,
            };

            let in_range = channel >= 1 && channel <= self.channel_count as i64;
            if in_range {
                plan.activate((channel - 1) as usize);
                continue;
            }

            match self.mode {
                ParseMode::Lenient => warn!("ignoring channel token {:?}", token),
                ParseMode::Strict => {
                    return Err(TesterError::ChannelOutOfRange {
                        channel,
                        count: self.channel_count,
                    })
                }
            }
        }

        Ok(())
    }

    fn parse_duration(&self, token: &str, plan: &mut ActivationPlan) -> Result<()> {
        let value = match self.mode {
            ParseMode::Lenient => leading_int(token),
            ParseMode::Strict => token
                .trim()
                .parse::<i64>()
                .map_err(|_| TesterError::InvalidDuration(token.to_string()))?,
        };

        if value >= 1 && value <= self.max_duration as i64 {
            plan.duration_secs = value as u32;
            return Ok(());
        }

        match self.mode {
            ParseMode::Lenient => {
                warn!("ignoring duration {:?}, keeping {}s", token, plan.duration_secs);
                Ok(())
            }
            ParseMode::Strict => Err(TesterError::DurationOutOfRange {
                value,
                max: self.max_duration,
            }),
        }
    }
}

/// Integer prefix of a token: leading whitespace, an optional sign, then
/// digits up to the first non-digit. No digits gives 0.
fn leading_int(token: &str) -> i64 {
    let s = token.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add((d - b'0') as i64));

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient() -> CommandParser {
        CommandParser::new(NUM_CHANNELS, DEFAULT_TEST_DURATION, MAX_TEST_DURATION, ParseMode::Lenient)
    }

    fn strict() -> CommandParser {
        CommandParser::new(NUM_CHANNELS, DEFAULT_TEST_DURATION, MAX_TEST_DURATION, ParseMode::Strict)
    }

    #[test]
    fn test_timed_default_duration() {
        let cmd = lenient().parse("START:1,2").unwrap();
        assert_eq!(cmd.kind, TestKind::Timed);
        assert_eq!(cmd.plan.flags(), &[true, true]);
        assert_eq!(cmd.plan.duration_secs, 30);
    }

    #[test]
    fn test_timed_duration_override() {
        let cmd = lenient().parse("START:2:60").unwrap();
        assert_eq!(cmd.plan.flags(), &[false, true]);
        assert_eq!(cmd.plan.duration_secs, 60);
    }

    #[test]
    fn test_fulltest() {
        let cmd = lenient().parse("FULLTEST:1").unwrap();
        assert_eq!(cmd.kind, TestKind::FullDischarge);
        assert_eq!(cmd.plan.flags(), &[true, false]);
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let cmd = lenient().parse("  START: 1,2 :45\r\n").unwrap();
        assert_eq!(cmd.plan.flags(), &[true, true]);
        assert_eq!(cmd.plan.duration_secs, 45);
    }

    #[test]
    fn test_duration_bounds() {
        let parser = lenient();
        assert_eq!(parser.parse("START:1:1").unwrap().plan.duration_secs, 1);
        assert_eq!(parser.parse("START:1:3600").unwrap().plan.duration_secs, 3600);
        assert_eq!(parser.parse("START:1:0").unwrap().plan.duration_secs, 30);
        assert_eq!(parser.parse("START:1:3601").unwrap().plan.duration_secs, 30);
        assert_eq!(parser.parse("START:1:-5").unwrap().plan.duration_secs, 30);
        assert_eq!(parser.parse("START:1:abc").unwrap().plan.duration_secs, 30);
        assert_eq!(parser.parse("START:1:").unwrap().plan.duration_secs, 30);
    }

    #[test]
    fn test_bad_channels_dropped() {
        let parser = lenient();
        assert_eq!(parser.parse("START:0,3,x,2").unwrap().plan.flags(), &[false, true]);
        assert_eq!(parser.parse("START:-1").unwrap().plan.flags(), &[false, false]);
        assert_eq!(parser.parse("START:").unwrap().plan.flags(), &[false, false]);
    }

    #[test]
    fn test_duplicate_channels_idempotent() {
        let cmd = lenient().parse("START:1,1,1").unwrap();
        assert_eq!(cmd.plan.flags(), &[true, false]);
    }

    #[test]
    fn test_reparse_gives_same_plan() {
        let parser = lenient();
        let first = parser.parse("START:2:90").unwrap();
        let second = parser.parse("START:2:90").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_digit_prefix_accepted_when_lenient() {
        let cmd = lenient().parse("START:1a,2b:60s").unwrap();
        assert_eq!(cmd.plan.flags(), &[true, true]);
        assert_eq!(cmd.plan.duration_secs, 60);
    }

    #[test]
    fn test_unknown_prefix() {
        for line in ["FOO:1", "start:1", "START", "FULLTEST", ""] {
            assert!(matches!(lenient().parse(line), Err(TesterError::UnknownCommand(_))));
        }
    }

    #[test]
    fn test_strict_rejects_bad_tokens() {
        let parser = strict();
        assert!(matches!(parser.parse("START:"), Err(TesterError::MissingChannelList)));
        assert!(matches!(parser.parse("START:x"), Err(TesterError::InvalidChannel(_))));
        assert!(matches!(
            parser.parse("START:3"),
            Err(TesterError::ChannelOutOfRange { channel: 3, count: 2 })
        ));
        assert!(matches!(parser.parse("START:1:abc"), Err(TesterError::InvalidDuration(_))));
        assert!(matches!(
            parser.parse("START:1:4000"),
            Err(TesterError::DurationOutOfRange { value: 4000, .. })
        ));
    }

    #[test]
    fn test_strict_accepts_valid_lines() {
        let cmd = strict().parse("START:1,2:120").unwrap();
        assert_eq!(cmd.plan.flags(), &[true, true]);
        assert_eq!(cmd.plan.duration_secs, 120);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("42"), 42);
        assert_eq!(leading_int("  7x"), 7);
        assert_eq!(leading_int("-3"), -3);
        assert_eq!(leading_int("+9"), 9);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
        assert_eq!(leading_int("99999999999999999999999"), i64::MAX);
    }
}
