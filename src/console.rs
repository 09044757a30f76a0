//! Command-wait loop.
//!
//! [`Tester`] owns the controller and turns incoming lines into test runs.
//! Tests block the loop until they finish; lines that arrive meanwhile are
//! read afterwards.

use crate::command::CommandParser;
use crate::config::TesterConfig;
use crate::controller::{emit, CancelFlag, TestController};
use crate::error::{Result, TesterError};
use crate::hal::{Clock, RelayDriver, Sampler};
use crate::report::{banner, ControlLine};
use crate::types::{ParseMode, TestSummary};
use log::{debug, info, warn};
use std::io::{BufRead, ErrorKind, Write};

/// Command interpreter bound to one bench
pub struct Tester<S, R, C> {
    controller: TestController<S, R, C>,
    parser: CommandParser,
    duration_secs: u32,
}

impl<S, R, C> Tester<S, R, C>
where
    S: Sampler,
    R: RelayDriver,
    C: Clock,
{
    pub fn new(config: TesterConfig, sampler: S, relays: R, clock: C) -> Result<Self> {
        config.validate()?;
        let parser = CommandParser::new(
            config.channels.len(),
            config.default_duration_secs,
            config.max_duration_secs,
            config.parse_mode,
        );

        Ok(Self {
            controller: TestController::new(&config, sampler, relays, clock),
            parser,
            duration_secs: config.default_duration_secs,
        })
    }

    pub fn controller(&self) -> &TestController<S, R, C> {
        &self.controller
    }

    /// Duration applied by the last accepted command
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn set_cancel_flag(&mut self, flag: CancelFlag) {
        self.controller.set_cancel_flag(flag);
    }

    /// Open all relays and print the banner
    pub fn start<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.controller.release_all();

        let first_line = self.controller.channels().channel(0).map(|c| c.loaded_voltage);
        let first_voltage = match first_line {
            Some(line) => self.controller.read_raw_volts(line),
            None => 0.0,
        };

        for line in banner(first_voltage) {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Interpret one line and run the requested test to completion.
    ///
    /// Unknown lines change nothing. Returns the summary if a test ran.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Option<TestSummary> {
        let command = match self.parser.parse(line) {
            Ok(command) => command,
            Err(TesterError::UnknownCommand(line)) => {
                if !line.is_empty() {
                    debug!("ignoring line {:?}", line);
                }
                return None;
            }
            Err(e) => {
                if self.parser.mode() == ParseMode::Strict {
                    emit(out, ControlLine::Error(e.to_string()));
                }
                return None;
            }
        };

        self.controller.channels_mut().apply(&command.plan);
        self.duration_secs = command.plan.duration_secs;

        let summary = self.controller.run(command.kind, self.duration_secs, out);
        match serde_json::to_string(&summary) {
            Ok(json) => info!("test summary: {}", json),
            Err(e) => warn!("could not encode test summary: {}", e),
        }
        Some(summary)
    }

    /// Read commands until end of input.
    ///
    /// Read timeouts are treated as "no command yet" so this works on a
    /// serial port with a read timeout. Bytes that are not UTF-8 are decoded
    /// lossily, so line noise ends up as an unknown command.
    pub fn run<B: BufRead, W: Write>(&mut self, input: &mut B, out: &mut W) -> Result<Vec<TestSummary>> {
        let mut summaries = Vec::new();
        let mut buf = Vec::new();

        loop {
            match input.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) if buf.ends_with(b"\n") => {
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    if let Some(summary) = self.handle_line(&line, out) {
                        summaries.push(summary);
                    }
                }
                Ok(_) => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if !buf.is_empty() {
            let line = String::from_utf8_lossy(&buf).into_owned();
            if let Some(summary) = self.handle_line(&line, out) {
                summaries.push(summary);
            }
        }

        Ok(summaries)
    }
}
