//! Simulated bench for running the tester without hardware.
//!
//! Each channel holds a cell with a linear open-circuit voltage curve and a
//! fixed internal resistance. Closing a relay puts the load and the shunt in
//! series with the cell; charge is drawn whenever simulated time advances.

use crate::config::{Calibration, TesterConfig};
use crate::hal::{Clock, RelayDriver, Sampler};
use crate::types::{Channel, LineId};
use log::trace;
use std::cell::RefCell;
use std::rc::Rc;

/// Electrical model of one simulated cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellModel {
    /// Rated capacity in amp-hours
    pub capacity_ah: f32,
    /// Open-circuit voltage when full
    pub full_voltage: f32,
    /// Open-circuit voltage when empty
    pub empty_voltage: f32,
    pub internal_ohms: f32,
    /// Discharge load, excluding the shunt
    pub load_ohms: f32,
    /// Ground offset seen on the shunt low side
    pub ground_offset: f32,
}

impl Default for CellModel {
    fn default() -> Self {
        Self {
            capacity_ah: 0.1,
            full_voltage: 4.2,
            empty_voltage: 2.8,
            internal_ohms: 0.08,
            load_ohms: 4.0,
            ground_offset: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
struct SimCell {
    model: CellModel,
    drawn_ah: f32,
    relay_on: bool,
}

impl SimCell {
    fn state_of_charge(&self) -> f32 {
        (1.0 - self.drawn_ah / self.model.capacity_ah).clamp(0.0, 1.0)
    }

    fn open_circuit_voltage(&self) -> f32 {
        let m = &self.model;
        m.empty_voltage + (m.full_voltage - m.empty_voltage) * self.state_of_charge()
    }

    fn current(&self, shunt_ohms: f32) -> f32 {
        if !self.relay_on {
            return 0.0;
        }
        let m = &self.model;
        self.open_circuit_voltage() / (m.internal_ohms + m.load_ohms + shunt_ohms)
    }

    fn terminal_voltage(&self, shunt_ohms: f32) -> f32 {
        self.open_circuit_voltage() - self.current(shunt_ohms) * self.model.internal_ohms
    }
}

/// All three hardware traits on one simulated board
#[derive(Debug, Clone)]
pub struct SimulatedBench {
    channels: Vec<Channel>,
    cells: Vec<SimCell>,
    calibration: Calibration,
    now_us: u64,
    /// Simulated seconds per wall-clock second; 0 disables sleeping
    time_scale: f32,
}

impl SimulatedBench {
    pub fn new(config: &TesterConfig, model: CellModel) -> Self {
        let cells = config
            .channels
            .iter()
            .map(|_| SimCell {
                model,
                drawn_ah: 0.0,
                relay_on: false,
            })
            .collect();

        Self {
            channels: config.channels.clone(),
            cells,
            calibration: config.calibration,
            now_us: 0,
            time_scale: 0.0,
        }
    }

    /// Sleep for real, `scale` times faster than simulated time
    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale.max(0.0);
        self
    }

    /// Start a channel partly discharged
    pub fn set_state_of_charge(&mut self, index: usize, soc: f32) {
        if let Some(cell) = self.cells.get_mut(index) {
            cell.drawn_ah = cell.model.capacity_ah * (1.0 - soc.clamp(0.0, 1.0));
        }
    }

    pub fn state_of_charge(&self, index: usize) -> Option<f32> {
        self.cells.get(index).map(SimCell::state_of_charge)
    }

    pub fn drawn_ah(&self, index: usize) -> Option<f32> {
        self.cells.get(index).map(|c| c.drawn_ah)
    }

    /// Cloneable handle, so one bench can serve as sampler, relays and clock
    pub fn shared(self) -> SharedBench {
        SharedBench(Rc::new(RefCell::new(self)))
    }

    fn advance(&mut self, us: u64) {
        let hours = us as f32 / 3.6e9;
        let shunt = self.calibration.shunt_ohms;
        for cell in self.cells.iter_mut().filter(|c| c.relay_on) {
            cell.drawn_ah += cell.current(shunt) * hours;
        }
        self.now_us = self.now_us.saturating_add(us);

        if self.time_scale > 0.0 {
            let real_us = (us as f64 / self.time_scale as f64) as u64;
            std::thread::sleep(std::time::Duration::from_micros(real_us));
        }
    }

    fn line_voltage(&self, line: LineId) -> f32 {
        let shunt = self.calibration.shunt_ohms;
        for (channel, cell) in self.channels.iter().zip(&self.cells) {
            let offset = cell.model.ground_offset;
            if line == channel.loaded_voltage || line == channel.unloaded_voltage {
                return cell.terminal_voltage(shunt);
            }
            if line == channel.shunt_high {
                return offset + cell.current(shunt) * shunt;
            }
            if line == channel.shunt_low {
                return offset;
            }
        }
        0.0
    }
}

impl Sampler for SimulatedBench {
    fn read(&mut self, line: LineId) -> u16 {
        let counts = self.calibration.to_counts(self.line_voltage(line));
        trace!("sim read line {} -> {}", line, counts);
        counts
    }
}

impl RelayDriver for SimulatedBench {
    fn set_relay(&mut self, line: LineId, on: bool) {
        for (channel, cell) in self.channels.iter().zip(self.cells.iter_mut()) {
            if channel.relay == line {
                cell.relay_on = on;
            }
        }
    }
}

impl Clock for SimulatedBench {
    fn now_ms(&self) -> u64 {
        self.now_us / 1000
    }

    fn delay_ms(&mut self, ms: u64) {
        self.advance(ms.saturating_mul(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance(us as u64);
    }
}

/// Shared handle to a [`SimulatedBench`]
#[derive(Debug, Clone)]
pub struct SharedBench(Rc<RefCell<SimulatedBench>>);

impl SharedBench {
    pub fn state_of_charge(&self, index: usize) -> Option<f32> {
        self.0.borrow().state_of_charge(index)
    }

    pub fn set_state_of_charge(&self, index: usize, soc: f32) {
        self.0.borrow_mut().set_state_of_charge(index, soc)
    }
}

impl Sampler for SharedBench {
    fn read(&mut self, line: LineId) -> u16 {
        self.0.borrow_mut().read(line)
    }
}

impl RelayDriver for SharedBench {
    fn set_relay(&mut self, line: LineId, on: bool) {
        self.0.borrow_mut().set_relay(line, on)
    }
}

impl Clock for SharedBench {
    fn now_ms(&self) -> u64 {
        self.0.borrow().now_ms()
    }

    fn delay_ms(&mut self, ms: u64) {
        self.0.borrow_mut().delay_ms(ms)
    }

    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().delay_us(us)
    }
}
