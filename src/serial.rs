//! Serial transport for the command console.

use crate::constants::*;
use crate::error::Result;
use serialport::SerialPort;
use std::io::BufReader;
use std::time::Duration;

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
    Ok(serialport::available_ports()?)
}

/// Open a port with the console's timeout
pub fn open_port(port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(port_name, baud_rate)
        .timeout(Duration::from_millis(TIMEOUT_MS))
        .open()?;
    Ok(port)
}

/// Line-oriented console over one serial port
pub struct SerialConsole {
    reader: BufReader<Box<dyn SerialPort>>,
    writer: Box<dyn SerialPort>,
}

impl SerialConsole {
    /// Open `port_name` at the default baud rate
    pub fn open(port_name: &str) -> Result<Self> {
        Self::with_baud_rate(port_name, BAUD_RATE)
    }

    pub fn with_baud_rate(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = open_port(port_name, baud_rate)?;
        let writer = port.try_clone()?;
        port.clear(serialport::ClearBuffer::Input)?;

        Ok(Self {
            reader: BufReader::new(port),
            writer,
        })
    }

    /// Borrow the read and write halves at once
    pub fn split(&mut self) -> (&mut BufReader<Box<dyn SerialPort>>, &mut Box<dyn SerialPort>) {
        (&mut self.reader, &mut self.writer)
    }
}
