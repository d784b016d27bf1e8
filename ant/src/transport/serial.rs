// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Serial-port transport, for ANT sticks that enumerate as a UART.

use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;

use crate::error::DriverError;
use crate::transport::Transport;

/// Baud rate fixed by the ANT message protocol for all known sticks.
const ANT_BAUD_RATE: u32 = 57600;

/// How long a single `read` call blocks before giving up and returning 0
/// bytes. Keeps the event machine's reader thread responsive to `stop()`.
const READ_TIMEOUT: Duration = Duration::from_millis(200);

pub struct SerialDriver {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialDriver {
    pub fn new(path: impl Into<String>) -> Self {
        SerialDriver {
            path: path.into(),
            port: None,
        }
    }
}

impl Transport for SerialDriver {
    fn open(&mut self) -> Result<(), DriverError> {
        if self.port.is_some() {
            return Ok(());
        }
        info!("opening serial port {}", self.path);
        let port = serialport::new(&self.path, ANT_BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| DriverError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.port.take().is_some() {
            debug!("closed serial port {}", self.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DriverError> {
        let port = self.port.as_mut().ok_or(DriverError::NotOpen)?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(DriverError::Io(e)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), DriverError> {
        let port = self.port.as_mut().ok_or(DriverError::NotOpen)?;
        port.write_all(buf).map_err(DriverError::Io)
    }
}
