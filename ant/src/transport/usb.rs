// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Bulk-transfer USB transport, for ANT sticks that enumerate as a USB device.

use std::time::Duration;

use log::{debug, info};
use rusb::{DeviceHandle, GlobalContext};

use crate::error::DriverError;
use crate::transport::Transport;

/// Dynastream/Garmin ANTUSB-m stick.
pub const USB_M_STICK: UsbId = UsbId {
    vendor_id: 0x0fcf,
    product_id: 0x1009,
};
/// Dynastream/Garmin ANTUSB2 stick.
pub const USB_2_STICK: UsbId = UsbId {
    vendor_id: 0x0fcf,
    product_id: 0x1008,
};

const WRITE_ENDPOINT: u8 = 0x01;
const READ_ENDPOINT: u8 = 0x81;
const READ_TIMEOUT: Duration = Duration::from_millis(200);
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsbId {
    pub vendor_id: u16,
    pub product_id: u16,
}

pub struct UsbDriver {
    id: UsbId,
    handle: Option<DeviceHandle<GlobalContext>>,
}

impl UsbDriver {
    pub fn new(id: UsbId) -> Self {
        UsbDriver { id, handle: None }
    }
}

impl Transport for UsbDriver {
    fn open(&mut self) -> Result<(), DriverError> {
        if self.handle.is_some() {
            return Ok(());
        }
        info!(
            "opening USB stick {:04x}:{:04x}",
            self.id.vendor_id, self.id.product_id
        );
        let mut handle = rusb::open_device_with_vid_pid(self.id.vendor_id, self.id.product_id)
            .ok_or(DriverError::NotOpen)?;
        handle.claim_interface(0)?;
        self.handle = Some(handle);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.release_interface(0);
            debug!(
                "closed USB stick {:04x}:{:04x}",
                self.id.vendor_id, self.id.product_id
            );
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DriverError> {
        let handle = self.handle.as_ref().ok_or(DriverError::NotOpen)?;
        match handle.read_bulk(READ_ENDPOINT, buf, READ_TIMEOUT) {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Ok(0),
            Err(e) => Err(DriverError::Usb(e)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), DriverError> {
        let handle = self.handle.as_ref().ok_or(DriverError::NotOpen)?;
        handle.write_bulk(WRITE_ENDPOINT, buf, WRITE_TIMEOUT)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_stick_ids() {
        assert_eq!(USB_M_STICK, UsbId { vendor_id: 0x0fcf, product_id: 0x1009 });
        assert_eq!(USB_2_STICK, UsbId { vendor_id: 0x0fcf, product_id: 0x1008 });
    }
}
