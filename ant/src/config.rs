// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Knobs for how a [`crate::node::Node`] finds and talks to its stick.

use std::path::PathBuf;

use crate::error::DriverError;
use crate::transport::Transport;

/// Which concrete transport a [`crate::node::Node`] should open.
pub enum TransportKind {
    /// A serial device at the given path, e.g. `/dev/ttyUSB0`.
    #[cfg(feature = "serial")]
    Serial(String),
    /// The first attached ANTUSB-m stick found.
    #[cfg(feature = "usb")]
    UsbStick1,
    /// The first attached ANTUSB2 stick found.
    #[cfg(feature = "usb")]
    UsbStick2,
}

impl TransportKind {
    pub(crate) fn open(self) -> Result<Box<dyn Transport>, DriverError> {
        match self {
            #[cfg(feature = "serial")]
            TransportKind::Serial(path) => {
                Ok(Box::new(crate::transport::serial::SerialDriver::new(path)))
            }
            #[cfg(feature = "usb")]
            TransportKind::UsbStick1 => Ok(Box::new(crate::transport::usb::UsbDriver::new(
                crate::transport::usb::USB_M_STICK,
            ))),
            #[cfg(feature = "usb")]
            TransportKind::UsbStick2 => Ok(Box::new(crate::transport::usb::UsbDriver::new(
                crate::transport::usb::USB_2_STICK,
            ))),
        }
    }
}

/// Configuration for [`crate::node::Node::new`]: which transport to open,
/// where (if anywhere) to mirror transport traffic, and whether to raise the
/// crate's logging verbosity.
pub struct NodeConfig {
    pub transport: TransportKind,
    /// If set, every transport open/close/read/write is appended to this
    /// file as an [`crate::log::EventLogWriter`] record.
    pub log_path: Option<PathBuf>,
    /// Raises the `log` crate's max level to `Debug` for the lifetime of the
    /// `Node` built from this config.
    pub debug: bool,
}

impl NodeConfig {
    pub fn new(transport: TransportKind) -> Self {
        NodeConfig {
            transport,
            log_path: None,
            debug: false,
        }
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
