// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Crate-wide error taxonomy.

use thiserror::Error;

/// Codec-level failures: framing, checksum, and field-range violations.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("payload too long (max 9 bytes)")]
    PayloadTooLong,
    #[error("message type out of range (0-255)")]
    TypeOutOfRange,
    #[error("message buffer incomplete")]
    Incomplete,
    #[error("expected sync byte 0xA4")]
    BadSync,
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("unknown message type 0x{0:02X}")]
    UnknownType(u8),
    #[error("field value out of range")]
    FieldOutOfRange,
    #[error("declared payload length out of range")]
    BadLength,
}

/// Failures from [`crate::node::Node`] lifecycle and lookup operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NodeError {
    #[error("node already started")]
    AlreadyStarted,
    #[error("node not started")]
    NotStarted,
    #[error("no network key with that name")]
    NotFound,
    #[error("no free channel available")]
    NoFreeChannel,
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Failures from a [`crate::channel::Channel`] state transition, carrying the
/// stick's response code when one was involved.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChannelError {
    #[error("could not assign channel (response code 0x{0:02X})")]
    Assign(u8),
    #[error("could not unassign channel (response code 0x{0:02X})")]
    Unassign(u8),
    #[error("could not open channel (response code 0x{0:02X})")]
    Open(u8),
    #[error("could not close channel (response code 0x{0:02X})")]
    Close(u8),
    #[error("could not set channel parameter (response code 0x{0:02X})")]
    Param(u8),
    #[error("channel is not in a valid state for this operation")]
    WrongState,
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Failures from the [`crate::event_machine::EventMachine`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    #[error("event machine already started")]
    AlreadyStarted,
    #[error("timed out waiting for a response")]
    Timeout,
    #[error("event machine is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Failures raised by a [`crate::transport::Transport`] implementation.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("transport is not open")]
    NotOpen,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "usb")]
    #[error(transparent)]
    Usb(#[from] rusb::Error),
}

impl Clone for DriverError {
    fn clone(&self) -> Self {
        match self {
            DriverError::NotOpen => DriverError::NotOpen,
            DriverError::Io(e) => DriverError::Io(std::io::Error::new(e.kind(), e.to_string())),
            #[cfg(feature = "usb")]
            DriverError::Usb(e) => DriverError::Usb(*e),
        }
    }
}

impl PartialEq for DriverError {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
impl Eq for DriverError {}

/// Raised by user-supplied subscriber callbacks; always swallowed by the
/// dispatcher, never propagated to the reader thread's caller.
#[derive(Error, Debug)]
#[error("subscriber callback failed: {0}")]
pub struct CallbackError(pub String);

/// Failures reading or writing an [`crate::log::EventLogWriter`]/[`crate::log::EventLogReader`] file.
#[derive(Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("log file has an unrecognized header")]
    BadFormat,
    #[error(transparent)]
    Encode(#[from] rmp::encode::ValueWriteError),
}
