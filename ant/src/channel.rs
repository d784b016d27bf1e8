// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A single ANT channel and its state machine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;

use crate::constants::{MessageId, EVENT_CHANNEL_CLOSED, RESPONSE_NO_ERROR};
use crate::error::ChannelError;
use crate::event_machine::{CallbackHandle, EventMachine};
use crate::message::{
    ChannelAssign, ChannelClose, ChannelFrequency, ChannelId, ChannelOpen, ChannelPeriod,
    ChannelSearchTimeout, ChannelStatus, ChannelTxPower, ChannelUnassign, TypedMessage,
};

/// Where a [`Channel`] sits in the assign/open lifecycle. Mirrors the status
/// byte the stick itself reports via `ChannelStatus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// Allocated on the host but not yet assigned on the stick.
    Free,
    Assigned,
    Open,
    /// Close was requested; waiting for the `EVENT_CHANNEL_CLOSED` event.
    Closing,
}

/// A single logical ANT channel. Not cloneable: it owns the only handle to
/// its slot, obtained via [`crate::node::Node::get_free_channel`].
pub struct Channel {
    number: u8,
    events: Arc<EventMachine>,
    timeout: Duration,
    state: Mutex<ChannelState>,
}

impl Channel {
    pub(crate) fn new(number: u8, events: Arc<EventMachine>, timeout: Duration) -> Self {
        Channel {
            number,
            events,
            timeout,
            state: Mutex::new(ChannelState::Free),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    fn send_and_check(&self, msg: crate::message::Message, on_err: impl Fn(u8) -> ChannelError) -> Result<(), ChannelError> {
        let ack = self
            .events
            .send_and_wait_for_ack(&msg, Some(self.number), self.timeout)?;
        if ack.msg_code != RESPONSE_NO_ERROR {
            return Err(on_err(ack.msg_code));
        }
        Ok(())
    }

    /// Assigns this channel a type and a network key slot.
    pub fn assign(&self, channel_type: u8, network: u8) -> Result<(), ChannelError> {
        let msg = ChannelAssign {
            channel: self.number,
            channel_type,
            network,
        }
        .to_message();
        self.send_and_check(msg, ChannelError::Assign)?;
        *self.state.lock().unwrap() = ChannelState::Assigned;
        debug!("channel {} assigned (type 0x{channel_type:02X})", self.number);
        Ok(())
    }

    pub fn unassign(&self) -> Result<(), ChannelError> {
        let msg = ChannelUnassign { channel: self.number }.to_message();
        self.send_and_check(msg, ChannelError::Unassign)?;
        *self.state.lock().unwrap() = ChannelState::Free;
        Ok(())
    }

    /// Sets the ANT ID this channel will search for (slave) or transmit as
    /// (master).
    pub fn set_id(
        &self,
        device_number: u16,
        device_type: u8,
        transmission_type: u8,
    ) -> Result<(), ChannelError> {
        let msg = ChannelId {
            channel: self.number,
            device_number,
            device_type,
            transmission_type,
        }
        .to_message();
        self.send_and_check(msg, ChannelError::Param)
    }

    pub fn set_period(&self, period: u16) -> Result<(), ChannelError> {
        let msg = ChannelPeriod {
            channel: self.number,
            period,
        }
        .to_message();
        self.send_and_check(msg, ChannelError::Param)
    }

    pub fn set_search_timeout(&self, timeout: u8) -> Result<(), ChannelError> {
        let msg = ChannelSearchTimeout {
            channel: self.number,
            timeout,
        }
        .to_message();
        self.send_and_check(msg, ChannelError::Param)
    }

    pub fn set_frequency(&self, frequency: u8) -> Result<(), ChannelError> {
        let msg = ChannelFrequency {
            channel: self.number,
            frequency,
        }
        .to_message();
        self.send_and_check(msg, ChannelError::Param)
    }

    pub fn set_tx_power(&self, power: u8) -> Result<(), ChannelError> {
        let msg = ChannelTxPower {
            channel: self.number,
            power,
        }
        .to_message();
        self.send_and_check(msg, ChannelError::Param)
    }

    /// Opens the channel. Transitions straight to `Open`; the ANT layer's own
    /// search/tracking distinction isn't surfaced in `ChannelState`.
    pub fn open(&self) -> Result<(), ChannelError> {
        let msg = ChannelOpen { channel: self.number }.to_message();
        self.send_and_check(msg, ChannelError::Open)?;
        *self.state.lock().unwrap() = ChannelState::Open;
        Ok(())
    }

    /// Requests a close and blocks until the stick confirms the channel has
    /// actually closed (`EVENT_CHANNEL_CLOSED`), not just that the close
    /// command was accepted. Any other `ChannelEvent` seen on this channel in
    /// the meantime (e.g. an `RX_FAIL_GO_TO_SEARCH` racing the close) is
    /// discarded and waited past rather than treated as a failure.
    pub fn close(&self) -> Result<(), ChannelError> {
        *self.state.lock().unwrap() = ChannelState::Closing;
        let msg = ChannelClose { channel: self.number }.to_message();
        self.send_and_check(msg, ChannelError::Close)?;

        loop {
            let event = self
                .events
                .wait_for_message(MessageId::ChannelEvent, Some(self.number), self.timeout)?;
            if let TypedMessage::ChannelEvent(ev) = event {
                if ev.channel == self.number && ev.msg_code == EVENT_CHANNEL_CLOSED {
                    break;
                }
            }
        }
        *self.state.lock().unwrap() = ChannelState::Assigned;
        Ok(())
    }

    /// Requests the stick report this channel's current status.
    pub fn request_status(&self) -> Result<ChannelStatus, ChannelError> {
        let request = crate::message::ChannelRequest {
            channel: self.number,
            requested_msg_id: MessageId::ChannelStatus.as_u8(),
        };
        self.events.send(&request.to_message())?;
        match self
            .events
            .wait_for_message(MessageId::ChannelStatus, Some(self.number), self.timeout)?
        {
            TypedMessage::ChannelStatus(status) => Ok(status),
            _ => unreachable!("wait_for_message only returns the requested type"),
        }
    }

    /// Registers a callback invoked for every inbound message scoped to this
    /// channel (broadcast/acknowledged/burst data, channel events, etc).
    pub fn register_callback(
        &self,
        callback: impl FnMut(&TypedMessage) + Send + 'static,
    ) -> CallbackHandle {
        self.events.register_callback(Some(self.number), callback)
    }

    pub fn remove_callback(&self, handle: CallbackHandle) {
        self.events.remove_callback(handle);
    }
}
