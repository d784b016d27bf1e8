// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The top-level handle to a connected ANT stick.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;
use uuid::Uuid;

use crate::channel::Channel;
use crate::config::NodeConfig;
use crate::error::{EventError, NodeError};
use crate::event_machine::{CallbackHandle, EventMachine, DEFAULT_TIMEOUT};
use crate::message::{Capabilities, ChannelRequest, NetworkKeyMsg, SystemReset, TypedMessage};

/// Unconditional settle time after a `SystemReset`. Some firmwares never
/// acknowledge the reset at all, so this is a fixed sleep rather than a wait
/// for any particular reply.
const RESET_SETTLE: Duration = Duration::from_secs(1);

/// A network key slot: the shared key a set of channels agree on, the human-
/// readable name it was registered under, and the slot index it lives in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkKey {
    pub number: u8,
    pub name: String,
    pub key: [u8; 8],
}

impl NetworkKey {
    pub fn new(number: u8, name: impl Into<String>, key: [u8; 8]) -> Self {
        NetworkKey {
            number,
            name: name.into(),
            key,
        }
    }
}

impl Default for NetworkKey {
    /// A key with a random name and the all-zero ("public") key value, same
    /// default ANT sticks ship with on slot 0.
    fn default() -> Self {
        NetworkKey {
            number: 0,
            name: Uuid::new_v4().to_string(),
            key: [0u8; 8],
        }
    }
}

/// Owns the event machine and the stick-wide state: network keys and channel
/// allocation. Individual channels are obtained via [`Node::get_free_channel`]
/// and operated on independently.
pub struct Node {
    events: Arc<EventMachine>,
    timeout: Duration,
    started: Mutex<bool>,
    capabilities: Mutex<Option<Capabilities>>,
    networks: Mutex<Vec<NetworkKey>>,
    channels_assigned: Mutex<Vec<bool>>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        if config.debug {
            log::set_max_level(log::LevelFilter::Debug);
        }
        let transport = config
            .transport
            .open()
            .map_err(|e| NodeError::Event(EventError::Driver(e)))?;
        let log_sink = match &config.log_path {
            Some(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| NodeError::Event(EventError::Driver(crate::error::DriverError::Io(e))))?;
                Some(Box::new(file) as Box<dyn std::io::Write + Send>)
            }
            None => None,
        };
        Ok(Node {
            events: Arc::new(EventMachine::with_log(transport, log_sink)),
            timeout: DEFAULT_TIMEOUT,
            started: Mutex::new(false),
            capabilities: Mutex::new(None),
            networks: Mutex::new(Vec::new()),
            channels_assigned: Mutex::new(Vec::new()),
        })
    }

    /// Builds a `Node` around an already-constructed transport, bypassing
    /// [`crate::config::TransportKind`] and event logging. Mainly useful for
    /// testing against a scripted in-memory transport.
    pub fn with_transport(
        transport: Box<dyn crate::transport::Transport>,
        timeout: Duration,
    ) -> Self {
        Node {
            events: Arc::new(EventMachine::new(transport)),
            timeout,
            started: Mutex::new(false),
            capabilities: Mutex::new(None),
            networks: Mutex::new(Vec::new()),
            channels_assigned: Mutex::new(Vec::new()),
        }
    }

    /// Starts the reader thread, resets the stick, queries its capabilities,
    /// and pushes a default (zero-key) `NetworkKey` to every network slot the
    /// stick reports. Must be called before any other operation.
    pub fn start(&self) -> Result<(), NodeError> {
        let mut started = self.started.lock().unwrap();
        if *started {
            return Err(NodeError::AlreadyStarted);
        }

        self.events.start().map_err(NodeError::Event)?;
        self.reset()?;
        let caps = self.fetch_capabilities()?;
        *self.channels_assigned.lock().unwrap() = vec![false; caps.max_channels as usize];
        *self.networks.lock().unwrap() = (0..caps.max_networks)
            .map(|number| NetworkKey {
                number,
                ..NetworkKey::default()
            })
            .collect();
        *self.capabilities.lock().unwrap() = Some(caps);
        *started = true;
        drop(started);

        for slot in 0..caps.max_networks {
            self.set_network_key(slot, None)?;
        }

        info!(
            "node started: {} channels, {} networks",
            caps.max_channels, caps.max_networks
        );
        Ok(())
    }

    /// Stops the reader thread and closes the transport. Fails with
    /// [`NodeError::NotStarted`] if the node isn't running. If `reset` is
    /// true, issues a `SystemReset` and settles for a second before tearing
    /// the event machine down.
    pub fn stop(&self, reset: bool) -> Result<(), NodeError> {
        let mut started = self.started.lock().unwrap();
        if !*started {
            return Err(NodeError::NotStarted);
        }
        if reset {
            self.events
                .send(&SystemReset.to_message())
                .map_err(NodeError::Event)?;
            std::thread::sleep(RESET_SETTLE);
        }
        self.events.stop().map_err(NodeError::Event)?;
        *started = false;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        *self.started.lock().unwrap()
    }

    /// Handle to the underlying event machine, for registering raw
    /// subscriber callbacks not scoped to any one channel.
    pub fn events(&self) -> Arc<EventMachine> {
        Arc::clone(&self.events)
    }

    pub fn register_event_listener(
        &self,
        callback: impl FnMut(&TypedMessage) + Send + 'static,
    ) -> CallbackHandle {
        self.events.register_callback(None, callback)
    }

    /// Issues `SystemReset` and settles for a fixed second. Some firmwares
    /// never emit an acknowledgement for a reset, so this does not wait for
    /// one; blocking on a reply here would spuriously time out `start()`
    /// against those sticks.
    fn reset(&self) -> Result<(), NodeError> {
        self.events
            .send(&SystemReset.to_message())
            .map_err(NodeError::Event)?;
        std::thread::sleep(RESET_SETTLE);
        Ok(())
    }

    fn fetch_capabilities(&self) -> Result<Capabilities, NodeError> {
        let request = ChannelRequest {
            channel: 0,
            requested_msg_id: crate::constants::MessageId::Capabilities.as_u8(),
        };
        self.events
            .send(&request.to_message())
            .map_err(NodeError::Event)?;
        let reply = self
            .events
            .wait_for_message(crate::constants::MessageId::Capabilities, None, self.timeout)
            .map_err(NodeError::Event)?;
        match reply {
            TypedMessage::Capabilities(caps) => Ok(caps),
            _ => unreachable!("wait_for_message only returns the requested type"),
        }
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        *self.capabilities.lock().unwrap()
    }

    /// Pushes a key to an explicit network slot. If `key` is `None`, the
    /// slot's current key material is re-sent unchanged (used by `start()` to
    /// bootstrap every slot to its default zero key). Fails with
    /// [`NodeError::NotFound`] if `slot` is outside the stick's reported
    /// network count.
    pub fn set_network_key(&self, slot: u8, key: Option<[u8; 8]>) -> Result<(), NodeError> {
        if !self.is_started() {
            return Err(NodeError::NotStarted);
        }
        let caps = self.capabilities.lock().unwrap().ok_or(NodeError::NotStarted)?;
        if slot >= caps.max_networks {
            return Err(NodeError::NotFound);
        }
        let mut networks = self.networks.lock().unwrap();
        let idx = slot as usize;
        let material = key.unwrap_or(networks[idx].key);
        let msg = NetworkKeyMsg { slot, key: material };
        self.events
            .send_and_wait_for_ack(&msg.to_message(), None, self.timeout)
            .map_err(NodeError::Event)?;
        networks[idx] = NetworkKey {
            number: slot,
            name: networks[idx].name.clone(),
            key: material,
        };
        Ok(())
    }

    pub fn get_network_key(&self, name: &str) -> Result<NetworkKey, NodeError> {
        self.networks
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.name == name)
            .cloned()
            .ok_or(NodeError::NotFound)
    }

    /// Allocates the lowest-numbered unassigned channel.
    pub fn get_free_channel(&self) -> Result<Channel, NodeError> {
        if !self.is_started() {
            return Err(NodeError::NotStarted);
        }
        let mut assigned = self.channels_assigned.lock().unwrap();
        let number = assigned
            .iter()
            .position(|a| !a)
            .ok_or(NodeError::NoFreeChannel)?;
        assigned[number] = true;
        Ok(Channel::new(number as u8, Arc::clone(&self.events), self.timeout))
    }
}
