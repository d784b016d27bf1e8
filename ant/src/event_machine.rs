// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Background reader thread, response correlation, and subscriber dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{trace, warn};

use crate::constants::MessageId;
use crate::error::{DriverError, EventError};
use crate::log::EventLogWriter;
use crate::message::{Message, TypedMessage};
use crate::transport::Transport;

/// Default time a `wait_for_*` call blocks before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Opaque handle to a registered subscriber callback, returned so it can
/// later be passed to [`EventMachine::remove_callback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

type Callback = Box<dyn FnMut(&TypedMessage) + Send>;
type LogSink = EventLogWriter<Box<dyn std::io::Write + Send>>;

/// What a waiter is blocked on: either a specific message type, or
/// specifically the channel-event acknowledgement for a message type just
/// sent out (`msg_id` matches the outbound message's own type byte). Both
/// carry the channel the operation is scoped to, if any — `None` means the
/// wait is node-global (e.g. `Capabilities`, a `NetworkKey` push) and matches
/// an inbound message regardless of the channel it reports. Without this,
/// two channels running the same kind of operation concurrently (two
/// `assign()`s, two `close()`s) would collide on a single map entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum WaitKey {
    Message(u8, Option<u8>),
    Ack(u8, Option<u8>),
}

enum WaitSlot {
    Pending,
    Ready(TypedMessage),
}

struct Shared {
    waiters: Mutex<HashMap<WaitKey, WaitSlot>>,
    condvar: Condvar,
    subscribers: Mutex<HashMap<u64, (Option<u8>, Callback)>>,
    next_handle: Mutex<u64>,
    running: Mutex<bool>,
}

/// Owns the reader thread and the transport's write half. Messages decoded
/// off the wire are either handed to a blocked waiter (if one is registered
/// for that message) or fanned out to subscriber callbacks; a message can do
/// both.
pub struct EventMachine {
    shared: Arc<Shared>,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    log: Arc<Mutex<Option<LogSink>>>,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl EventMachine {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_log(transport, None)
    }

    /// Builds an event machine that also mirrors every transport-level open,
    /// close, read, and write to `log`, if supplied.
    pub fn with_log(transport: Box<dyn Transport>, log: Option<Box<dyn std::io::Write + Send>>) -> Self {
        EventMachine {
            shared: Arc::new(Shared {
                waiters: Mutex::new(HashMap::new()),
                condvar: Condvar::new(),
                subscribers: Mutex::new(HashMap::new()),
                next_handle: Mutex::new(0),
                running: Mutex::new(false),
            }),
            transport: Arc::new(Mutex::new(transport)),
            reader: Mutex::new(None),
            log: Arc::new(Mutex::new(log.map(EventLogWriter::new))),
        }
    }

    /// Opens the transport and spawns the reader thread. No-op if already
    /// started.
    ///
    /// Takes `&self`, not `&mut self`: `Node` and every `Channel` it hands out
    /// share one `EventMachine` behind an `Arc`, so mutation here has to go
    /// through interior mutability rather than unique ownership.
    pub fn start(&self) -> Result<(), EventError> {
        let mut running = self.shared.running.lock().unwrap();
        if *running {
            return Err(EventError::AlreadyStarted);
        }
        self.transport
            .lock()
            .unwrap()
            .open()
            .map_err(EventError::Driver)?;
        *running = true;
        drop(running);

        if let Some(writer) = self.log.lock().unwrap().as_mut() {
            if let Err(e) = writer.log_open(now()) {
                warn!("event log write failed: {e}");
            }
        }

        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let log = Arc::clone(&self.log);
        *self.reader.lock().unwrap() =
            Some(std::thread::spawn(move || reader_loop(shared, transport, log)));
        Ok(())
    }

    /// Stops the reader thread and closes the transport. Wakes every blocked
    /// waiter with [`EventError::ShuttingDown`].
    pub fn stop(&self) -> Result<(), EventError> {
        {
            let mut running = self.shared.running.lock().unwrap();
            if !*running {
                return Ok(());
            }
            *running = false;
        }
        self.shared.condvar.notify_all();
        if let Some(handle) = self.reader.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(writer) = self.log.lock().unwrap().as_mut() {
            if let Err(e) = writer.log_close(now()) {
                warn!("event log write failed: {e}");
            }
            let _ = writer.flush();
        }
        self.transport
            .lock()
            .unwrap()
            .close()
            .map_err(EventError::Driver)?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.lock().unwrap()
    }

    /// Encodes and writes `msg` to the transport. Serialized against other
    /// writers by the transport's own mutex.
    pub fn send(&self, msg: &Message) -> Result<(), EventError> {
        if !self.is_running() {
            return Err(EventError::ShuttingDown);
        }
        let encoded = msg.encode();
        self.transport
            .lock()
            .unwrap()
            .write(&encoded)
            .map_err(EventError::Driver)?;
        if let Some(writer) = self.log.lock().unwrap().as_mut() {
            if let Err(e) = writer.log_write(now(), &encoded) {
                warn!("event log write failed: {e}");
            }
        }
        Ok(())
    }

    /// Sends `msg` then blocks until the matching `ChannelEvent` response
    /// (`msg_id == msg.msg_type()`) arrives, or `timeout` elapses. `channel`
    /// scopes the wait to a specific channel number so two channels issuing
    /// the same kind of command concurrently don't correlate each other's
    /// acks; pass `None` for node-global commands (e.g. a `NetworkKey` push).
    pub fn send_and_wait_for_ack(
        &self,
        msg: &Message,
        channel: Option<u8>,
        timeout: Duration,
    ) -> Result<crate::message::ChannelEvent, EventError> {
        let key = WaitKey::Ack(msg.msg_type(), channel);
        self.register_wait(key);
        if let Err(e) = self.send(msg) {
            self.abandon_wait(key);
            return Err(e);
        }
        match self.block_on_wait(key, timeout)? {
            TypedMessage::ChannelEvent(ev) => Ok(ev),
            _ => unreachable!("only ChannelEvent is ever stored under WaitKey::Ack"),
        }
    }

    /// Blocks until a message of type `msg_id` arrives, or `timeout` elapses.
    /// Does not send anything first; pair with `send` for request/response
    /// message types that are not `ChannelEvent` acks (e.g. `Capabilities`).
    /// `channel` scopes the wait the same way as [`Self::send_and_wait_for_ack`].
    pub fn wait_for_message(
        &self,
        msg_id: MessageId,
        channel: Option<u8>,
        timeout: Duration,
    ) -> Result<TypedMessage, EventError> {
        let key = WaitKey::Message(msg_id.as_u8(), channel);
        self.register_wait(key);
        self.block_on_wait(key, timeout)
    }

    fn register_wait(&self, key: WaitKey) {
        self.shared
            .waiters
            .lock()
            .unwrap()
            .insert(key, WaitSlot::Pending);
    }

    fn abandon_wait(&self, key: WaitKey) {
        self.shared.waiters.lock().unwrap().remove(&key);
    }

    fn block_on_wait(&self, key: WaitKey, timeout: Duration) -> Result<TypedMessage, EventError> {
        let deadline = Instant::now() + timeout;
        let mut waiters = self.shared.waiters.lock().unwrap();
        loop {
            match waiters.get(&key) {
                Some(WaitSlot::Ready(_)) => match waiters.remove(&key) {
                    Some(WaitSlot::Ready(msg)) => return Ok(msg),
                    _ => unreachable!(),
                },
                Some(WaitSlot::Pending) => {}
                None => return Err(EventError::ShuttingDown),
            }
            if !*self.shared.running.lock().unwrap() {
                waiters.remove(&key);
                return Err(EventError::ShuttingDown);
            }
            let now = Instant::now();
            if now >= deadline {
                waiters.remove(&key);
                return Err(EventError::Timeout);
            }
            let (guard, _) = self
                .shared
                .condvar
                .wait_timeout(waiters, deadline - now)
                .unwrap();
            waiters = guard;
        }
    }

    /// Registers a callback invoked for every inbound message, or (if
    /// `channel` is `Some`) only for messages scoped to that channel number.
    pub fn register_callback(
        &self,
        channel: Option<u8>,
        callback: impl FnMut(&TypedMessage) + Send + 'static,
    ) -> CallbackHandle {
        let mut next = self.shared.next_handle.lock().unwrap();
        let id = *next;
        *next += 1;
        drop(next);
        self.shared
            .subscribers
            .lock()
            .unwrap()
            .insert(id, (channel, Box::new(callback)));
        CallbackHandle(id)
    }

    pub fn remove_callback(&self, handle: CallbackHandle) {
        self.shared.subscribers.lock().unwrap().remove(&handle.0);
    }
}

impl Drop for EventMachine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn reader_loop(shared: Arc<Shared>, transport: Arc<Mutex<Box<dyn Transport>>>, log: Arc<Mutex<Option<LogSink>>>) {
    let mut buf = [0u8; 256];
    let mut pending: Vec<u8> = Vec::new();

    while *shared.running.lock().unwrap() {
        let n = {
            let mut transport = transport.lock().unwrap();
            match transport.read(&mut buf) {
                Ok(n) => n,
                Err(DriverError::NotOpen) => break,
                Err(e) => {
                    warn!("transport read error: {e}");
                    0
                }
            }
        };
        if n == 0 {
            continue;
        }
        if let Some(writer) = log.lock().unwrap().as_mut() {
            if let Err(e) = writer.log_read(now(), &buf[..n]) {
                warn!("event log write failed: {e}");
            }
        }
        pending.extend_from_slice(&buf[..n]);
        drain_frames(&shared, &mut pending);
    }
}

/// Pulls complete frames off the front of `pending`, dispatching each.
/// On a framing error, drops one byte and retries — resynchronizing on the
/// next `SYNC` byte already present in the buffer.
fn drain_frames(shared: &Arc<Shared>, pending: &mut Vec<u8>) {
    loop {
        if pending.is_empty() {
            return;
        }
        let mut msg = Message::new();
        match msg.decode(pending) {
            Ok(consumed) => {
                pending.drain(..consumed);
                match msg.to_typed(None) {
                    Ok(typed) => dispatch(shared, typed),
                    Err(e) => trace!("dropping message with unknown type: {e}"),
                }
            }
            Err(crate::error::MessageError::Incomplete) => return,
            Err(e) => {
                trace!("resyncing after framing error: {e}");
                pending.remove(0);
            }
        }
    }
}

fn dispatch(shared: &Arc<Shared>, typed: TypedMessage) {
    let channel = typed.channel_number();

    let mut waiters = shared.waiters.lock().unwrap();
    let mut woke = false;
    if let TypedMessage::ChannelEvent(ev) = &typed {
        for key in [
            WaitKey::Ack(ev.msg_id, Some(ev.channel)),
            WaitKey::Ack(ev.msg_id, None),
        ] {
            if let Some(WaitSlot::Pending) = waiters.get(&key) {
                waiters.insert(key, WaitSlot::Ready(typed.clone()));
                woke = true;
            }
        }
    }
    for key in [
        WaitKey::Message(typed.type_id(), channel),
        WaitKey::Message(typed.type_id(), None),
    ] {
        if let Some(WaitSlot::Pending) = waiters.get(&key) {
            waiters.insert(key, WaitSlot::Ready(typed.clone()));
            woke = true;
        }
    }
    drop(waiters);
    if woke {
        shared.condvar.notify_all();
    }

    let mut subscribers = shared.subscribers.lock().unwrap();
    for (filter, callback) in subscribers.values_mut() {
        if filter.is_none() || *filter == channel {
            callback(&typed);
        }
    }
}
