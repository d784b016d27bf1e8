// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end Node/Channel scenarios against a scripted in-memory transport.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ant::channel::ChannelState;
use ant::constants::{MessageId, CHANNEL_TYPE_TWOWAY_RECEIVE, RESPONSE_NO_ERROR, TIMEOUT_NEVER};
use ant::error::DriverError;
use ant::message::{BroadcastData, Capabilities, ChannelEvent, Message, Startup, TypedMessage};
use ant::node::Node;
use ant::transport::Transport;

/// Replies to every outbound message with a canned response: `SystemReset`
/// gets a `Startup`, a `Capabilities` request gets the scripted
/// capabilities, and everything else gets a `ChannelEvent` ack with
/// `msg_code = 0` addressed to the outbound message's channel (payload byte
/// 0, for the message types this test script actually sends).
struct ScriptedTransport {
    open: bool,
    inbound: Arc<Mutex<VecDeque<u8>>>,
    capabilities: Capabilities,
}

impl ScriptedTransport {
    fn new(capabilities: Capabilities, inbound: Arc<Mutex<VecDeque<u8>>>) -> Self {
        ScriptedTransport {
            open: false,
            inbound,
            capabilities,
        }
    }

    fn enqueue(&self, msg: &Message) {
        self.inbound.lock().unwrap().extend(msg.encode());
    }
}

fn inject(inbound: &Arc<Mutex<VecDeque<u8>>>, msg: &Message) {
    inbound.lock().unwrap().extend(msg.encode());
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<(), DriverError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DriverError> {
        let mut q = self.inbound.lock().unwrap();
        if q.is_empty() {
            drop(q);
            std::thread::sleep(Duration::from_millis(2));
            return Ok(0);
        }
        let n = q.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = q.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), DriverError> {
        let mut msg = Message::new();
        if msg.decode(buf).is_err() {
            return Ok(());
        }

        if msg.msg_type() == MessageId::SystemReset.as_u8() {
            self.enqueue(&Startup { reason: 0 }.to_message());
            return Ok(());
        }

        if msg.msg_type() == MessageId::ChannelRequest.as_u8()
            && msg.payload().get(1) == Some(&MessageId::Capabilities.as_u8())
        {
            self.enqueue(&self.capabilities.to_message());
            return Ok(());
        }

        let channel = msg.payload().first().copied().unwrap_or(0);
        self.enqueue(
            &ChannelEvent {
                channel,
                msg_id: msg.msg_type(),
                msg_code: RESPONSE_NO_ERROR,
            }
            .to_message(),
        );
        Ok(())
    }
}

#[test]
fn capabilities_bootstrap() {
    let caps = Capabilities {
        max_channels: 8,
        max_networks: 3,
        std_options: 0xAB,
        adv_options: 0xCD,
        adv_options2: Some(0xEF),
    };
    let inbound = Arc::new(Mutex::new(VecDeque::new()));
    let node = Node::with_transport(
        Box::new(ScriptedTransport::new(caps, inbound)),
        Duration::from_secs(1),
    );
    node.start().expect("node should start against a well-behaved scripted stick");

    let got = node.capabilities().expect("capabilities must be set after start()");
    assert_eq!(got.max_channels, 8);
    assert_eq!(got.max_networks, 3);
    assert_eq!(got.std_options, 0xAB);
    assert_eq!(got.adv_options, 0xCD);
    assert_eq!(got.adv_options2_or_zero(), 0xEF);

    for _ in 0..8 {
        node.get_free_channel().expect("channel 0..7 must all be free");
    }
    assert!(node.get_free_channel().is_err(), "9th channel must not be free");
}

#[test]
fn hrm_style_channel_bring_up() {
    let caps = Capabilities {
        max_channels: 8,
        max_networks: 3,
        std_options: 0,
        adv_options: 0,
        adv_options2: None,
    };
    let inbound = Arc::new(Mutex::new(VecDeque::new()));
    let node = Node::with_transport(
        Box::new(ScriptedTransport::new(caps, Arc::clone(&inbound))),
        Duration::from_secs(1),
    );
    node.start().unwrap();

    // Slot 0 was already bootstrapped to a zero key by `start()`; push the
    // channel's actual key material onto it explicitly.
    node.set_network_key(0, Some([0; 8])).unwrap();

    let channel = node.get_free_channel().unwrap();
    assert_eq!(channel.number(), 0);

    channel.assign(CHANNEL_TYPE_TWOWAY_RECEIVE, 0).unwrap();
    channel.set_id(120, 0, 0).unwrap();
    channel.set_search_timeout(TIMEOUT_NEVER).unwrap();
    channel.set_period(8070).unwrap();
    channel.set_frequency(57).unwrap();

    let (tx, rx) = mpsc::channel();
    let _handle = channel.register_callback(move |msg| {
        if let TypedMessage::BroadcastData(data) = msg {
            tx.send(*data).unwrap();
        }
    });

    channel.open().unwrap();
    assert_eq!(channel.state(), ChannelState::Open);

    inject(
        &inbound,
        &BroadcastData {
            channel: channel.number(),
            data: [1, 2, 3, 4, 5, 6, 7],
        }
        .to_message(),
    );

    let received = rx.recv_timeout(Duration::from_secs(1)).expect("broadcast should be delivered");
    assert_eq!(received.channel, channel.number());
    assert_eq!(received.data, [1, 2, 3, 4, 5, 6, 7]);

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err(), "only one broadcast was sent");
}
