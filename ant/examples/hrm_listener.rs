// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Opens a channel searching for any ANT+ heart rate monitor and prints
//! every broadcast it receives.

use std::sync::mpsc;
use std::time::Duration;

use ant::config::{NodeConfig, TransportKind};
use ant::constants::CHANNEL_TYPE_TWOWAY_RECEIVE;
use ant::message::TypedMessage;
use ant::node::Node;
use dialoguer::Input;

/// ANT+ device type for heart rate monitors.
const HRM_DEVICE_TYPE: u8 = 0x78;
/// Standard ANT+ HRM channel period (~4.06 Hz).
const HRM_PERIOD: u16 = 8070;
/// 2457 MHz, the frequency every ANT+ profile operates on.
const HRM_FREQUENCY: u8 = 0x39;

fn main() {
    env_logger::init();

    let path: String = Input::new()
        .with_prompt("serial device path")
        .default("/dev/ttyUSB0".into())
        .interact_text()
        .expect("failed to read device path");

    let node = Node::new(NodeConfig::new(TransportKind::Serial(path))).expect("failed to open transport");
    node.start().expect("failed to start node");

    // Slot 0 was already bootstrapped to a zero key by `start()`; push the
    // public ANT+ key material onto it explicitly.
    node.set_network_key(0, Some([0; 8]))
        .expect("failed to set network key");

    let channel = node.get_free_channel().expect("no free channel");
    channel
        .assign(CHANNEL_TYPE_TWOWAY_RECEIVE, 0)
        .expect("failed to assign channel");
    channel
        .set_id(0, HRM_DEVICE_TYPE, 0)
        .expect("failed to set channel id");
    channel.set_period(HRM_PERIOD).expect("failed to set period");
    channel
        .set_frequency(HRM_FREQUENCY)
        .expect("failed to set frequency");
    channel
        .set_search_timeout(ant::constants::TIMEOUT_NEVER)
        .expect("failed to set search timeout");

    let (tx, rx) = mpsc::channel();
    let _handle = channel.register_callback(move |msg| {
        if let TypedMessage::BroadcastData(data) = msg {
            let _ = tx.send(*data);
        }
    });

    channel.open().expect("failed to open channel");
    println!("listening for a heart rate monitor, ctrl-c to quit");

    while let Ok(data) = rx.recv_timeout(Duration::from_secs(60)) {
        let computed_heart_rate = data.data[7 - 1];
        println!("heart rate: {computed_heart_rate} bpm");
    }
}
