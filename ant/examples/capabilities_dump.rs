// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Connects to a stick over serial, resets it, and prints its reported
//! capabilities.

use ant::config::{NodeConfig, TransportKind};
use ant::node::Node;
use dialoguer::Input;

fn main() {
    env_logger::init();

    let path: String = Input::new()
        .with_prompt("serial device path")
        .default("/dev/ttyUSB0".into())
        .interact_text()
        .expect("failed to read device path");

    let node = Node::new(NodeConfig::new(TransportKind::Serial(path))).expect("failed to open transport");
    node.start().expect("failed to start node");

    let caps = node.capabilities().expect("node just started, capabilities must be set");
    println!("max channels:  {}", caps.max_channels);
    println!("max networks:  {}", caps.max_networks);
    println!("std options:   0x{:02X}", caps.std_options);
    println!("adv options:   0x{:02X}", caps.adv_options);
    println!("adv options 2: 0x{:02X}", caps.adv_options2_or_zero());

    node.stop(false).expect("failed to stop node");
}
