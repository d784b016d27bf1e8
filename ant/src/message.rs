// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Frames, encodes, decodes, and type-tags raw ANT messages.

use arrayvec::ArrayVec;

use crate::constants::{MessageId, MAX_PAYLOAD_LEN, SYNC};
use crate::error::MessageError;

/// Size of a fully encoded frame with the largest possible payload.
const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + 4;

/// A raw ANT message: a type byte plus up to 9 payload bytes, with no
/// knowledge of what the payload means.
///
/// Mirrors the wire frame `SYNC | LEN | TYPE | PAYLOAD | XOR` but only stores
/// the fields that are not a pure function of the others.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    msg_type: u8,
    payload: ArrayVec<u8, MAX_PAYLOAD_LEN>,
}

impl Message {
    /// A blank message: type 0, empty payload.
    pub fn new() -> Self {
        Message::default()
    }

    /// Builds a message, validating that the payload fits in a frame.
    pub fn with_payload(msg_type: u8, payload: &[u8]) -> Result<Self, MessageError> {
        let mut msg = Message {
            msg_type,
            payload: ArrayVec::new(),
        };
        msg.set_payload(payload)?;
        Ok(msg)
    }

    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Sets the message type. `msg_type` is widened to `u32` so out-of-range
    /// values (anything outside `0..=255`) are rejected rather than silently
    /// truncated.
    pub fn set_type(&mut self, msg_type: u32) -> Result<(), MessageError> {
        if msg_type > 0xFF {
            return Err(MessageError::TypeOutOfRange);
        }
        self.msg_type = msg_type as u8;
        Ok(())
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replaces the payload. Fails, leaving the message untouched, if `payload`
    /// is longer than 9 bytes.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<(), MessageError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(MessageError::PayloadTooLong);
        }
        let mut buf = ArrayVec::new();
        buf.try_extend_from_slice(payload)
            .expect("length already checked above");
        self.payload = buf;
        Ok(())
    }

    /// Cumulative XOR of SYNC, LEN, TYPE, and every payload byte. No modulo
    /// reduction is applied (see `SPEC_FULL.md` §9).
    pub fn checksum(&self) -> u8 {
        let mut sum = SYNC;
        sum ^= self.payload.len() as u8;
        sum ^= self.msg_type;
        for byte in &self.payload {
            sum ^= byte;
        }
        sum
    }

    /// Total size of the encoded frame: `len(payload) + 4`.
    pub fn size(&self) -> usize {
        self.payload.len() + 4
    }

    /// Encodes this message as a complete wire frame. Infallible: a `Message`
    /// can only ever hold values that are valid to encode.
    pub fn encode(&self) -> ArrayVec<u8, MAX_FRAME_LEN> {
        let mut out = ArrayVec::new();
        out.push(SYNC);
        out.push(self.payload.len() as u8);
        out.push(self.msg_type);
        out.try_extend_from_slice(&self.payload).unwrap();
        out.push(self.checksum());
        out
    }

    /// Decodes a frame from the front of `raw`, mutating `self` on success
    /// and returning the number of bytes consumed (`len(payload) + 4`).
    ///
    /// On any error, `self` is left exactly as it was before the call.
    pub fn decode(&mut self, raw: &[u8]) -> Result<usize, MessageError> {
        if raw.len() < 5 {
            return Err(MessageError::Incomplete);
        }
        if raw[0] != SYNC {
            return Err(MessageError::BadSync);
        }
        let len = raw[1] as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(MessageError::PayloadTooLong);
        }
        if raw.len() < len + 4 {
            return Err(MessageError::Incomplete);
        }

        let msg_type = raw[2];
        let payload = &raw[3..3 + len];

        let mut sum = SYNC;
        sum ^= len as u8;
        sum ^= msg_type;
        for byte in payload {
            sum ^= byte;
        }
        if sum != raw[3 + len] {
            return Err(MessageError::BadChecksum);
        }

        self.msg_type = msg_type;
        self.payload = ArrayVec::new();
        self.payload
            .try_extend_from_slice(payload)
            .expect("length already checked above");
        Ok(len + 4)
    }

    /// Builds the typed variant for this message's type, decoding `raw` first
    /// if supplied.
    pub fn to_typed(&mut self, raw: Option<&[u8]>) -> Result<TypedMessage, MessageError> {
        if let Some(raw) = raw {
            self.decode(raw)?;
        }
        TypedMessage::from_raw(self.msg_type, &self.payload)
    }
}

macro_rules! require_len {
    ($payload:expr, $len:expr) => {
        if $payload.len() != $len {
            return Err(MessageError::BadLength);
        }
    };
}

/// Every known ANT message type, each carrying its fields decoded out of the
/// raw payload. See `SPEC_FULL.md` §4.1 for the payload layout table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypedMessage {
    Version(Version),
    ChannelEvent(ChannelEvent),
    ChannelUnassign(ChannelUnassign),
    ChannelAssign(ChannelAssign),
    ChannelPeriod(ChannelPeriod),
    ChannelSearchTimeout(ChannelSearchTimeout),
    ChannelFrequency(ChannelFrequency),
    NetworkKeyMsg(NetworkKeyMsg),
    TxPower(TxPower),
    SystemReset(SystemReset),
    ChannelOpen(ChannelOpen),
    ChannelClose(ChannelClose),
    ChannelRequest(ChannelRequest),
    BroadcastData(BroadcastData),
    AcknowledgedData(AcknowledgedData),
    BurstData(BurstData),
    ChannelId(ChannelId),
    ChannelStatus(ChannelStatus),
    Capabilities(Capabilities),
    ChannelTxPower(ChannelTxPower),
    SerialNumber(SerialNumber),
    Startup(Startup),
}

impl TypedMessage {
    fn from_raw(msg_type: u8, payload: &[u8]) -> Result<Self, MessageError> {
        let id = MessageId::from_u8(msg_type).ok_or(MessageError::UnknownType(msg_type))?;
        Ok(match id {
            MessageId::Version => TypedMessage::Version(Version::from_payload(payload)?),
            MessageId::ChannelEvent => {
                TypedMessage::ChannelEvent(ChannelEvent::from_payload(payload)?)
            }
            MessageId::ChannelUnassign => {
                TypedMessage::ChannelUnassign(ChannelUnassign::from_payload(payload)?)
            }
            MessageId::ChannelAssign => {
                TypedMessage::ChannelAssign(ChannelAssign::from_payload(payload)?)
            }
            MessageId::ChannelPeriod => {
                TypedMessage::ChannelPeriod(ChannelPeriod::from_payload(payload)?)
            }
            MessageId::ChannelSearchTimeout => {
                TypedMessage::ChannelSearchTimeout(ChannelSearchTimeout::from_payload(payload)?)
            }
            MessageId::ChannelFrequency => {
                TypedMessage::ChannelFrequency(ChannelFrequency::from_payload(payload)?)
            }
            MessageId::NetworkKey => {
                TypedMessage::NetworkKeyMsg(NetworkKeyMsg::from_payload(payload)?)
            }
            MessageId::TxPower => TypedMessage::TxPower(TxPower::from_payload(payload)?),
            MessageId::SystemReset => {
                TypedMessage::SystemReset(SystemReset::from_payload(payload)?)
            }
            MessageId::ChannelOpen => {
                TypedMessage::ChannelOpen(ChannelOpen::from_payload(payload)?)
            }
            MessageId::ChannelClose => {
                TypedMessage::ChannelClose(ChannelClose::from_payload(payload)?)
            }
            MessageId::ChannelRequest => {
                TypedMessage::ChannelRequest(ChannelRequest::from_payload(payload)?)
            }
            MessageId::BroadcastData => {
                TypedMessage::BroadcastData(BroadcastData::from_payload(payload)?)
            }
            MessageId::AcknowledgedData => {
                TypedMessage::AcknowledgedData(AcknowledgedData::from_payload(payload)?)
            }
            MessageId::BurstData => TypedMessage::BurstData(BurstData::from_payload(payload)?),
            MessageId::ChannelId => TypedMessage::ChannelId(ChannelId::from_payload(payload)?),
            MessageId::ChannelStatus => {
                TypedMessage::ChannelStatus(ChannelStatus::from_payload(payload)?)
            }
            MessageId::Capabilities => {
                TypedMessage::Capabilities(Capabilities::from_payload(payload)?)
            }
            MessageId::ChannelTxPower => {
                TypedMessage::ChannelTxPower(ChannelTxPower::from_payload(payload)?)
            }
            MessageId::SerialNumber => {
                TypedMessage::SerialNumber(SerialNumber::from_payload(payload)?)
            }
            MessageId::Startup => TypedMessage::Startup(Startup::from_payload(payload)?),
        })
    }

    /// The channel number this message is scoped to, if any. Used by the
    /// event machine to route inbound traffic to per-channel subscribers and
    /// waiters.
    pub fn channel_number(&self) -> Option<u8> {
        use TypedMessage::*;
        match self {
            ChannelEvent(m) => Some(m.channel),
            ChannelUnassign(m) => Some(m.channel),
            ChannelAssign(m) => Some(m.channel),
            ChannelPeriod(m) => Some(m.channel),
            ChannelSearchTimeout(m) => Some(m.channel),
            ChannelFrequency(m) => Some(m.channel),
            ChannelOpen(m) => Some(m.channel),
            ChannelClose(m) => Some(m.channel),
            ChannelRequest(m) => Some(m.channel),
            BroadcastData(m) => Some(m.channel),
            AcknowledgedData(m) => Some(m.channel),
            BurstData(m) => Some(m.channel_number()),
            ChannelId(m) => Some(m.channel),
            ChannelStatus(m) => Some(m.channel),
            ChannelTxPower(m) => Some(m.channel),
            Version(_) | NetworkKeyMsg(_) | TxPower(_) | SystemReset(_) | Capabilities(_)
            | SerialNumber(_) | Startup(_) => None,
        }
    }

    /// The message type byte this variant decodes as. Used to discriminate a
    /// `wait_for_message` request without constructing a dummy payload.
    pub fn type_id(&self) -> u8 {
        use TypedMessage::*;
        match self {
            Version(_) => MessageId::Version.as_u8(),
            ChannelEvent(_) => MessageId::ChannelEvent.as_u8(),
            ChannelUnassign(_) => MessageId::ChannelUnassign.as_u8(),
            ChannelAssign(_) => MessageId::ChannelAssign.as_u8(),
            ChannelPeriod(_) => MessageId::ChannelPeriod.as_u8(),
            ChannelSearchTimeout(_) => MessageId::ChannelSearchTimeout.as_u8(),
            ChannelFrequency(_) => MessageId::ChannelFrequency.as_u8(),
            NetworkKeyMsg(_) => MessageId::NetworkKey.as_u8(),
            TxPower(_) => MessageId::TxPower.as_u8(),
            SystemReset(_) => MessageId::SystemReset.as_u8(),
            ChannelOpen(_) => MessageId::ChannelOpen.as_u8(),
            ChannelClose(_) => MessageId::ChannelClose.as_u8(),
            ChannelRequest(_) => MessageId::ChannelRequest.as_u8(),
            BroadcastData(_) => MessageId::BroadcastData.as_u8(),
            AcknowledgedData(_) => MessageId::AcknowledgedData.as_u8(),
            BurstData(_) => MessageId::BurstData.as_u8(),
            ChannelId(_) => MessageId::ChannelId.as_u8(),
            ChannelStatus(_) => MessageId::ChannelStatus.as_u8(),
            Capabilities(_) => MessageId::Capabilities.as_u8(),
            ChannelTxPower(_) => MessageId::ChannelTxPower.as_u8(),
            SerialNumber(_) => MessageId::SerialNumber.as_u8(),
            Startup(_) => MessageId::Startup.as_u8(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Version {
    pub version: [u8; 9],
}
impl Version {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 9);
        let mut version = [0u8; 9];
        version.copy_from_slice(p);
        Ok(Version { version })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::Version.as_u8(), &self.version).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelEvent {
    pub channel: u8,
    pub msg_id: u8,
    pub msg_code: u8,
}
impl ChannelEvent {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 3);
        Ok(ChannelEvent {
            channel: p[0],
            msg_id: p[1],
            msg_code: p[2],
        })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(
            MessageId::ChannelEvent.as_u8(),
            &[self.channel, self.msg_id, self.msg_code],
        )
        .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelUnassign {
    pub channel: u8,
}
impl ChannelUnassign {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 1);
        Ok(ChannelUnassign { channel: p[0] })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::ChannelUnassign.as_u8(), &[self.channel]).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelAssign {
    pub channel: u8,
    pub channel_type: u8,
    pub network: u8,
}
impl ChannelAssign {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 3);
        Ok(ChannelAssign {
            channel: p[0],
            channel_type: p[1],
            network: p[2],
        })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(
            MessageId::ChannelAssign.as_u8(),
            &[self.channel, self.channel_type, self.network],
        )
        .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelPeriod {
    pub channel: u8,
    pub period: u16,
}
impl ChannelPeriod {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 3);
        Ok(ChannelPeriod {
            channel: p[0],
            period: u16::from_le_bytes([p[1], p[2]]),
        })
    }
    pub fn to_message(&self) -> Message {
        let [lo, hi] = self.period.to_le_bytes();
        Message::with_payload(MessageId::ChannelPeriod.as_u8(), &[self.channel, lo, hi]).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelSearchTimeout {
    pub channel: u8,
    pub timeout: u8,
}
impl ChannelSearchTimeout {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 2);
        Ok(ChannelSearchTimeout {
            channel: p[0],
            timeout: p[1],
        })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(
            MessageId::ChannelSearchTimeout.as_u8(),
            &[self.channel, self.timeout],
        )
        .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelFrequency {
    pub channel: u8,
    pub frequency: u8,
}
impl ChannelFrequency {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 2);
        Ok(ChannelFrequency {
            channel: p[0],
            frequency: p[1],
        })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(
            MessageId::ChannelFrequency.as_u8(),
            &[self.channel, self.frequency],
        )
        .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkKeyMsg {
    pub slot: u8,
    pub key: [u8; 8],
}
impl NetworkKeyMsg {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 9);
        let mut key = [0u8; 8];
        key.copy_from_slice(&p[1..9]);
        Ok(NetworkKeyMsg { slot: p[0], key })
    }
    pub fn to_message(&self) -> Message {
        let mut payload = [0u8; 9];
        payload[0] = self.slot;
        payload[1..9].copy_from_slice(&self.key);
        Message::with_payload(MessageId::NetworkKey.as_u8(), &payload).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxPower {
    pub power: u8,
}
impl TxPower {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 2);
        Ok(TxPower { power: p[1] })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::TxPower.as_u8(), &[0, self.power]).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemReset;
impl SystemReset {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 1);
        Ok(SystemReset)
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::SystemReset.as_u8(), &[0]).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelOpen {
    pub channel: u8,
}
impl ChannelOpen {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 1);
        Ok(ChannelOpen { channel: p[0] })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::ChannelOpen.as_u8(), &[self.channel]).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelClose {
    pub channel: u8,
}
impl ChannelClose {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 1);
        Ok(ChannelClose { channel: p[0] })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::ChannelClose.as_u8(), &[self.channel]).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelRequest {
    pub channel: u8,
    pub requested_msg_id: u8,
}
impl ChannelRequest {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 2);
        Ok(ChannelRequest {
            channel: p[0],
            requested_msg_id: p[1],
        })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(
            MessageId::ChannelRequest.as_u8(),
            &[self.channel, self.requested_msg_id],
        )
        .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastData {
    pub channel: u8,
    pub data: [u8; 7],
}
impl BroadcastData {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 8);
        let mut data = [0u8; 7];
        data.copy_from_slice(&p[1..8]);
        Ok(BroadcastData { channel: p[0], data })
    }
    pub fn to_message(&self) -> Message {
        let mut payload = [0u8; 8];
        payload[0] = self.channel;
        payload[1..8].copy_from_slice(&self.data);
        Message::with_payload(MessageId::BroadcastData.as_u8(), &payload).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcknowledgedData {
    pub channel: u8,
    pub data: [u8; 7],
}
impl AcknowledgedData {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 8);
        let mut data = [0u8; 7];
        data.copy_from_slice(&p[1..8]);
        Ok(AcknowledgedData { channel: p[0], data })
    }
    pub fn to_message(&self) -> Message {
        let mut payload = [0u8; 8];
        payload[0] = self.channel;
        payload[1..8].copy_from_slice(&self.data);
        Message::with_payload(MessageId::AcknowledgedData.as_u8(), &payload).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BurstData {
    /// Channel number in the low 5 bits, sequence number in the high 3 bits.
    pub channel_sequence: u8,
    pub data: [u8; 7],
}
impl BurstData {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 8);
        let mut data = [0u8; 7];
        data.copy_from_slice(&p[1..8]);
        Ok(BurstData {
            channel_sequence: p[0],
            data,
        })
    }
    pub fn channel_number(&self) -> u8 {
        self.channel_sequence & 0x1F
    }
    pub fn sequence(&self) -> u8 {
        self.channel_sequence >> 5
    }
    pub fn to_message(&self) -> Message {
        let mut payload = [0u8; 8];
        payload[0] = self.channel_sequence;
        payload[1..8].copy_from_slice(&self.data);
        Message::with_payload(MessageId::BurstData.as_u8(), &payload).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelId {
    pub channel: u8,
    pub device_number: u16,
    pub device_type: u8,
    pub transmission_type: u8,
}
impl ChannelId {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 5);
        Ok(ChannelId {
            channel: p[0],
            device_number: u16::from_le_bytes([p[1], p[2]]),
            device_type: p[3],
            transmission_type: p[4],
        })
    }
    pub fn to_message(&self) -> Message {
        let [lo, hi] = self.device_number.to_le_bytes();
        Message::with_payload(
            MessageId::ChannelId.as_u8(),
            &[self.channel, lo, hi, self.device_type, self.transmission_type],
        )
        .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStatus {
    pub channel: u8,
    pub status: u8,
}
impl ChannelStatus {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 2);
        Ok(ChannelStatus {
            channel: p[0],
            status: p[1],
        })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::ChannelStatus.as_u8(), &[self.channel, self.status])
            .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub max_channels: u8,
    pub max_networks: u8,
    pub std_options: u8,
    pub adv_options: u8,
    /// Absent on older firmware; reads as 0 when missing.
    pub adv_options2: Option<u8>,
}
impl Capabilities {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        if p.len() != 4 && p.len() != 5 {
            return Err(MessageError::BadLength);
        }
        Ok(Capabilities {
            max_channels: p[0],
            max_networks: p[1],
            std_options: p[2],
            adv_options: p[3],
            adv_options2: p.get(4).copied(),
        })
    }
    /// `adv_options2`, or 0 if this stick never reported one.
    pub fn adv_options2_or_zero(&self) -> u8 {
        self.adv_options2.unwrap_or(0)
    }
    pub fn to_message(&self) -> Message {
        let mut payload = ArrayVec::<u8, 5>::new();
        payload.push(self.max_channels);
        payload.push(self.max_networks);
        payload.push(self.std_options);
        payload.push(self.adv_options);
        if let Some(adv2) = self.adv_options2 {
            payload.push(adv2);
        }
        Message::with_payload(MessageId::Capabilities.as_u8(), &payload).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelTxPower {
    pub channel: u8,
    pub power: u8,
}
impl ChannelTxPower {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 2);
        Ok(ChannelTxPower {
            channel: p[0],
            power: p[1],
        })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::ChannelTxPower.as_u8(), &[self.channel, self.power])
            .unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerialNumber {
    pub serial: [u8; 4],
}
impl SerialNumber {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 4);
        let mut serial = [0u8; 4];
        serial.copy_from_slice(p);
        Ok(SerialNumber { serial })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::SerialNumber.as_u8(), &self.serial).unwrap()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Startup {
    pub reason: u8,
}
impl Startup {
    fn from_payload(p: &[u8]) -> Result<Self, MessageError> {
        require_len!(p, 1);
        Ok(Startup { reason: p[0] })
    }
    pub fn to_message(&self) -> Message {
        Message::with_payload(MessageId::Startup.as_u8(), &[self.reason]).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_system_reset() {
        let msg = SystemReset.to_message();
        assert_eq!(msg.encode().as_slice(), &[0xA4, 0x01, 0x4A, 0x00, 0xEF]);
    }

    #[test]
    fn encode_channel_assign() {
        let msg = ChannelAssign {
            channel: 0,
            channel_type: 0,
            network: 0,
        }
        .to_message();
        assert_eq!(
            msg.encode().as_slice(),
            &[0xA4, 0x03, 0x42, 0x00, 0x00, 0x00, 0xE5]
        );
    }

    #[test]
    fn decode_rejects_bad_sync() {
        let mut msg = Message::new();
        let err = msg
            .decode(&[0xA5, 0x03, 0x42, 0x00, 0x00, 0x00, 0xE5])
            .unwrap_err();
        assert_eq!(err, MessageError::BadSync);
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let mut msg = Message::new();
        let err = msg
            .decode(&[0xA4, 0x03, 0x42, 0x01, 0x02, 0xF3, 0xE5])
            .unwrap_err();
        assert_eq!(err, MessageError::BadChecksum);
    }

    #[test]
    fn decode_accepts_valid_frame() {
        let mut msg = Message::new();
        let consumed = msg
            .decode(&[0xA4, 0x03, 0x42, 0x00, 0x00, 0x00, 0xE5])
            .unwrap();
        assert_eq!(consumed, 7);
        assert_eq!(msg.msg_type(), 0x42);
        assert_eq!(msg.payload(), &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn decode_leaves_prior_state_on_failure() {
        let mut msg = Message::with_payload(0x51, &[9, 9, 9]).unwrap();
        let before = msg.clone();
        assert!(msg.decode(&[0xA5, 0, 0, 0, 0]).is_err());
        assert_eq!(msg, before);
    }

    #[test]
    fn decode_rejects_incomplete_buffers() {
        let mut msg = Message::new();
        assert_eq!(msg.decode(&[0xA4, 0x01]).unwrap_err(), MessageError::Incomplete);
        assert_eq!(
            msg.decode(&[0xA4, 0x03, 0x42, 0x00]).unwrap_err(),
            MessageError::Incomplete
        );
    }

    #[test]
    fn decode_rejects_oversized_payload_length() {
        let mut msg = Message::new();
        assert_eq!(
            msg.decode(&[0xA4, 0x0A, 0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF])
                .unwrap_err(),
            MessageError::PayloadTooLong
        );
    }

    #[test]
    fn set_payload_rejects_too_long() {
        let mut msg = Message::new();
        assert_eq!(
            msg.set_payload(&[0; 10]).unwrap_err(),
            MessageError::PayloadTooLong
        );
    }

    #[test]
    fn set_type_rejects_out_of_range() {
        let mut msg = Message::new();
        assert_eq!(msg.set_type(0x100).unwrap_err(), MessageError::TypeOutOfRange);
        msg.set_type(0x42).unwrap();
        assert_eq!(msg.msg_type(), 0x42);
    }

    #[test]
    fn round_trip_every_length() {
        for len in 0..=9usize {
            let payload: Vec<u8> = (0..len as u8).collect();
            let msg = Message::with_payload(0x42, &payload).unwrap();
            let encoded = msg.encode();
            let mut decoded = Message::new();
            let consumed = decoded.decode(&encoded).unwrap();
            assert_eq!(consumed, len + 4);
            assert_eq!(decoded.msg_type(), 0x42);
            assert_eq!(decoded.payload(), payload.as_slice());
        }
    }

    #[test]
    fn unknown_type_errors() {
        let mut msg = Message::with_payload(0xFF, &[]).unwrap();
        assert_eq!(
            msg.to_typed(None).unwrap_err(),
            MessageError::UnknownType(0xFF)
        );
    }

    #[test]
    fn channel_event_round_trip() {
        let mut msg = ChannelEvent {
            channel: 0,
            msg_id: 0x42,
            msg_code: 0,
        }
        .to_message();
        let typed = msg.to_typed(None).unwrap();
        assert_eq!(typed.channel_number(), Some(0));
        match typed {
            TypedMessage::ChannelEvent(ev) => assert_eq!(ev.msg_id, 0x42),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn capabilities_adv_options2_absent_reads_zero() {
        let caps = Capabilities::from_payload(&[8, 3, 0xAB, 0xCD]).unwrap();
        assert_eq!(caps.adv_options2_or_zero(), 0);
        let encoded = caps.to_message();
        assert_eq!(encoded.payload().len(), 4);
    }

    #[test]
    fn capabilities_adv_options2_present() {
        let caps = Capabilities::from_payload(&[8, 3, 0xAB, 0xCD, 0xEF]).unwrap();
        assert_eq!(caps.adv_options2_or_zero(), 0xEF);
        let encoded = caps.to_message();
        assert_eq!(encoded.payload().len(), 5);
    }

    #[test]
    fn burst_data_channel_and_sequence() {
        let burst = BurstData {
            channel_sequence: (2 << 5) | 3,
            data: [0; 7],
        };
        assert_eq!(burst.channel_number(), 3);
        assert_eq!(burst.sequence(), 2);
    }
}
