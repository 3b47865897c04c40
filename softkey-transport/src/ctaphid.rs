//! CTAP HID packet format
//!
//! Fixed 64-byte frames carrying fragmented CTAP messages.
//!
//! Packet format:
//! - Initialization packet: CID(4) + CMD(1) + BCNT(2) + DATA(57)
//! - Continuation packet: CID(4) + SEQ(1) + DATA(59)
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.2-rd-20230321/fido-client-to-authenticator-protocol-v2.2-rd-20230321.html#usb-hid-framing>

use crate::error::{Error, Result};

/// HID packet size (fixed at 64 bytes for USB HID)
pub const PACKET_SIZE: usize = 64;

/// Maximum CTAP message size (7609 bytes)
///
/// One initialization packet plus 128 continuation packets:
/// 57 + 128 * 59.
pub const MAX_MESSAGE_SIZE: usize = 7609;

/// Broadcast channel ID (used only to request a channel allocation)
pub const BROADCAST_CID: u32 = 0xFFFF_FFFF;

/// Initialization packet header size (CID + CMD + BCNT)
pub(crate) const INIT_HEADER_SIZE: usize = 7;

/// Continuation packet header size (CID + SEQ)
pub(crate) const CONT_HEADER_SIZE: usize = 5;

/// Initialization packet payload capacity
const INIT_DATA_SIZE: usize = PACKET_SIZE - INIT_HEADER_SIZE;

/// Continuation packet payload capacity
const CONT_DATA_SIZE: usize = PACKET_SIZE - CONT_HEADER_SIZE;

/// CTAP HID commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cmd {
    /// Transaction that echoes the data back
    Ping = 0x01,

    /// Encapsulated CTAP1/U2F message
    Msg = 0x03,

    /// Place an exclusive lock for one channel
    Lock = 0x04,

    /// Allocate a new CID or synchronize a channel
    Init = 0x06,

    /// Request visual/audible identification
    Wink = 0x08,

    /// Encapsulated CTAP2 CBOR message
    Cbor = 0x10,

    /// Cancel any outstanding request on the given CID
    Cancel = 0x11,

    /// The request is still being processed (outbound only)
    Keepalive = 0x3B,

    /// Error response message (outbound only)
    Error = 0x3F,
}

impl Cmd {
    /// Convert from a u8 value, ignoring the TYPE bit
    pub fn from_u8(value: u8) -> Option<Self> {
        match value & 0x7F {
            0x01 => Some(Cmd::Ping),
            0x03 => Some(Cmd::Msg),
            0x04 => Some(Cmd::Lock),
            0x06 => Some(Cmd::Init),
            0x08 => Some(Cmd::Wink),
            0x10 => Some(Cmd::Cbor),
            0x11 => Some(Cmd::Cancel),
            0x3B => Some(Cmd::Keepalive),
            0x3F => Some(Cmd::Error),
            _ => None,
        }
    }

    /// Convert to a u8 value with the TYPE bit set (initialization packet)
    pub fn to_u8_init(self) -> u8 {
        (self as u8) | 0x80
    }

    /// Convert to the bare u8 value
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// CTAP HID error codes (1-byte payload of a `CTAPHID_ERROR` message)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Invalid command
    InvalidCmd = 0x01,

    /// Invalid parameter
    InvalidPar = 0x02,

    /// Invalid message length
    InvalidLen = 0x03,

    /// Invalid message sequencing
    InvalidSeq = 0x04,

    /// Message has timed out
    MsgTimeout = 0x05,

    /// Channel busy
    ChannelBusy = 0x06,

    /// Command requires channel lock
    LockRequired = 0x0A,

    /// CID invalid
    InvalidChannel = 0x0B,

    /// Other unspecified error
    Other = 0x7F,
}

impl ErrorCode {
    /// Convert to u8 value
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A single 64-byte HID packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: [u8; PACKET_SIZE],
}

impl Packet {
    /// Create a new packet from raw data
    pub fn from_bytes(data: [u8; PACKET_SIZE]) -> Self {
        Self { data }
    }

    /// Create a new packet from a slice (must be exactly 64 bytes)
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() != PACKET_SIZE {
            return Err(Error::InvalidPacket);
        }
        let mut packet_data = [0u8; PACKET_SIZE];
        packet_data.copy_from_slice(data);
        Ok(Self { data: packet_data })
    }

    /// Get raw packet data
    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.data
    }

    /// Get channel ID
    pub fn cid(&self) -> u32 {
        u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }

    /// Check if this is an initialization packet
    pub fn is_init(&self) -> bool {
        (self.data[4] & 0x80) != 0
    }

    /// Get command (only valid for initialization packets)
    pub fn cmd(&self) -> Option<Cmd> {
        if !self.is_init() {
            return None;
        }
        Cmd::from_u8(self.data[4])
    }

    /// Get total message payload length (only valid for initialization packets)
    pub fn payload_len(&self) -> Option<u16> {
        if !self.is_init() {
            return None;
        }
        Some(u16::from_be_bytes([self.data[5], self.data[6]]))
    }

    /// Get sequence number (only valid for continuation packets)
    pub fn seq(&self) -> Option<u8> {
        if self.is_init() {
            return None;
        }
        Some(self.data[4])
    }

    /// Get payload data (up to the end of the frame, padding included)
    pub fn payload(&self) -> &[u8] {
        if self.is_init() {
            &self.data[INIT_HEADER_SIZE..]
        } else {
            &self.data[CONT_HEADER_SIZE..]
        }
    }

    /// Create a single error packet carrying the given code
    pub fn error(cid: u32, code: ErrorCode) -> Self {
        let mut packet = [0u8; PACKET_SIZE];
        packet[0..4].copy_from_slice(&cid.to_be_bytes());
        packet[4] = Cmd::Error.to_u8_init();
        packet[5..7].copy_from_slice(&1u16.to_be_bytes());
        packet[7] = code.to_u8();

        Packet::from_bytes(packet)
    }
}

/// A complete CTAP message (reassembled from, or splittable into, packets)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Channel ID
    pub cid: u32,

    /// Command
    pub cmd: Cmd,

    /// Payload data
    pub data: Vec<u8>,
}

impl Message {
    /// Create a new message
    pub fn new(cid: u32, cmd: Cmd, data: Vec<u8>) -> Self {
        Self { cid, cmd, data }
    }

    /// Whether this is a `CTAPHID_ERROR` message
    pub fn is_error(&self) -> bool {
        self.cmd == Cmd::Error
    }

    /// Fragment this message into HID packets
    pub fn to_packets(&self) -> Result<Vec<Packet>> {
        Ok(split(self.cid, self.cmd, &self.data)?.collect())
    }
}

/// Split an outbound message into 64-byte packets
///
/// The returned iterator yields one initialization packet followed by as
/// many continuation packets as the payload requires, `seq` ascending from
/// zero. An empty payload still produces the initialization packet. Unused
/// frame bytes are zero.
pub fn split(cid: u32, cmd: Cmd, payload: &[u8]) -> Result<MessageSplitter<'_>> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(Error::MessageTooLarge);
    }

    Ok(MessageSplitter {
        cid,
        cmd,
        payload,
        offset: 0,
        next_seq: None,
        done: false,
    })
}

/// Lazy packet sequence produced by [`split`]
#[derive(Debug, Clone)]
pub struct MessageSplitter<'a> {
    cid: u32,
    cmd: Cmd,
    payload: &'a [u8],
    offset: usize,
    /// `None` until the initialization packet has been emitted
    next_seq: Option<u8>,
    done: bool,
}

impl Iterator for MessageSplitter<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.done {
            return None;
        }

        let mut frame = [0u8; PACKET_SIZE];
        frame[0..4].copy_from_slice(&self.cid.to_be_bytes());

        match self.next_seq {
            None => {
                frame[4] = self.cmd.to_u8_init();
                frame[5..7].copy_from_slice(&(self.payload.len() as u16).to_be_bytes());

                let n = self.payload.len().min(INIT_DATA_SIZE);
                frame[INIT_HEADER_SIZE..INIT_HEADER_SIZE + n].copy_from_slice(&self.payload[..n]);
                self.offset = n;
                self.next_seq = Some(0);
            }
            Some(seq) => {
                frame[4] = seq;

                let n = (self.payload.len() - self.offset).min(CONT_DATA_SIZE);
                frame[CONT_HEADER_SIZE..CONT_HEADER_SIZE + n]
                    .copy_from_slice(&self.payload[self.offset..self.offset + n]);
                self.offset += n;
                // seq stays below 128: MAX_MESSAGE_SIZE bounds the packet count
                self.next_seq = Some(seq.wrapping_add(1));
            }
        }

        if self.offset >= self.payload.len() {
            self.done = true;
        }
        Some(Packet::from_bytes(frame))
    }
}
