//! CTAP HID message reassembly
//!
//! A [`Framer`] owns the per-device transport state: the set of allocated
//! channel IDs, the in-progress assembly (at most one message at a time),
//! and the reassembly deadline. Inbound 64-byte packets go through
//! [`Framer::handle`]; protocol violations never surface as Rust errors but
//! come back as ready-to-send `CTAPHID_ERROR` messages, with the state
//! machine already reset to idle.
//!
//! `CTAPHID_INIT` is handled entirely inside the framer: a request on the
//! broadcast channel allocates a fresh random CID and the synthesized
//! 17-byte INIT response is delivered in place of the request.

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, warn};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::clock::{Clock, MonotonicClock};
use crate::ctaphid::{
    split, Cmd, ErrorCode, Message, MessageSplitter, BROADCAST_CID, CONT_HEADER_SIZE,
    INIT_HEADER_SIZE, MAX_MESSAGE_SIZE,
};
use crate::error::Result;

/// Reassembly timeout, measured from the initialization packet; a stalled
/// assembly is dropped when the next packet arrives after this much time
pub const REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(250);

/// CTAPHID protocol version reported in INIT responses
const PROTOCOL_VERSION: u8 = 2;

/// Capability flag: device supports CTAPHID_WINK
pub const CAP_WINK: u8 = 0x01;

/// Capability flag: device supports CTAPHID_CBOR (CTAP2)
pub const CAP_CBOR: u8 = 0x04;

/// Capability flag: device does NOT support CTAPHID_MSG (CTAP1/U2F)
pub const CAP_NMSG: u8 = 0x08;

const CAPABILITIES: u8 = CAP_WINK | CAP_CBOR | CAP_NMSG;

/// INIT response payload size: nonce(8) + cid(4) + version(1) + device(3) + caps(1)
const INIT_RESPONSE_SIZE: usize = 17;

/// Device version bytes reported in INIT responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
}

impl Default for DeviceVersion {
    fn default() -> Self {
        Self {
            major: 0xCA,
            minor: 0xFE,
            build: 0x01,
        }
    }
}

/// Outcome of feeding one packet into the framer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A complete message is ready for the caller
    Complete(Message),

    /// More packets are needed
    InProgress,

    /// A protocol violation, packaged as a ready-to-send `CTAPHID_ERROR`
    /// message; the framer has already reset to idle
    Error(Message),
}

/// Reassembly state
#[derive(Debug)]
enum State {
    Idle,
    Assembling {
        cid: u32,
        cmd: Cmd,
        bcnt: usize,
        received: Vec<u8>,
        seq_last: Option<u8>,
        begin: Duration,
    },
}

/// CTAP HID packet reassembler and channel allocator
///
/// Generic over the time source and the RNG so tests can script both;
/// production code uses [`Framer::new`] which samples [`MonotonicClock`]
/// and draws channel IDs from the operating system CSPRNG.
pub struct Framer<C: Clock = MonotonicClock, R: RngCore = OsRng> {
    channels: HashSet<u32>,
    state: State,
    version: DeviceVersion,
    clock: C,
    rng: R,
}

impl Framer {
    /// Create a framer with the production clock and RNG
    pub fn new() -> Self {
        Self::with_parts(MonotonicClock::new(), OsRng)
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock, R: RngCore> Framer<C, R> {
    /// Create a framer with an injected clock and RNG
    pub fn with_parts(clock: C, rng: R) -> Self {
        Self {
            channels: HashSet::new(),
            state: State::Idle,
            version: DeviceVersion::default(),
            clock,
            rng,
        }
    }

    /// Set the device version reported in INIT responses
    pub fn with_version(mut self, version: DeviceVersion) -> Self {
        self.version = version;
        self
    }

    /// Check if a CID is the broadcast channel
    pub fn is_broadcast(cid: u32) -> bool {
        cid == BROADCAST_CID
    }

    /// Check if a CID has been allocated by this framer
    pub fn is_allocated(&self, cid: u32) -> bool {
        self.channels.contains(&cid)
    }

    /// Check if a CID is acceptable on an initialization packet
    /// (broadcast or allocated)
    pub fn is_valid(&self, cid: u32) -> bool {
        Self::is_broadcast(cid) || self.is_allocated(cid)
    }

    /// Split an outbound message into 64-byte packets
    pub fn emit<'a>(&self, cmd: Cmd, cid: u32, payload: &'a [u8]) -> Result<MessageSplitter<'a>> {
        split(cid, cmd, payload)
    }

    /// Feed one inbound packet into the reassembly state machine
    pub fn handle(&mut self, packet: &[u8]) -> Event {
        let now = self.clock.now();

        // Timeout recovery runs before the packet is interpreted, so the
        // new packet is free to start a fresh message.
        if let State::Assembling { begin, .. } = &self.state {
            if now.saturating_sub(*begin) > REASSEMBLY_TIMEOUT {
                debug!("dropping stalled assembly after {:?}", now - *begin);
                self.state = State::Idle;
            }
        }

        if matches!(self.state, State::Idle) {
            self.begin_message(packet, now)
        } else {
            self.continue_message(packet)
        }
    }

    /// Process a packet while idle: it must be an initialization packet on
    /// an acceptable channel
    fn begin_message(&mut self, packet: &[u8], now: Duration) -> Event {
        if packet.len() < INIT_HEADER_SIZE {
            return self.error_event(ErrorCode::Other);
        }
        if packet[4] & 0x80 == 0 {
            // Continuation packet with nothing to continue
            return self.error_event(ErrorCode::InvalidCmd);
        }

        let cid = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]);
        let cmd = match Cmd::from_u8(packet[4]) {
            Some(cmd) => cmd,
            None => return self.error_event(ErrorCode::InvalidCmd),
        };
        let bcnt = u16::from_be_bytes([packet[5], packet[6]]) as usize;

        if !self.is_valid(cid) {
            return self.error_event(ErrorCode::InvalidChannel);
        }
        if bcnt > MAX_MESSAGE_SIZE {
            return self.error_event(ErrorCode::InvalidLen);
        }

        let take = bcnt.min(packet.len() - INIT_HEADER_SIZE);
        let mut received = Vec::with_capacity(bcnt);
        received.extend_from_slice(&packet[INIT_HEADER_SIZE..INIT_HEADER_SIZE + take]);

        self.state = State::Assembling {
            cid,
            cmd,
            bcnt,
            received,
            seq_last: None,
            begin: now,
        };
        self.try_complete()
    }

    /// Process a packet while assembling: it must be the next continuation
    /// packet on the same channel
    fn continue_message(&mut self, packet: &[u8]) -> Event {
        if packet.len() < CONT_HEADER_SIZE {
            return self.error_event(ErrorCode::Other);
        }
        if packet[4] & 0x80 != 0 {
            // A second initialization packet mid-message
            return self.error_event(ErrorCode::InvalidCmd);
        }

        let packet_cid = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]);
        let seq = packet[4];

        let step = match &mut self.state {
            State::Assembling {
                cid,
                bcnt,
                received,
                seq_last,
                ..
            } => {
                let expected = seq_last.map_or(0, |last| last.wrapping_add(1));
                if packet_cid != *cid {
                    Err(ErrorCode::ChannelBusy)
                } else if seq != expected {
                    Err(ErrorCode::InvalidSeq)
                } else {
                    // Never take more than the message still owes, so the
                    // buffer cannot overshoot bcnt and trailing padding is
                    // ignored for free.
                    let remaining = *bcnt - received.len();
                    let take = remaining.min(packet.len() - CONT_HEADER_SIZE);
                    received.extend_from_slice(&packet[CONT_HEADER_SIZE..CONT_HEADER_SIZE + take]);
                    *seq_last = Some(seq);
                    Ok(())
                }
            }
            State::Idle => Err(ErrorCode::Other),
        };

        match step {
            Ok(()) => self.try_complete(),
            Err(code) => self.error_event(code),
        }
    }

    /// Deliver the message if all payload bytes have arrived
    fn try_complete(&mut self) -> Event {
        let done = matches!(
            &self.state,
            State::Assembling { bcnt, received, .. } if received.len() >= *bcnt
        );
        if !done {
            return Event::InProgress;
        }

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Assembling {
                cid, cmd, received, ..
            } => {
                if cmd == Cmd::Init {
                    // Broadcast requests allocate; requests on an existing
                    // channel just re-synchronize it.
                    return self.init_response(cid, &received);
                }

                // Every other command requires a previously allocated
                // channel; broadcast is INIT-only.
                if !self.is_allocated(cid) {
                    return self.error_for(cid, ErrorCode::InvalidChannel);
                }

                Event::Complete(Message::new(cid, cmd, received))
            }
            State::Idle => Event::InProgress,
        }
    }

    /// Synthesize the 17-byte INIT response, allocating a fresh channel
    /// when the request came in on broadcast
    fn init_response(&mut self, request_cid: u32, payload: &[u8]) -> Event {
        let cid = if Self::is_broadcast(request_cid) {
            self.allocate_cid()
        } else {
            request_cid
        };

        let mut data = Vec::with_capacity(INIT_RESPONSE_SIZE);

        // Nonce echo: first 8 bytes of the request, zero padded if short
        let mut nonce = [0u8; 8];
        let n = payload.len().min(8);
        nonce[..n].copy_from_slice(&payload[..n]);
        data.extend_from_slice(&nonce);

        data.extend_from_slice(&cid.to_be_bytes());
        data.push(PROTOCOL_VERSION);
        data.push(self.version.major);
        data.push(self.version.minor);
        data.push(self.version.build);
        data.push(CAPABILITIES);

        Event::Complete(Message::new(request_cid, Cmd::Init, data))
    }

    /// Draw a fresh channel ID, skipping zero, broadcast, and collisions
    fn allocate_cid(&mut self) -> u32 {
        loop {
            let cid = self.rng.next_u32();
            if cid != 0 && !Self::is_broadcast(cid) && self.channels.insert(cid) {
                debug!("allocated channel 0x{cid:08X}");
                return cid;
            }
        }
    }

    /// Emit an error against the in-progress channel (broadcast if idle)
    /// and reset the state machine
    fn error_event(&mut self, code: ErrorCode) -> Event {
        let cid = match &self.state {
            State::Assembling { cid, .. } => *cid,
            State::Idle => BROADCAST_CID,
        };
        self.error_for(cid, code)
    }

    /// Emit an error against a specific channel and reset the state machine
    fn error_for(&mut self, cid: u32, code: ErrorCode) -> Event {
        warn!("ctaphid error 0x{:02X} on cid 0x{cid:08X}", code.to_u8());
        self.state = State::Idle;
        Event::Error(Message::new(cid, Cmd::Error, vec![code.to_u8()]))
    }
}
