//! CTAP HID transport core
//!
//! This crate provides the transport half of a FIDO2 authenticator:
//! - CTAP HID packet format (64-byte frames, fragmentation)
//! - Message reassembly with channel allocation, sequencing and timeouts
//! - Deterministic message splitting for outbound traffic
//!
//! It performs no I/O: packets come in and go out as byte buffers, so the
//! crate works equally against USB HID, UHID, or an in-process test client.
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.2-rd-20230321/fido-client-to-authenticator-protocol-v2.2-rd-20230321.html#usb>

pub mod clock;
pub mod ctaphid;
pub mod error;
pub mod framer;

// Re-export commonly used types
pub use clock::{Clock, MonotonicClock};
pub use ctaphid::{
    split, Cmd, ErrorCode, Message, MessageSplitter, Packet, BROADCAST_CID, MAX_MESSAGE_SIZE,
    PACKET_SIZE,
};
pub use error::{Error, Result};
pub use framer::{DeviceVersion, Event, Framer, REASSEMBLY_TIMEOUT};
