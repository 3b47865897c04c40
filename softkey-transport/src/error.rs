//! Transport layer error types

use thiserror::Error;

/// Transport layer result type
pub type Result<T> = std::result::Result<T, Error>;

/// Transport layer errors
///
/// Protocol violations discovered during reassembly are not reported through
/// this type; the framer answers them on the wire as `CTAPHID_ERROR`
/// messages. This enum covers the caller-facing operations: constructing
/// packets and splitting outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Packet buffer is not exactly 64 bytes
    #[error("invalid packet size")]
    InvalidPacket,

    /// Message payload exceeds the CTAP HID maximum (7609 bytes)
    #[error("message too large")]
    MessageTooLarge,
}
