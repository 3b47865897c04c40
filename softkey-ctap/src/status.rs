//! CTAP status codes
//!
//! The single status byte that leads every CTAP2 response (0x00 on
//! success) and the shared CTAP1 error values. Codes are byte-exact per
//! the FIDO specification:
//! <https://fidoalliance.org/specs/fido-v2.2-rd-20230321/fido-client-to-authenticator-protocol-v2.2-rd-20230321.html#error-responses>

use core::fmt;

/// CTAP status codes
///
/// The low range (0x01..0x0B) doubles as the CTAP1 error set
/// (`CTAP1_ERR_INVALID_COMMAND`, `CTAP1_ERR_INVALID_LENGTH`, ...);
/// `Other` is `CTAP1_ERR_OTHER` and `InvalidCbor` is
/// `CTAP2_ERR_INVALID_CBOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    /// Successful completion of a command
    Success = 0x00,
    /// Invalid or unknown command
    InvalidCommand = 0x01,
    /// Invalid parameter in request
    InvalidParameter = 0x02,
    /// Invalid message or item length
    InvalidLength = 0x03,
    /// Invalid message sequencing
    InvalidSeq = 0x04,
    /// Message timed out
    Timeout = 0x05,
    /// Channel busy
    ChannelBusy = 0x06,
    /// Command requires channel lock
    LockRequired = 0x0A,
    /// Invalid channel
    InvalidChannel = 0x0B,
    /// CBOR item of an unexpected type
    CborUnexpectedType = 0x11,
    /// Invalid CBOR encoding
    InvalidCbor = 0x12,
    /// Missing required parameter
    MissingParameter = 0x14,
    /// Limit exceeded
    LimitExceeded = 0x15,
    /// Unsupported extension
    UnsupportedExtension = 0x16,
    /// Credential excluded (already exists)
    CredentialExcluded = 0x19,
    /// Processing (waiting for user presence)
    Processing = 0x21,
    /// Invalid credential
    InvalidCredential = 0x22,
    /// User action pending
    UserActionPending = 0x23,
    /// Operation pending
    OperationPending = 0x24,
    /// No operations pending
    NoOperations = 0x25,
    /// Unsupported algorithm
    UnsupportedAlgorithm = 0x26,
    /// Operation denied by user
    OperationDenied = 0x27,
    /// Key store full
    KeyStoreFull = 0x28,
    /// Not busy
    NotBusy = 0x29,
    /// No operation pending
    NoOperationPending = 0x2A,
    /// Unsupported option
    UnsupportedOption = 0x2B,
    /// Invalid option
    InvalidOption = 0x2C,
    /// Keepalive cancel
    KeepaliveCancel = 0x2D,
    /// No credentials found
    NoCredentials = 0x2E,
    /// User action timeout
    UserActionTimeout = 0x2F,
    /// Not allowed
    NotAllowed = 0x30,
    /// PIN invalid
    PinInvalid = 0x31,
    /// PIN blocked
    PinBlocked = 0x32,
    /// PIN/UV auth parameter invalid
    PinAuthInvalid = 0x33,
    /// PIN/UV auth blocked
    PinAuthBlocked = 0x34,
    /// PIN not set
    PinNotSet = 0x35,
    /// PIN required for this operation
    PinRequired = 0x36,
    /// PIN policy violation
    PinPolicyViolation = 0x37,
    /// PIN token expired
    PinTokenExpired = 0x38,
    /// Request too large
    RequestTooLarge = 0x39,
    /// Action timeout
    ActionTimeout = 0x3A,
    /// User presence required
    UpRequired = 0x3B,
    /// User verification blocked
    UvBlocked = 0x3C,
    /// Integrity failure
    IntegrityFailure = 0x3D,
    /// Invalid subcommand
    InvalidSubcommand = 0x3E,
    /// User verification invalid
    UvInvalid = 0x3F,
    /// Unauthorized permission
    UnauthorizedPermission = 0x40,
    /// PIN/UV auth token required
    PuatRequired = 0x41,
    /// Other unspecified error
    Other = 0x7F,
}

impl StatusCode {
    /// Convert status code to its byte value
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Create a status code from a byte value; unknown bytes collapse
    /// to [`StatusCode::Other`]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::InvalidCommand,
            0x02 => Self::InvalidParameter,
            0x03 => Self::InvalidLength,
            0x04 => Self::InvalidSeq,
            0x05 => Self::Timeout,
            0x06 => Self::ChannelBusy,
            0x0A => Self::LockRequired,
            0x0B => Self::InvalidChannel,
            0x11 => Self::CborUnexpectedType,
            0x12 => Self::InvalidCbor,
            0x14 => Self::MissingParameter,
            0x15 => Self::LimitExceeded,
            0x16 => Self::UnsupportedExtension,
            0x19 => Self::CredentialExcluded,
            0x21 => Self::Processing,
            0x22 => Self::InvalidCredential,
            0x23 => Self::UserActionPending,
            0x24 => Self::OperationPending,
            0x25 => Self::NoOperations,
            0x26 => Self::UnsupportedAlgorithm,
            0x27 => Self::OperationDenied,
            0x28 => Self::KeyStoreFull,
            0x29 => Self::NotBusy,
            0x2A => Self::NoOperationPending,
            0x2B => Self::UnsupportedOption,
            0x2C => Self::InvalidOption,
            0x2D => Self::KeepaliveCancel,
            0x2E => Self::NoCredentials,
            0x2F => Self::UserActionTimeout,
            0x30 => Self::NotAllowed,
            0x31 => Self::PinInvalid,
            0x32 => Self::PinBlocked,
            0x33 => Self::PinAuthInvalid,
            0x34 => Self::PinAuthBlocked,
            0x35 => Self::PinNotSet,
            0x36 => Self::PinRequired,
            0x37 => Self::PinPolicyViolation,
            0x38 => Self::PinTokenExpired,
            0x39 => Self::RequestTooLarge,
            0x3A => Self::ActionTimeout,
            0x3B => Self::UpRequired,
            0x3C => Self::UvBlocked,
            0x3D => Self::IntegrityFailure,
            0x3E => Self::InvalidSubcommand,
            0x3F => Self::UvInvalid,
            0x40 => Self::UnauthorizedPermission,
            0x41 => Self::PuatRequired,
            _ => Self::Other,
        }
    }

    /// Check if this is the success status
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02X})", self, self.to_u8())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StatusCode {}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> u8 {
        status.to_u8()
    }
}

impl From<u8> for StatusCode {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_values() {
        assert_eq!(StatusCode::Success.to_u8(), 0x00);
        assert_eq!(StatusCode::InvalidCommand.to_u8(), 0x01);
        assert_eq!(StatusCode::InvalidLength.to_u8(), 0x03);
        assert_eq!(StatusCode::InvalidCbor.to_u8(), 0x12);
        assert_eq!(StatusCode::Other.to_u8(), 0x7F);
    }

    #[test]
    fn test_round_trip() {
        for byte in 0x00..=0x41u8 {
            let status = StatusCode::from_u8(byte);
            if status != StatusCode::Other {
                assert_eq!(status.to_u8(), byte);
            }
        }
    }

    #[test]
    fn test_unknown_byte_collapses_to_other() {
        assert_eq!(StatusCode::from_u8(0xEE), StatusCode::Other);
        assert_eq!(StatusCode::from_u8(0x07), StatusCode::Other);
    }

    #[test]
    fn test_is_success() {
        assert!(StatusCode::Success.is_success());
        assert!(!StatusCode::InvalidCommand.is_success());
    }
}
