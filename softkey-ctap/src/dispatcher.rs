//! CTAP2 command dispatch
//!
//! Routes decoded CBOR commands to registered handlers and serves
//! `authenticatorGetInfo` directly from the settings. The wire contract is
//! one command byte followed by a single CBOR-encoded argument; responses
//! are a status byte optionally followed by CBOR-encoded data.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use crate::cbor::{self, Value};
use crate::info::AuthenticatorInfo;
use crate::status::StatusCode;

/// CTAP2 command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    /// authenticatorMakeCredential
    MakeCredential = 0x01,

    /// authenticatorGetAssertion
    GetAssertion = 0x02,

    /// authenticatorGetInfo
    GetInfo = 0x04,

    /// authenticatorClientPIN
    ClientPin = 0x06,

    /// authenticatorReset
    Reset = 0x07,

    /// authenticatorGetNextAssertion
    GetNextAssertion = 0x08,

    /// authenticatorBioEnrollment
    BioEnrollment = 0x09,

    /// authenticatorCredentialManagement
    CredentialManagement = 0x0A,

    /// authenticatorSelection
    Selection = 0x0B,

    /// authenticatorLargeBlobs
    LargeBlobs = 0x0C,

    /// authenticatorConfig
    Config = 0x0D,
}

impl CommandCode {
    /// Convert from a command byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::MakeCredential),
            0x02 => Some(Self::GetAssertion),
            0x04 => Some(Self::GetInfo),
            0x06 => Some(Self::ClientPin),
            0x07 => Some(Self::Reset),
            0x08 => Some(Self::GetNextAssertion),
            0x09 => Some(Self::BioEnrollment),
            0x0A => Some(Self::CredentialManagement),
            0x0B => Some(Self::Selection),
            0x0C => Some(Self::LargeBlobs),
            0x0D => Some(Self::Config),
            _ => None,
        }
    }

    /// Convert to the command byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A CTAP2 command handler
///
/// Receives the decoded CBOR argument (an empty map when the request
/// carried none) and returns the complete response byte string, status
/// byte included. The dispatcher never rewrites handler output.
pub trait CommandHandler {
    /// Process one command invocation
    fn handle(&self, args: &Value) -> Vec<u8>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Value) -> Vec<u8> + Send + Sync,
{
    fn handle(&self, args: &Value) -> Vec<u8> {
        self(args)
    }
}

/// CTAP2 authenticator front end
///
/// Owns the getInfo settings and the handler table. Handlers are
/// registered once at startup; after that the dispatcher only reads its
/// state, so a shared reference can serve requests.
pub struct Authenticator {
    info: AuthenticatorInfo,
    handlers: BTreeMap<u8, Box<dyn CommandHandler + Send + Sync>>,
}

impl Authenticator {
    /// Create an authenticator with the given settings and no handlers
    pub fn new(info: AuthenticatorInfo) -> Self {
        Self {
            info,
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler for a command byte, replacing any previous one
    ///
    /// `authenticatorGetInfo` is always served from the settings and
    /// cannot be overridden.
    pub fn register(&mut self, command: u8, handler: impl CommandHandler + Send + Sync + 'static) {
        self.handlers.insert(command, Box::new(handler));
    }

    /// Get the settings
    pub fn info(&self) -> &AuthenticatorInfo {
        &self.info
    }

    /// Get the settings mutably (intended for setup, before serving)
    pub fn info_mut(&mut self) -> &mut AuthenticatorInfo {
        &mut self.info
    }

    /// Process one CTAP2 request: `command byte || CBOR(argument)`
    ///
    /// Protocol failures come back in-band as single-status-byte
    /// responses. The only `Err` this returns is a CBOR encode failure
    /// while building the getInfo response, which indicates a programmer
    /// error in the settings.
    pub fn cbor(&self, request: &[u8]) -> cbor::Result<Vec<u8>> {
        if request.is_empty() {
            return Ok(vec![StatusCode::InvalidLength.to_u8()]);
        }

        let command = request[0];
        let args = if request.len() > 1 {
            match cbor::decode_all(&request[1..]) {
                Ok(value) => value,
                Err(_) => return Ok(vec![StatusCode::InvalidCbor.to_u8()]),
            }
        } else {
            Value::Map(Vec::new())
        };

        if command == CommandCode::GetInfo.to_u8() {
            let mut response = vec![StatusCode::Success.to_u8()];
            response.extend_from_slice(&cbor::encode(&self.info.to_value())?);
            return Ok(response);
        }

        match self.handlers.get(&command) {
            Some(handler) => Ok(handler.handle(&args)),
            None => Ok(vec![StatusCode::InvalidCommand.to_u8()]),
        }
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(AuthenticatorInfo::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request() {
        let authenticator = Authenticator::default();
        assert_eq!(authenticator.cbor(&[]).unwrap(), vec![0x03]);
    }

    #[test]
    fn test_unknown_command() {
        let authenticator = Authenticator::default();
        assert_eq!(authenticator.cbor(&[0x42]).unwrap(), vec![0x01]);
    }

    #[test]
    fn test_malformed_argument() {
        let authenticator = Authenticator::default();
        // 0xFF is an indefinite-length break, not a valid argument
        assert_eq!(authenticator.cbor(&[0x01, 0xFF]).unwrap(), vec![0x12]);
        // Trailing bytes after a complete item are also rejected
        assert_eq!(
            authenticator.cbor(&[0x01, 0xA0, 0x00]).unwrap(),
            vec![0x12]
        );
    }

    #[test]
    fn test_handler_receives_decoded_argument() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x01, |args: &Value| {
            // Respond with the number of entries in the argument map
            let count = args.as_map().map(|entries| entries.len()).unwrap_or(99);
            vec![0x00, count as u8]
        });

        // {1: true} as the argument
        assert_eq!(
            authenticator.cbor(&[0x01, 0xA1, 0x01, 0xF5]).unwrap(),
            vec![0x00, 1]
        );
        // No argument bytes: the handler sees an empty map
        assert_eq!(authenticator.cbor(&[0x01]).unwrap(), vec![0x00, 0]);
    }

    #[test]
    fn test_handler_output_is_verbatim() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x0B, |_: &Value| vec![0x27]);

        // A handler's status byte passes through untouched
        assert_eq!(authenticator.cbor(&[0x0B]).unwrap(), vec![0x27]);
    }

    #[test]
    fn test_get_info_not_overridable() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x04, |_: &Value| vec![0x7F]);

        let response = authenticator.cbor(&[0x04]).unwrap();
        assert_eq!(response[0], 0x00);
        assert!(response.len() > 1);
    }

    #[test]
    fn test_get_info_default_bytes() {
        let authenticator = Authenticator::default();
        let response = authenticator.cbor(&[0x04]).unwrap();

        let mut expected = vec![0x00, 0xA5];
        // 0x01: versions = ["FIDO_2_1"]
        expected.extend_from_slice(&[0x01, 0x81, 0x68]);
        expected.extend_from_slice(b"FIDO_2_1");
        // 0x03: aaguid = 00..0F
        expected.extend_from_slice(&[0x03, 0x50]);
        expected.extend_from_slice(&[
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F,
        ]);
        // 0x04: options, canonically ordered by key
        expected.extend_from_slice(&[0x04, 0xA5, 0x62]);
        expected.extend_from_slice(b"rk");
        expected.push(0xF4);
        expected.push(0x62);
        expected.extend_from_slice(b"up");
        expected.push(0xF5);
        expected.push(0x64);
        expected.extend_from_slice(b"plat");
        expected.push(0xF4);
        expected.push(0x70);
        expected.extend_from_slice(b"makeCredUvNotRqd");
        expected.push(0xF4);
        expected.extend_from_slice(&[0x78, 0x1E]);
        expected.extend_from_slice(b"noMcGaPermissionsWithClientPin");
        expected.push(0xF4);
        // 0x09: transports = ["usb"]
        expected.extend_from_slice(&[0x09, 0x81, 0x63]);
        expected.extend_from_slice(b"usb");
        // 0x0A: algorithms = [{"alg": -7, "type": "public-key"}]
        expected.extend_from_slice(&[0x0A, 0x81, 0xA2, 0x63]);
        expected.extend_from_slice(b"alg");
        expected.push(0x26);
        expected.push(0x64);
        expected.extend_from_slice(b"type");
        expected.push(0x6A);
        expected.extend_from_slice(b"public-key");

        assert_eq!(response, expected);
    }

    #[test]
    fn test_get_info_round_trips_through_codec() {
        let authenticator = Authenticator::default();
        let response = authenticator.cbor(&[0x04]).unwrap();

        assert_eq!(response[0], 0x00);
        let decoded = cbor::decode_all(&response[1..]).unwrap();
        let versions = decoded
            .map_get(&Value::Unsigned(0x01))
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(versions, &[Value::from("FIDO_2_1")]);
    }

    #[test]
    fn test_command_code_conversion() {
        assert_eq!(CommandCode::from_u8(0x01), Some(CommandCode::MakeCredential));
        assert_eq!(CommandCode::from_u8(0x04), Some(CommandCode::GetInfo));
        assert_eq!(CommandCode::from_u8(0x0D), Some(CommandCode::Config));
        assert_eq!(CommandCode::from_u8(0x42), None);
        assert_eq!(CommandCode::GetAssertion.to_u8(), 0x02);
    }
}
