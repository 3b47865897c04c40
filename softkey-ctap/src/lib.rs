//! CTAP2 protocol core for FIDO2 authenticators
//!
//! This crate implements the message layer of a FIDO2 authenticator:
//! - Canonical CBOR encoding and decoding (the CTAP2 subset of RFC 8949)
//! - `authenticatorGetInfo` settings and response construction
//! - Command dispatch to pluggable handlers
//!
//! Credential storage, cryptography and user interaction stay with the
//! application: handlers receive the decoded CBOR argument and return the
//! finished response bytes. The `transport` feature adds a bridge that
//! plugs the dispatcher into `softkey-transport`.
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.2-rd-20230321/fido-client-to-authenticator-protocol-v2.2-rd-20230321.html>

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "transport")]
pub mod bridge;
pub mod cbor;
pub mod dispatcher;
pub mod info;
pub mod status;

// Re-export commonly used types
#[cfg(feature = "transport")]
pub use bridge::TransportBridge;
pub use cbor::{decode, decode_all, encode, CborError, Value};
pub use dispatcher::{Authenticator, CommandCode, CommandHandler};
pub use info::{
    AuthenticatorInfo, AuthenticatorOptions, PublicKeyCredentialParameters, AAGUID_SIZE,
};
pub use status::StatusCode;
