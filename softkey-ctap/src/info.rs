//! authenticatorGetInfo settings
//!
//! Everything the authenticator reports about itself: versions, AAGUID,
//! options, transports, algorithms and the long tail of optional CTAP 2.1
//! fields. Only populated entries appear in the response map; the key
//! assignments (0x01..0x18) are fixed by the specification.
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.2-rd-20230321/fido-client-to-authenticator-protocol-v2.2-rd-20230321.html#authenticatorGetInfo>

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::cbor::Value;

/// GetInfo response keys
mod keys {
    pub const VERSIONS: u64 = 0x01;
    pub const EXTENSIONS: u64 = 0x02;
    pub const AAGUID: u64 = 0x03;
    pub const OPTIONS: u64 = 0x04;
    pub const MAX_MSG_SIZE: u64 = 0x05;
    pub const PIN_UV_AUTH_PROTOCOLS: u64 = 0x06;
    pub const MAX_CREDENTIAL_COUNT_IN_LIST: u64 = 0x07;
    pub const MAX_CREDENTIAL_ID_LENGTH: u64 = 0x08;
    pub const TRANSPORTS: u64 = 0x09;
    pub const ALGORITHMS: u64 = 0x0A;
    pub const MAX_SERIALIZED_LARGE_BLOB_ARRAY: u64 = 0x0B;
    pub const FORCE_PIN_CHANGE: u64 = 0x0C;
    pub const MIN_PIN_LENGTH: u64 = 0x0D;
    pub const FIRMWARE_VERSION: u64 = 0x0E;
    pub const MAX_CRED_BLOB_LENGTH: u64 = 0x0F;
    pub const MAX_RPIDS_FOR_SET_MIN_PIN_LENGTH: u64 = 0x10;
    pub const PREFERRED_PLATFORM_UV_ATTEMPTS: u64 = 0x11;
    pub const UV_MODALITY: u64 = 0x12;
    pub const CERTIFICATIONS: u64 = 0x13;
    pub const REMAINING_DISCOVERABLE_CREDENTIALS: u64 = 0x14;
    pub const VENDOR_PROTOTYPE_CONFIG_COMMANDS: u64 = 0x15;
    pub const ATTESTATION_FORMATS: u64 = 0x16;
    pub const UV_COUNT_SINCE_LAST_PIN_ENTRY: u64 = 0x17;
    pub const LONG_TOUCH_FOR_RESET: u64 = 0x18;
}

/// AAGUID size in bytes
pub const AAGUID_SIZE: usize = 16;

/// One entry of the `algorithms` list: a COSE algorithm identifier paired
/// with the fixed credential type `"public-key"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyCredentialParameters {
    /// COSE algorithm identifier (e.g. -7 for ES256)
    pub alg: i64,
}

impl PublicKeyCredentialParameters {
    /// ECDSA over P-256 with SHA-256
    pub const ES256: Self = Self { alg: -7 };

    /// EdDSA
    pub const EDDSA: Self = Self { alg: -8 };

    fn to_value(self) -> Value {
        Value::Map(vec![
            (Value::from("alg"), Value::from(self.alg)),
            (Value::from("type"), Value::from("public-key")),
        ])
    }
}

/// Authenticator options advertised under getInfo key 0x04
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorOptions {
    /// Resident key (discoverable credential) support
    pub rk: bool,

    /// User presence support
    pub up: bool,

    /// Platform-attached authenticator
    pub plat: bool,

    /// makeCredential accepted without user verification
    pub make_cred_uv_not_rqd: bool,

    /// No makeCredential/getAssertion permissions with a client PIN
    pub no_mc_ga_permissions_with_client_pin: bool,
}

impl Default for AuthenticatorOptions {
    fn default() -> Self {
        Self {
            rk: false,
            up: true,
            plat: false,
            make_cred_uv_not_rqd: false,
            no_mc_ga_permissions_with_client_pin: false,
        }
    }
}

impl AuthenticatorOptions {
    fn to_value(self) -> Value {
        Value::Map(vec![
            (Value::from("rk"), Value::from(self.rk)),
            (Value::from("up"), Value::from(self.up)),
            (Value::from("plat"), Value::from(self.plat)),
            (
                Value::from("makeCredUvNotRqd"),
                Value::from(self.make_cred_uv_not_rqd),
            ),
            (
                Value::from("noMcGaPermissionsWithClientPin"),
                Value::from(self.no_mc_ga_permissions_with_client_pin),
            ),
        ])
    }
}

/// Authenticator settings backing the `authenticatorGetInfo` response
///
/// `Vec` fields are treated as absent when empty, `Option` fields when
/// `None`. Defaults describe a minimal USB FIDO 2.1 authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorInfo {
    /// Supported CTAP versions (key 0x01)
    pub versions: Vec<String>,

    /// Supported extensions (key 0x02)
    pub extensions: Vec<String>,

    /// Authenticator Attestation GUID (key 0x03)
    pub aaguid: [u8; AAGUID_SIZE],

    /// Authenticator options (key 0x04)
    pub options: AuthenticatorOptions,

    /// Maximum message size in bytes (key 0x05)
    pub max_msg_size: Option<u64>,

    /// Supported PIN/UV auth protocol versions (key 0x06)
    pub pin_uv_auth_protocols: Vec<u64>,

    /// Maximum credentials accepted in an allowList (key 0x07)
    pub max_credential_count_in_list: Option<u64>,

    /// Maximum credential ID length (key 0x08)
    pub max_credential_id_length: Option<u64>,

    /// Supported transports (key 0x09)
    pub transports: Vec<String>,

    /// Supported algorithms, most preferred first (key 0x0A)
    pub algorithms: Vec<PublicKeyCredentialParameters>,

    /// Maximum serialized large-blob array size (key 0x0B)
    pub max_serialized_large_blob_array: Option<u64>,

    /// PIN change required before use (key 0x0C)
    pub force_pin_change: Option<bool>,

    /// Current minimum PIN length (key 0x0D)
    pub min_pin_length: Option<u64>,

    /// Firmware version (key 0x0E)
    pub firmware_version: Option<u64>,

    /// Maximum credBlob length (key 0x0F)
    pub max_cred_blob_length: Option<u64>,

    /// Maximum RP IDs accepted by setMinPINLength (key 0x10)
    pub max_rpids_for_set_min_pin_length: Option<u64>,

    /// Preferred number of platform UV attempts (key 0x11)
    pub preferred_platform_uv_attempts: Option<u64>,

    /// User verification modality bitmap (key 0x12)
    pub uv_modality: Option<u64>,

    /// Certifications held by the authenticator (key 0x13)
    pub certifications: Vec<(String, u64)>,

    /// Remaining discoverable credential slots (key 0x14)
    pub remaining_discoverable_credentials: Option<u64>,

    /// Vendor prototype config subcommands (key 0x15)
    pub vendor_prototype_config_commands: Vec<u64>,

    /// Supported attestation statement formats (key 0x16)
    pub attestation_formats: Vec<String>,

    /// UV operations since the last PIN entry (key 0x17)
    pub uv_count_since_last_pin_entry: Option<u64>,

    /// Reset requires a long touch (key 0x18)
    pub long_touch_for_reset: Option<bool>,
}

impl Default for AuthenticatorInfo {
    fn default() -> Self {
        Self {
            versions: vec![String::from("FIDO_2_1")],
            extensions: Vec::new(),
            aaguid: [
                0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
                0x0D, 0x0E, 0x0F,
            ],
            options: AuthenticatorOptions::default(),
            max_msg_size: None,
            pin_uv_auth_protocols: Vec::new(),
            max_credential_count_in_list: None,
            max_credential_id_length: None,
            transports: vec![String::from("usb")],
            algorithms: vec![PublicKeyCredentialParameters::ES256],
            max_serialized_large_blob_array: None,
            force_pin_change: None,
            min_pin_length: None,
            firmware_version: None,
            max_cred_blob_length: None,
            max_rpids_for_set_min_pin_length: None,
            preferred_platform_uv_attempts: None,
            uv_modality: None,
            certifications: Vec::new(),
            remaining_discoverable_credentials: None,
            vendor_prototype_config_commands: Vec::new(),
            attestation_formats: Vec::new(),
            uv_count_since_last_pin_entry: None,
            long_touch_for_reset: None,
        }
    }
}

impl AuthenticatorInfo {
    /// Create settings with the default capabilities
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the AAGUID
    pub fn with_aaguid(mut self, aaguid: [u8; AAGUID_SIZE]) -> Self {
        self.aaguid = aaguid;
        self
    }

    /// Set the supported CTAP versions
    pub fn with_versions(mut self, versions: Vec<String>) -> Self {
        self.versions = versions;
        self
    }

    /// Set the supported extensions
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Set the authenticator options
    pub fn with_options(mut self, options: AuthenticatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the supported algorithms
    pub fn with_algorithms(mut self, algorithms: Vec<PublicKeyCredentialParameters>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Set the supported transports
    pub fn with_transports(mut self, transports: Vec<String>) -> Self {
        self.transports = transports;
        self
    }

    /// Set the maximum message size
    pub fn with_max_msg_size(mut self, size: u64) -> Self {
        self.max_msg_size = Some(size);
        self
    }

    /// Set the supported PIN/UV auth protocols
    pub fn with_pin_uv_auth_protocols(mut self, protocols: Vec<u64>) -> Self {
        self.pin_uv_auth_protocols = protocols;
        self
    }

    /// Set the firmware version
    pub fn with_firmware_version(mut self, version: u64) -> Self {
        self.firmware_version = Some(version);
        self
    }

    /// Set the minimum PIN length
    pub fn with_min_pin_length(mut self, length: u64) -> Self {
        self.min_pin_length = Some(length);
        self
    }

    /// Build the getInfo response map with only the populated entries
    ///
    /// Keys are unsigned integers, so the canonical encoder emits them in
    /// ascending order without further help.
    pub fn to_value(&self) -> Value {
        let mut entries: Vec<(Value, Value)> = Vec::new();

        if !self.versions.is_empty() {
            entries.push((
                Value::Unsigned(keys::VERSIONS),
                text_array(&self.versions),
            ));
        }
        if !self.extensions.is_empty() {
            entries.push((
                Value::Unsigned(keys::EXTENSIONS),
                text_array(&self.extensions),
            ));
        }
        entries.push((
            Value::Unsigned(keys::AAGUID),
            Value::Bytes(self.aaguid.to_vec()),
        ));
        entries.push((Value::Unsigned(keys::OPTIONS), self.options.to_value()));
        if let Some(size) = self.max_msg_size {
            entries.push((Value::Unsigned(keys::MAX_MSG_SIZE), Value::Unsigned(size)));
        }
        if !self.pin_uv_auth_protocols.is_empty() {
            entries.push((
                Value::Unsigned(keys::PIN_UV_AUTH_PROTOCOLS),
                unsigned_array(&self.pin_uv_auth_protocols),
            ));
        }
        if let Some(count) = self.max_credential_count_in_list {
            entries.push((
                Value::Unsigned(keys::MAX_CREDENTIAL_COUNT_IN_LIST),
                Value::Unsigned(count),
            ));
        }
        if let Some(length) = self.max_credential_id_length {
            entries.push((
                Value::Unsigned(keys::MAX_CREDENTIAL_ID_LENGTH),
                Value::Unsigned(length),
            ));
        }
        if !self.transports.is_empty() {
            entries.push((
                Value::Unsigned(keys::TRANSPORTS),
                text_array(&self.transports),
            ));
        }
        if !self.algorithms.is_empty() {
            entries.push((
                Value::Unsigned(keys::ALGORITHMS),
                Value::Array(self.algorithms.iter().map(|alg| alg.to_value()).collect()),
            ));
        }
        if let Some(size) = self.max_serialized_large_blob_array {
            entries.push((
                Value::Unsigned(keys::MAX_SERIALIZED_LARGE_BLOB_ARRAY),
                Value::Unsigned(size),
            ));
        }
        if let Some(force) = self.force_pin_change {
            entries.push((Value::Unsigned(keys::FORCE_PIN_CHANGE), Value::Bool(force)));
        }
        if let Some(length) = self.min_pin_length {
            entries.push((
                Value::Unsigned(keys::MIN_PIN_LENGTH),
                Value::Unsigned(length),
            ));
        }
        if let Some(version) = self.firmware_version {
            entries.push((
                Value::Unsigned(keys::FIRMWARE_VERSION),
                Value::Unsigned(version),
            ));
        }
        if let Some(length) = self.max_cred_blob_length {
            entries.push((
                Value::Unsigned(keys::MAX_CRED_BLOB_LENGTH),
                Value::Unsigned(length),
            ));
        }
        if let Some(count) = self.max_rpids_for_set_min_pin_length {
            entries.push((
                Value::Unsigned(keys::MAX_RPIDS_FOR_SET_MIN_PIN_LENGTH),
                Value::Unsigned(count),
            ));
        }
        if let Some(attempts) = self.preferred_platform_uv_attempts {
            entries.push((
                Value::Unsigned(keys::PREFERRED_PLATFORM_UV_ATTEMPTS),
                Value::Unsigned(attempts),
            ));
        }
        if let Some(modality) = self.uv_modality {
            entries.push((
                Value::Unsigned(keys::UV_MODALITY),
                Value::Unsigned(modality),
            ));
        }
        if !self.certifications.is_empty() {
            entries.push((
                Value::Unsigned(keys::CERTIFICATIONS),
                Value::Map(
                    self.certifications
                        .iter()
                        .map(|(name, level)| {
                            (Value::Text(name.clone()), Value::Unsigned(*level))
                        })
                        .collect(),
                ),
            ));
        }
        if let Some(remaining) = self.remaining_discoverable_credentials {
            entries.push((
                Value::Unsigned(keys::REMAINING_DISCOVERABLE_CREDENTIALS),
                Value::Unsigned(remaining),
            ));
        }
        if !self.vendor_prototype_config_commands.is_empty() {
            entries.push((
                Value::Unsigned(keys::VENDOR_PROTOTYPE_CONFIG_COMMANDS),
                unsigned_array(&self.vendor_prototype_config_commands),
            ));
        }
        if !self.attestation_formats.is_empty() {
            entries.push((
                Value::Unsigned(keys::ATTESTATION_FORMATS),
                text_array(&self.attestation_formats),
            ));
        }
        if let Some(count) = self.uv_count_since_last_pin_entry {
            entries.push((
                Value::Unsigned(keys::UV_COUNT_SINCE_LAST_PIN_ENTRY),
                Value::Unsigned(count),
            ));
        }
        if let Some(long_touch) = self.long_touch_for_reset {
            entries.push((
                Value::Unsigned(keys::LONG_TOUCH_FOR_RESET),
                Value::Bool(long_touch),
            ));
        }

        Value::Map(entries)
    }
}

fn text_array(items: &[String]) -> Value {
    Value::Array(items.iter().map(|item| Value::Text(item.clone())).collect())
}

fn unsigned_array(items: &[u64]) -> Value {
    Value::Array(items.iter().map(|&item| Value::Unsigned(item)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_default_entries() {
        let info = AuthenticatorInfo::default();
        let value = info.to_value();
        let entries = value.as_map().unwrap();

        // versions, aaguid, options, transports, algorithms
        assert_eq!(entries.len(), 5);
        assert!(value.map_get(&Value::Unsigned(0x01)).is_some());
        assert!(value.map_get(&Value::Unsigned(0x03)).is_some());
        assert!(value.map_get(&Value::Unsigned(0x04)).is_some());
        assert!(value.map_get(&Value::Unsigned(0x09)).is_some());
        assert!(value.map_get(&Value::Unsigned(0x0A)).is_some());
        // Unset fields stay absent
        assert!(value.map_get(&Value::Unsigned(0x05)).is_none());
        assert!(value.map_get(&Value::Unsigned(0x0D)).is_none());
    }

    #[test]
    fn test_default_versions_and_aaguid() {
        let info = AuthenticatorInfo::default();
        let value = info.to_value();

        let versions = value
            .map_get(&Value::Unsigned(0x01))
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(versions, &[Value::from("FIDO_2_1")]);

        let aaguid = value
            .map_get(&Value::Unsigned(0x03))
            .and_then(Value::as_bytes)
            .unwrap();
        assert_eq!(aaguid.len(), AAGUID_SIZE);
        assert_eq!(aaguid[0], 0x00);
        assert_eq!(aaguid[15], 0x0F);
    }

    #[test]
    fn test_algorithm_descriptor_shape() {
        let descriptor = PublicKeyCredentialParameters::ES256.to_value();
        assert_eq!(
            descriptor.map_get(&Value::from("alg")),
            Some(&Value::Negative(-7))
        );
        assert_eq!(
            descriptor.map_get(&Value::from("type")),
            Some(&Value::from("public-key"))
        );
    }

    #[test]
    fn test_optional_fields_appear_when_set() {
        let info = AuthenticatorInfo::new()
            .with_max_msg_size(7609)
            .with_pin_uv_auth_protocols(vec![2, 1])
            .with_min_pin_length(4)
            .with_firmware_version(0x010203)
            .with_extensions(vec!["hmac-secret".to_string()]);
        let value = info.to_value();

        assert_eq!(
            value.map_get(&Value::Unsigned(0x05)),
            Some(&Value::Unsigned(7609))
        );
        assert_eq!(
            value.map_get(&Value::Unsigned(0x06)),
            Some(&Value::Array(vec![
                Value::Unsigned(2),
                Value::Unsigned(1)
            ]))
        );
        assert_eq!(
            value.map_get(&Value::Unsigned(0x0D)),
            Some(&Value::Unsigned(4))
        );
        assert_eq!(
            value.map_get(&Value::Unsigned(0x0E)),
            Some(&Value::Unsigned(0x010203))
        );
        assert_eq!(
            value.map_get(&Value::Unsigned(0x02)),
            Some(&Value::Array(vec![Value::from("hmac-secret")]))
        );
    }

    #[test]
    fn test_high_keys() {
        let mut info = AuthenticatorInfo::new();
        info.certifications = vec![("FIPS-CMVP-2".to_string(), 2)];
        info.remaining_discoverable_credentials = Some(25);
        info.attestation_formats = vec!["packed".to_string()];
        info.long_touch_for_reset = Some(true);
        let value = info.to_value();

        assert!(value.map_get(&Value::Unsigned(0x13)).is_some());
        assert_eq!(
            value.map_get(&Value::Unsigned(0x14)),
            Some(&Value::Unsigned(25))
        );
        assert_eq!(
            value.map_get(&Value::Unsigned(0x16)),
            Some(&Value::Array(vec![Value::from("packed")]))
        );
        assert_eq!(
            value.map_get(&Value::Unsigned(0x18)),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_builders() {
        let info = AuthenticatorInfo::new()
            .with_aaguid([0xAA; 16])
            .with_versions(vec!["FIDO_2_0".to_string(), "FIDO_2_1".to_string()])
            .with_algorithms(vec![
                PublicKeyCredentialParameters::ES256,
                PublicKeyCredentialParameters::EDDSA,
            ])
            .with_transports(vec!["usb".to_string(), "nfc".to_string()]);

        assert_eq!(info.aaguid, [0xAA; 16]);
        assert_eq!(info.versions.len(), 2);
        assert_eq!(info.algorithms[1].alg, -8);
        assert_eq!(info.transports[1], "nfc");
    }
}
