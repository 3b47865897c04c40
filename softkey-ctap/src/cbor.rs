//! CTAP2 canonical CBOR
//!
//! Encoder and decoder for the bounded CBOR subset used by CTAP2 messages:
//! integers, byte strings, text strings, arrays, maps and booleans, encoded
//! with the CTAP2 "deterministic encoding" rules (shortest heads, sorted
//! map keys). Tags, floats and indefinite-length items are out of profile.
//!
//! The encoder sorts map entries at emission time, so two logically equal
//! maps produce identical bytes no matter how their entries were inserted,
//! and `decode` followed by `encode` always yields the canonical form.
//!
//! Spec: <https://www.rfc-editor.org/rfc/rfc8949> and
//! <https://fidoalliance.org/specs/fido-v2.2-rd-20230321/fido-client-to-authenticator-protocol-v2.2-rd-20230321.html#ctap2-canonical-cbor-encoding-form>

use alloc::string::String;
use alloc::vec::Vec;

use core::cmp::Ordering;

#[cfg(feature = "std")]
use thiserror::Error;

#[cfg(not(feature = "std"))]
use core::fmt;

/// Maximum nesting depth accepted by the decoder
///
/// CTAP2 payloads are shallow; the cap keeps recursion bounded on
/// adversarial input.
const MAX_NESTING_DEPTH: usize = 16;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

/// CBOR codec errors
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CborError {
    /// Malformed input: truncation, reserved head codes, bad UTF-8,
    /// duplicate map keys, or nesting past the decoder limit
    #[error("invalid CBOR at byte {offset}")]
    InvalidCbor { offset: usize },

    /// Well-formed but out of profile: tags, floats, indefinite lengths
    #[error("unsupported CBOR construct at byte {offset}")]
    Unsupported { offset: usize },

    /// Integer outside the 64-bit encodable range
    #[error("integer out of range")]
    OutOfRange,
}

/// CBOR codec errors (no_std version)
#[cfg(not(feature = "std"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CborError {
    /// Malformed input: truncation, reserved head codes, bad UTF-8,
    /// duplicate map keys, or nesting past the decoder limit
    InvalidCbor { offset: usize },

    /// Well-formed but out of profile: tags, floats, indefinite lengths
    Unsupported { offset: usize },

    /// Integer outside the 64-bit encodable range
    OutOfRange,
}

// Manual Display implementation for no_std
#[cfg(not(feature = "std"))]
impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCbor { offset } => write!(f, "invalid CBOR at byte {}", offset),
            Self::Unsupported { offset } => {
                write!(f, "unsupported CBOR construct at byte {}", offset)
            }
            Self::OutOfRange => write!(f, "integer out of range"),
        }
    }
}

/// Result type for CBOR operations
pub type Result<T> = core::result::Result<T, CborError>;

/// An owned CBOR value
///
/// Maps are kept as insertion-ordered key/value sequences; canonical key
/// ordering is applied when the map is encoded, not when it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Major type 0: unsigned integer
    Unsigned(u64),

    /// Major type 1: negative integer, logical value in `[-2^64, -1]`
    Negative(i128),

    /// Major type 2: byte string
    Bytes(Vec<u8>),

    /// Major type 3: text string (always valid UTF-8)
    Text(String),

    /// Major type 4: array
    Array(Vec<Value>),

    /// Major type 5: map
    Map(Vec<(Value, Value)>),

    /// Major type 7: `true` / `false`
    Bool(bool),
}

impl Value {
    /// Get the unsigned integer value, if this is one
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Value::Unsigned(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the value as a signed integer, if it fits in an `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Unsigned(n) => i64::try_from(*n).ok(),
            Value::Negative(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Get the byte string, if this is one
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Get the text string, if this is one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the array elements, if this is an array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get the map entries, if this is a map
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get the boolean, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up a map entry by key
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::Unsigned(u64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Unsigned(u64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Unsigned(u64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Unsigned(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::from(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        if n < 0 {
            Value::Negative(i128::from(n))
        } else {
            Value::Unsigned(n as u64)
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(String::from(text))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Encode a value to canonical CBOR bytes
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

/// Decode one CBOR item from the front of `data`
///
/// Returns the decoded value and the number of bytes consumed. Trailing
/// bytes are left untouched; use [`decode_all`] to require full
/// consumption. Text strings are UTF-8 validated here, so a `Value::Text`
/// never carries malformed data.
pub fn decode(data: &[u8]) -> Result<(Value, usize)> {
    let mut reader = Reader { data, pos: 0 };
    let value = reader.value(0)?;
    Ok((value, reader.pos))
}

/// Decode a single CBOR item that must span the entire input
pub fn decode_all(data: &[u8]) -> Result<Value> {
    let (value, consumed) = decode(data)?;
    if consumed != data.len() {
        return Err(CborError::InvalidCbor { offset: consumed });
    }
    Ok(value)
}

/// Write the 1-byte head plus argument bytes, using the shortest form
fn write_head(major: u8, arg: u64, out: &mut Vec<u8>) {
    let mt = major << 5;
    if arg < 24 {
        out.push(mt | arg as u8);
    } else if arg <= 0xFF {
        out.push(mt | 24);
        out.push(arg as u8);
    } else if arg <= 0xFFFF {
        out.push(mt | 25);
        out.extend_from_slice(&(arg as u16).to_be_bytes());
    } else if arg <= 0xFFFF_FFFF {
        out.push(mt | 26);
        out.extend_from_slice(&(arg as u32).to_be_bytes());
    } else {
        out.push(mt | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Unsigned(n) => write_head(MAJOR_UNSIGNED, *n, out),
        Value::Negative(n) => {
            if !(-(1i128 << 64)..0).contains(n) {
                return Err(CborError::OutOfRange);
            }
            write_head(MAJOR_NEGATIVE, (-1 - n) as u64, out);
        }
        Value::Bytes(bytes) => {
            write_head(MAJOR_BYTES, bytes.len() as u64, out);
            out.extend_from_slice(bytes);
        }
        Value::Text(text) => {
            write_head(MAJOR_TEXT, text.len() as u64, out);
            out.extend_from_slice(text.as_bytes());
        }
        Value::Array(items) => {
            write_head(MAJOR_ARRAY, items.len() as u64, out);
            for item in items {
                write_value(item, out)?;
            }
        }
        Value::Map(entries) => {
            // Canonical order: major type first; integers by numeric
            // value within each sign, strings by length then bytes.
            let mut encoded = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let mut key_bytes = Vec::new();
                write_value(key, &mut key_bytes)?;
                let mut value_bytes = Vec::new();
                write_value(value, &mut value_bytes)?;
                encoded.push((key_bytes, value_bytes));
            }
            encoded.sort_by(|(a, _), (b, _)| canonical_key_order(a, b));

            write_head(MAJOR_MAP, encoded.len() as u64, out);
            for (key_bytes, value_bytes) in encoded {
                out.extend_from_slice(&key_bytes);
                out.extend_from_slice(&value_bytes);
            }
        }
        Value::Bool(b) => out.push(if *b { 0xF5 } else { 0xF4 }),
    }
    Ok(())
}

/// Canonical ordering of two encoded map keys
///
/// Smaller major type first; within a major type, shorter encoding then
/// byte-wise comparison, which for unsigned integers and strings matches
/// numeric and length-then-lexicographic order. Negative integers carry
/// `-1 - n` as their argument, so their numeric order (smaller first) is
/// the reverse of their encoded order.
fn canonical_key_order(a: &[u8], b: &[u8]) -> Ordering {
    let major = a[0] >> 5;
    major.cmp(&(b[0] >> 5)).then_with(|| {
        let encoded = a.len().cmp(&b.len()).then(a.cmp(b));
        if major == MAJOR_NEGATIVE {
            encoded.reverse()
        } else {
            encoded
        }
    })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(CborError::InvalidCbor { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(CborError::InvalidCbor { offset: self.pos })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read the head argument for additional-information code `info`
    fn argument(&mut self, info: u8, head: usize) -> Result<u64> {
        match info {
            0..=23 => Ok(u64::from(info)),
            24 => Ok(u64::from(self.byte()?)),
            25 => {
                let b = self.take(2)?;
                Ok(u64::from(u16::from_be_bytes([b[0], b[1]])))
            }
            26 => {
                let b = self.take(4)?;
                Ok(u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
            }
            27 => {
                let b = self.take(8)?;
                Ok(u64::from_be_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            // 28..30 are reserved, 31 is indefinite length
            28..=30 => Err(CborError::InvalidCbor { offset: head }),
            _ => Err(CborError::Unsupported { offset: head }),
        }
    }

    fn length(&mut self, info: u8, head: usize) -> Result<usize> {
        let arg = self.argument(info, head)?;
        usize::try_from(arg).map_err(|_| CborError::InvalidCbor { offset: head })
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING_DEPTH {
            return Err(CborError::InvalidCbor { offset: self.pos });
        }

        let head = self.pos;
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1F;

        match major {
            0 => Ok(Value::Unsigned(self.argument(info, head)?)),
            1 => {
                let arg = self.argument(info, head)?;
                Ok(Value::Negative(-1 - i128::from(arg)))
            }
            2 => {
                let len = self.length(info, head)?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            3 => {
                let len = self.length(info, head)?;
                let start = self.pos;
                let bytes = self.take(len)?;
                let text = core::str::from_utf8(bytes)
                    .map_err(|_| CborError::InvalidCbor { offset: start })?;
                Ok(Value::Text(String::from(text)))
            }
            4 => {
                let len = self.length(info, head)?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.value(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            5 => {
                let len = self.length(info, head)?;
                let mut entries: Vec<(Value, Value)> = Vec::new();
                for _ in 0..len {
                    let key_offset = self.pos;
                    let key = self.value(depth + 1)?;
                    if entries.iter().any(|(existing, _)| *existing == key) {
                        return Err(CborError::InvalidCbor { offset: key_offset });
                    }
                    let value = self.value(depth + 1)?;
                    entries.push((key, value));
                }
                Ok(Value::Map(entries))
            }
            6 => Err(CborError::Unsupported { offset: head }),
            _ => match initial {
                0xF4 => Ok(Value::Bool(false)),
                0xF5 => Ok(Value::Bool(true)),
                // Half/single/double floats and indefinite-length breaks
                // are recognized but out of profile
                _ if (25..=27).contains(&info) || info == 31 => {
                    Err(CborError::Unsupported { offset: head })
                }
                // Everything else in major type 7 (null, undefined, other
                // simple values) is rejected outright
                _ => Err(CborError::InvalidCbor { offset: head }),
            },
        }
    }
}
