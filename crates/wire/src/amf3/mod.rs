//! AMF3 binary codec
//!
//! Reads and writes single AMF3 values. Every call gets fresh reference
//! tables (strings by content, complex values by identity, traits by shape)
//! which are dropped when the call returns.
//!
//! ## Type markers
//!
//! | Marker | Value |
//! |--------|-------|
//! | 0x00 | Undefined |
//! | 0x01 | Null |
//! | 0x02 / 0x03 | Boolean false / true |
//! | 0x04 | Integer (U29, sign-extended from bit 28) |
//! | 0x05 | Double |
//! | 0x06 | String |
//! | 0x07 | XmlDocument (legacy) |
//! | 0x08 | Date |
//! | 0x09 | DenseArray / AssocArray |
//! | 0x0A | TypedObject |
//! | 0x0B | XmlDocument (E4X) |
//! | 0x0C | ByteArray |
//!
//! Vector and dictionary markers (0x0D..=0x11) are rejected.

mod decode;
mod encode;
mod external;

pub(crate) use decode::Amf3Decoder;
pub(crate) use encode::Amf3Encoder;

use crate::bytes::ByteReader;
use amfxml_core::{AliasRegistry, Result, Value};
use tracing::debug;

/// Nesting limit for arrays and objects, in either direction
pub const MAX_DEPTH: usize = 512;

/// Largest byte or element length an inline header can declare (2^28 - 1)
pub const MAX_INLINE_LENGTH: usize = (1 << 28) - 1;

/// AMF3 type markers
pub mod marker {
    /// `undefined`
    pub const UNDEFINED: u8 = 0x00;
    /// `null`
    pub const NULL: u8 = 0x01;
    /// `false`
    pub const FALSE: u8 = 0x02;
    /// `true`
    pub const TRUE: u8 = 0x03;
    /// 29-bit integer
    pub const INTEGER: u8 = 0x04;
    /// IEEE-754 double
    pub const DOUBLE: u8 = 0x05;
    /// UTF-8 string
    pub const STRING: u8 = 0x06;
    /// Legacy XML document
    pub const XML_DOC: u8 = 0x07;
    /// Date
    pub const DATE: u8 = 0x08;
    /// Array
    pub const ARRAY: u8 = 0x09;
    /// Object
    pub const OBJECT: u8 = 0x0A;
    /// E4X XML
    pub const XML: u8 = 0x0B;
    /// Byte array
    pub const BYTE_ARRAY: u8 = 0x0C;
}

/// Decode one AMF3 value
///
/// Bytes after the value are ignored.
pub fn decode_value(bytes: &[u8], registry: &AliasRegistry) -> Result<Value> {
    let mut reader = ByteReader::new(bytes);
    let value = Amf3Decoder::new(&mut reader, registry).read_value()?;
    if reader.remaining() > 0 {
        debug!(
            trailing = reader.remaining(),
            "ignoring bytes after AMF3 value"
        );
    }
    Ok(value)
}

/// Encode one AMF3 value
pub fn encode_value(value: &Value, registry: &AliasRegistry) -> Result<Vec<u8>> {
    let mut encoder = Amf3Encoder::new(registry);
    encoder.write_value(value)?;
    Ok(encoder.into_bytes())
}
