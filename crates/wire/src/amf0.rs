//! Action message packet codec
//!
//! ## Layout
//!
//! ```text
//! u16 version
//! u16 header count
//!   u16 name length, name, u8 must-understand, u32 value length, value
//! u16 body count
//!   u16 target length, target, u16 response length, response,
//!   u32 value length, value
//! ```
//!
//! The value length is not trusted on decode (clients send `0xFFFFFFFF`);
//! encode writes the exact length.
//!
//! Every header and body value is framed as described by [`Framing`] and
//! gets its own AMF3 reference tables.

use crate::amf3::{Amf3Decoder, Amf3Encoder};
use crate::bytes::{ByteReader, ByteWriter};
use amfxml_core::{
    ActionMessage, AliasRegistry, Error, Framing, MessageBody, MessageHeader, Result, Value,
};
use tracing::debug;

/// AMF0 markers the envelope understands
pub mod marker {
    /// IEEE-754 double
    pub const NUMBER: u8 = 0x00;
    /// Boolean
    pub const BOOLEAN: u8 = 0x01;
    /// UTF-8 string with a u16 length
    pub const STRING: u8 = 0x02;
    /// `null`
    pub const NULL: u8 = 0x05;
    /// `undefined`
    pub const UNDEFINED: u8 = 0x06;
    /// Strict array with a u32 element count
    pub const STRICT_ARRAY: u8 = 0x0A;
    /// UTF-8 string with a u32 length
    pub const LONG_STRING: u8 = 0x0C;
    /// Switch to AMF3 for the next value
    pub const AVMPLUS: u8 = 0x11;
}

/// Decode a complete action message
pub fn decode_message(bytes: &[u8], registry: &AliasRegistry) -> Result<ActionMessage> {
    let mut reader = ByteReader::new(bytes);
    let version = reader.read_u16()?;

    let header_count = reader.read_u16()?;
    let mut headers = Vec::with_capacity((header_count as usize).min(reader.remaining()));
    for _ in 0..header_count {
        let name = read_short_utf8(&mut reader)?;
        let must_understand = reader.read_u8()? != 0;
        let _declared = reader.read_u32()?;
        let (framing, value) = read_framed(&mut reader, registry)?;
        headers.push(MessageHeader {
            name,
            must_understand,
            framing,
            value,
        });
    }

    let body_count = reader.read_u16()?;
    let mut bodies = Vec::with_capacity((body_count as usize).min(reader.remaining()));
    for _ in 0..body_count {
        let target_uri = read_short_utf8(&mut reader)?;
        let response_uri = read_short_utf8(&mut reader)?;
        let _declared = reader.read_u32()?;
        let (framing, data) = read_framed(&mut reader, registry)?;
        bodies.push(MessageBody {
            target_uri,
            response_uri,
            framing,
            data,
        });
    }

    if reader.remaining() > 0 {
        debug!(
            trailing = reader.remaining(),
            "ignoring bytes after action message"
        );
    }
    debug!(
        version,
        headers = headers.len(),
        bodies = bodies.len(),
        bytes = bytes.len(),
        "decoded action message"
    );

    Ok(ActionMessage {
        version,
        headers,
        bodies,
    })
}

/// Encode a complete action message
pub fn encode_message(message: &ActionMessage, registry: &AliasRegistry) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    writer.put_u16(message.version);

    writer.put_u16(count_u16("header count", message.headers.len())?);
    for header in &message.headers {
        write_short_utf8(&mut writer, "header name", &header.name)?;
        writer.put_u8(u8::from(header.must_understand));
        write_with_length(&mut writer, header.framing, &header.value, registry)?;
    }

    writer.put_u16(count_u16("body count", message.bodies.len())?);
    for body in &message.bodies {
        write_short_utf8(&mut writer, "target uri", &body.target_uri)?;
        write_short_utf8(&mut writer, "response uri", &body.response_uri)?;
        write_with_length(&mut writer, body.framing, &body.data, registry)?;
    }

    debug!(
        version = message.version,
        headers = message.headers.len(),
        bodies = message.bodies.len(),
        bytes = writer.len(),
        "encoded action message"
    );
    Ok(writer.into_inner())
}

fn count_u16(what: &'static str, n: usize) -> Result<u16> {
    u16::try_from(n).map_err(|_| Error::ValueTooLarge {
        what,
        len: n,
        max: u16::MAX as usize,
    })
}

fn read_short_utf8(reader: &mut ByteReader<'_>) -> Result<String> {
    let len = reader.read_u16()?;
    reader.read_utf8(len as usize)
}

fn write_short_utf8(writer: &mut ByteWriter, what: &'static str, s: &str) -> Result<()> {
    writer.put_u16(count_u16(what, s.len())?);
    writer.put_slice(s.as_bytes());
    Ok(())
}

/// Read one header or body value along with its framing
fn read_framed(reader: &mut ByteReader<'_>, registry: &AliasRegistry) -> Result<(Framing, Value)> {
    let at = reader.position();
    match reader.read_u8()? {
        marker::AVMPLUS => {
            let value = Amf3Decoder::new(reader, registry).read_value()?;
            Ok((Framing::Avmplus, value))
        }
        marker::STRICT_ARRAY => {
            let count = reader.read_u32()?;
            let mut items = Vec::with_capacity((count as usize).min(reader.remaining()));
            // elements of one array share reference tables
            let mut decoder = Amf3Decoder::new(reader, registry);
            for _ in 0..count {
                let at = decoder.reader().position();
                let item = match decoder.reader().read_u8()? {
                    marker::AVMPLUS => decoder.read_value()?,
                    other => read_amf0(decoder.reader(), other, at)?,
                };
                items.push(item);
            }
            Ok((Framing::StrictArray, Value::dense(items)))
        }
        other => Ok((Framing::Amf0, read_amf0(reader, other, at)?)),
    }
}

fn read_amf0(reader: &mut ByteReader<'_>, tag: u8, at: usize) -> Result<Value> {
    match tag {
        marker::NUMBER => Ok(Value::Double(reader.read_f64()?)),
        marker::BOOLEAN => Ok(Value::Boolean(reader.read_u8()? != 0)),
        marker::STRING => Ok(Value::String(read_short_utf8(reader)?)),
        marker::LONG_STRING => {
            let len = reader.read_u32()?;
            Ok(Value::String(reader.read_utf8(len as usize)?))
        }
        marker::NULL => Ok(Value::Null),
        marker::UNDEFINED => Ok(Value::Undefined),
        other => Err(Error::malformed(
            at,
            format!("unsupported AMF0 marker {:#04x}", other),
        )),
    }
}

fn write_with_length(
    writer: &mut ByteWriter,
    framing: Framing,
    value: &Value,
    registry: &AliasRegistry,
) -> Result<()> {
    let bytes = write_framed(framing, value, registry)?;
    let len = u32::try_from(bytes.len()).map_err(|_| Error::ValueTooLarge {
        what: "message value",
        len: bytes.len(),
        max: u32::MAX as usize,
    })?;
    writer.put_u32(len);
    writer.put_slice(&bytes);
    Ok(())
}

/// Frame one value; falls back to AMF3 when the framing cannot carry it
fn write_framed(framing: Framing, value: &Value, registry: &AliasRegistry) -> Result<Vec<u8>> {
    let mut encoder = Amf3Encoder::new(registry);
    let written = match (framing, value) {
        (Framing::StrictArray, Value::DenseArray(items)) => {
            write_strict_array(&mut encoder, &items.borrow())?;
            true
        }
        (Framing::Amf0, value) => write_amf0(encoder.writer(), value),
        _ => false,
    };
    if !written {
        if framing != Framing::Avmplus {
            debug!(
                framing = framing.as_str(),
                value = value.type_name(),
                "framing cannot carry value, writing it as AMF3"
            );
        }
        encoder.writer().put_u8(marker::AVMPLUS);
        encoder.write_value(value)?;
    }
    Ok(encoder.into_bytes())
}

fn write_strict_array(encoder: &mut Amf3Encoder<'_>, items: &[Value]) -> Result<()> {
    let count = u32::try_from(items.len()).map_err(|_| Error::ValueTooLarge {
        what: "strict array",
        len: items.len(),
        max: u32::MAX as usize,
    })?;
    encoder.writer().put_u8(marker::STRICT_ARRAY);
    encoder.writer().put_u32(count);
    for item in items {
        encoder.writer().put_u8(marker::AVMPLUS);
        encoder.write_value(item)?;
    }
    Ok(())
}

/// Write an AMF0 primitive; returns `false` when `value` has no AMF0 form
fn write_amf0(writer: &mut ByteWriter, value: &Value) -> bool {
    match value {
        Value::Double(d) => {
            writer.put_u8(marker::NUMBER);
            writer.put_f64(*d);
        }
        Value::Boolean(b) => {
            writer.put_u8(marker::BOOLEAN);
            writer.put_u8(u8::from(*b));
        }
        Value::String(s) => match u16::try_from(s.len()) {
            Ok(len) => {
                writer.put_u8(marker::STRING);
                writer.put_u16(len);
                writer.put_slice(s.as_bytes());
            }
            Err(_) => match u32::try_from(s.len()) {
                Ok(len) => {
                    writer.put_u8(marker::LONG_STRING);
                    writer.put_u32(len);
                    writer.put_slice(s.as_bytes());
                }
                Err(_) => return false,
            },
        },
        Value::Null => writer.put_u8(marker::NULL),
        Value::Undefined => writer.put_u8(marker::UNDEFINED),
        _ => return false,
    }
    true
}
