//! AMF3 encoding
//!
//! Table slots are assigned in first-seen order, mirroring the order in
//! which a decoder fills its own tables, and the reference form is emitted
//! whenever a string, complex value or traits record has been seen before.

use super::external;
use super::marker;
use super::{MAX_DEPTH, MAX_INLINE_LENGTH};
use crate::bytes::ByteWriter;
use amfxml_core::{
    AliasRegistry, AssocArray, Error, Result, Traits, TypedObject, Value, XmlDocument, XmlFlavor,
    INTEGER_MAX, INTEGER_MIN,
};
use std::collections::HashMap;

/// Per-call AMF3 writer
pub(crate) struct Amf3Encoder<'r> {
    writer: ByteWriter,
    registry: &'r AliasRegistry,
    strings: HashMap<String, usize>,
    objects: HashMap<usize, usize>,
    /// Keyed by the traits as they appear on the wire (compressed class name)
    traits: HashMap<Traits, usize>,
    depth: usize,
}

impl<'r> Amf3Encoder<'r> {
    pub(crate) fn new(registry: &'r AliasRegistry) -> Self {
        Amf3Encoder {
            writer: ByteWriter::new(),
            registry,
            strings: HashMap::new(),
            objects: HashMap::new(),
            traits: HashMap::new(),
            depth: 0,
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    pub(crate) fn registry(&self) -> &AliasRegistry {
        self.registry
    }

    /// Raw writer, for flag bytes of externalizable layouts
    pub(crate) fn writer(&mut self) -> &mut ByteWriter {
        &mut self.writer
    }

    /// Write one marker-prefixed value
    pub(crate) fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Undefined => self.writer.put_u8(marker::UNDEFINED),
            Value::Null => self.writer.put_u8(marker::NULL),
            Value::Boolean(false) => self.writer.put_u8(marker::FALSE),
            Value::Boolean(true) => self.writer.put_u8(marker::TRUE),
            Value::Integer(i) => self.write_integer(*i)?,
            Value::Double(d) => {
                self.writer.put_u8(marker::DOUBLE);
                self.writer.put_f64(*d);
            }
            Value::String(s) => {
                self.writer.put_u8(marker::STRING);
                self.write_string(s)?;
            }
            Value::Date(date) => {
                self.writer.put_u8(marker::DATE);
                if self.write_reference(value)? {
                    return Ok(());
                }
                self.writer.put_u29(1)?;
                self.writer.put_f64(date.epoch_millis);
            }
            Value::ByteArray(bytes) => {
                self.writer.put_u8(marker::BYTE_ARRAY);
                if self.write_reference(value)? {
                    return Ok(());
                }
                self.write_inline_length("byte array", bytes.len())?;
                self.writer.put_slice(bytes);
            }
            Value::XmlDocument(xml) => self.write_xml(value, xml)?,
            Value::DenseArray(items) => {
                self.writer.put_u8(marker::ARRAY);
                if self.write_reference(value)? {
                    return Ok(());
                }
                self.nested(|enc| {
                    let items = items.borrow();
                    enc.write_inline_length("array", items.len())?;
                    enc.write_string("")?;
                    items.iter().try_for_each(|item| enc.write_value(item))
                })?;
            }
            Value::AssocArray(array) => {
                self.writer.put_u8(marker::ARRAY);
                if self.write_reference(value)? {
                    return Ok(());
                }
                self.nested(|enc| enc.write_assoc(&array.borrow()))?;
            }
            Value::TypedObject(object) => {
                self.writer.put_u8(marker::OBJECT);
                if self.write_reference(value)? {
                    return Ok(());
                }
                self.nested(|enc| enc.write_object(&object.borrow()))?;
            }
        }
        Ok(())
    }

    fn nested(&mut self, write: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::Unencodable(format!(
                "nesting deeper than {} levels",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        let result = write(self);
        self.depth -= 1;
        result
    }

    /// Integers outside the 29-bit range travel as doubles
    fn write_integer(&mut self, i: i32) -> Result<()> {
        if (INTEGER_MIN..=INTEGER_MAX).contains(&i) {
            self.writer.put_u8(marker::INTEGER);
            self.writer.put_u29((i as u32) & 0x1FFF_FFFF)
        } else {
            self.writer.put_u8(marker::DOUBLE);
            self.writer.put_f64(f64::from(i));
            Ok(())
        }
    }

    fn write_inline_length(&mut self, what: &'static str, len: usize) -> Result<()> {
        if len > MAX_INLINE_LENGTH {
            return Err(Error::ValueTooLarge {
                what,
                len,
                max: MAX_INLINE_LENGTH,
            });
        }
        self.writer.put_u29(((len as u32) << 1) | 1)
    }

    /// Write a string body (no marker) through the string table
    pub(crate) fn write_string(&mut self, s: &str) -> Result<()> {
        if s.is_empty() {
            return self.writer.put_u29(1);
        }
        if let Some(&index) = self.strings.get(s) {
            return self.writer.put_u29((index as u32) << 1);
        }
        self.write_inline_length("string", s.len())?;
        self.writer.put_slice(s.as_bytes());
        let index = self.strings.len();
        self.strings.insert(s.to_string(), index);
        Ok(())
    }

    /// Emit a reference if `value` was already written, else claim a slot
    ///
    /// Returns `true` when the reference form was written.
    fn write_reference(&mut self, value: &Value) -> Result<bool> {
        let Some(id) = value.identity() else {
            return Ok(false);
        };
        if let Some(&index) = self.objects.get(&id) {
            self.writer.put_u29((index as u32) << 1)?;
            return Ok(true);
        }
        let index = self.objects.len();
        self.objects.insert(id, index);
        Ok(false)
    }

    fn write_xml(&mut self, value: &Value, xml: &XmlDocument) -> Result<()> {
        self.writer.put_u8(match xml.flavor {
            XmlFlavor::Document => marker::XML_DOC,
            XmlFlavor::E4x => marker::XML,
        });
        if self.write_reference(value)? {
            return Ok(());
        }
        self.write_inline_length("xml", xml.text.len())?;
        self.writer.put_slice(xml.text.as_bytes());
        Ok(())
    }

    fn write_assoc(&mut self, array: &AssocArray) -> Result<()> {
        self.write_inline_length("array", array.dense.len())?;
        for (key, item) in &array.entries {
            if key.is_empty() {
                return Err(Error::Unencodable(
                    "associative array key must not be empty".to_string(),
                ));
            }
            self.write_string(key)?;
            self.write_value(item)?;
        }
        self.write_string("")?;
        array
            .dense
            .iter()
            .try_for_each(|item| self.write_value(item))
    }

    fn write_object(&mut self, object: &TypedObject) -> Result<()> {
        let traits = &object.traits;
        self.write_traits(traits)?;

        if traits.externalizable {
            return external::write_external(self, object);
        }

        for name in &traits.sealed {
            let member = object.get(name).ok_or_else(|| {
                Error::Unencodable(format!(
                    "{} is missing sealed member {}",
                    describe(traits),
                    name
                ))
            })?;
            self.write_value(member)?;
        }

        let mut extra = object
            .fields
            .iter()
            .filter(|(name, _)| !traits.sealed.contains(name))
            .peekable();
        if !traits.dynamic {
            if let Some((name, _)) = extra.peek() {
                return Err(Error::Unencodable(format!(
                    "{} is not dynamic but carries member {}",
                    describe(traits),
                    name
                )));
            }
            return Ok(());
        }
        for (name, member) in extra {
            if name.is_empty() {
                return Err(Error::Unencodable(
                    "dynamic member name must not be empty".to_string(),
                ));
            }
            self.write_string(name)?;
            self.write_value(member)?;
        }
        self.write_string("")
    }

    fn write_traits(&mut self, traits: &Traits) -> Result<()> {
        let wire = Traits {
            class_name: self
                .registry
                .compress_or_self(&traits.class_name)
                .into_owned(),
            ..traits.clone()
        };

        if let Some(&index) = self.traits.get(&wire) {
            return self.writer.put_u29(((index as u32) << 2) | 0b01);
        }

        let count = wire.sealed.len();
        if count > (MAX_INLINE_LENGTH >> 3) {
            return Err(Error::ValueTooLarge {
                what: "sealed member count",
                len: count,
                max: MAX_INLINE_LENGTH >> 3,
            });
        }
        let mut header = ((count as u32) << 4) | 0b11;
        if wire.externalizable {
            header |= 0b100;
        }
        if wire.dynamic {
            header |= 0b1000;
        }
        self.writer.put_u29(header)?;
        self.write_string(&wire.class_name)?;
        for name in &wire.sealed {
            self.write_string(name)?;
        }

        let index = self.traits.len();
        self.traits.insert(wire, index);
        Ok(())
    }
}

fn describe(traits: &Traits) -> String {
    if traits.is_anonymous() {
        "anonymous object".to_string()
    } else {
        format!("object of class {}", traits.class_name)
    }
}
