//! AMF3 decoding
//!
//! References are resolved as soon as they are read, so the returned graph
//! never contains a dangling slot. Arrays and objects are registered in the
//! object table before their members are decoded; a member that refers back
//! to its container receives a handle to the same allocation.

use super::external;
use super::marker;
use super::MAX_DEPTH;
use crate::bytes::ByteReader;
use amfxml_core::{
    AliasRegistry, AssocArray, Error, Result, Traits, TypedObject, Value, XmlDocument, XmlFlavor,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Inline/reference header shared by strings, complex values and traits
enum Tag {
    /// Inline payload; carries the decoded length or flags
    Inline(u32),
    /// Index into a reference table
    Reference(usize),
}

/// Per-call AMF3 reader
pub(crate) struct Amf3Decoder<'r, 'a> {
    reader: &'r mut ByteReader<'a>,
    registry: &'r AliasRegistry,
    strings: Vec<String>,
    objects: Vec<Value>,
    traits: Vec<Rc<Traits>>,
    depth: usize,
}

impl<'r, 'a> Amf3Decoder<'r, 'a> {
    pub(crate) fn new(reader: &'r mut ByteReader<'a>, registry: &'r AliasRegistry) -> Self {
        Amf3Decoder {
            reader,
            registry,
            strings: Vec::new(),
            objects: Vec::new(),
            traits: Vec::new(),
            depth: 0,
        }
    }

    /// Underlying cursor, for AMF0 framing between AMF3 values
    pub(crate) fn reader(&mut self) -> &mut ByteReader<'a> {
        &mut *self.reader
    }

    pub(crate) fn registry(&self) -> &AliasRegistry {
        self.registry
    }

    /// Read one marker-prefixed value
    pub(crate) fn read_value(&mut self) -> Result<Value> {
        let at = self.reader.position();
        match self.reader.read_u8()? {
            marker::UNDEFINED => Ok(Value::Undefined),
            marker::NULL => Ok(Value::Null),
            marker::FALSE => Ok(Value::Boolean(false)),
            marker::TRUE => Ok(Value::Boolean(true)),
            marker::INTEGER => Ok(Value::Integer(self.read_i29()?)),
            marker::DOUBLE => Ok(Value::Double(self.reader.read_f64()?)),
            marker::STRING => Ok(Value::String(self.read_string()?)),
            marker::XML_DOC => self.read_xml(XmlFlavor::Document),
            marker::DATE => self.read_date(),
            marker::ARRAY => self.nested(at, Self::read_array),
            marker::OBJECT => self.nested(at, Self::read_object),
            marker::XML => self.read_xml(XmlFlavor::E4x),
            marker::BYTE_ARRAY => self.read_byte_array(),
            other => Err(Error::malformed(
                at,
                format!("unknown type marker {:#04x}", other),
            )),
        }
    }

    fn nested(&mut self, at: usize, read: fn(&mut Self) -> Result<Value>) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::malformed(
                at,
                format!("nesting deeper than {} levels", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    /// 29-bit integer, sign-extended from bit 28
    fn read_i29(&mut self) -> Result<i32> {
        let raw = self.reader.read_u29()?;
        if raw & 0x1000_0000 != 0 {
            Ok(raw as i32 - 0x2000_0000)
        } else {
            Ok(raw as i32)
        }
    }

    fn read_tag(&mut self) -> Result<Tag> {
        let header = self.reader.read_u29()?;
        if header & 1 == 0 {
            Ok(Tag::Reference((header >> 1) as usize))
        } else {
            Ok(Tag::Inline(header >> 1))
        }
    }

    /// Read a string body (no marker) through the string table
    pub(crate) fn read_string(&mut self) -> Result<String> {
        let at = self.reader.position();
        match self.read_tag()? {
            Tag::Reference(index) => self.strings.get(index).cloned().ok_or_else(|| {
                Error::malformed(
                    at,
                    format!(
                        "string reference {} out of range ({} entries)",
                        index,
                        self.strings.len()
                    ),
                )
            }),
            Tag::Inline(len) => {
                let s = self.reader.read_utf8(len as usize)?;
                if !s.is_empty() {
                    self.strings.push(s.clone());
                }
                Ok(s)
            }
        }
    }

    fn object_reference(&self, at: usize, index: usize) -> Result<Value> {
        self.objects.get(index).cloned().ok_or_else(|| {
            Error::malformed(
                at,
                format!(
                    "object reference {} out of range ({} entries)",
                    index,
                    self.objects.len()
                ),
            )
        })
    }

    fn register(&mut self, value: &Value) {
        self.objects.push(value.clone());
    }

    fn capacity_hint(&self, declared: u32) -> usize {
        (declared as usize).min(self.reader.remaining())
    }

    fn read_xml(&mut self, flavor: XmlFlavor) -> Result<Value> {
        let at = self.reader.position();
        match self.read_tag()? {
            Tag::Reference(index) => self.object_reference(at, index),
            Tag::Inline(len) => {
                let text = self.reader.read_utf8(len as usize)?;
                let value = Value::XmlDocument(Rc::new(XmlDocument { flavor, text }));
                self.register(&value);
                Ok(value)
            }
        }
    }

    fn read_date(&mut self) -> Result<Value> {
        let at = self.reader.position();
        match self.read_tag()? {
            Tag::Reference(index) => self.object_reference(at, index),
            Tag::Inline(_) => {
                let value = Value::date(self.reader.read_f64()?);
                self.register(&value);
                Ok(value)
            }
        }
    }

    fn read_byte_array(&mut self) -> Result<Value> {
        let at = self.reader.position();
        match self.read_tag()? {
            Tag::Reference(index) => self.object_reference(at, index),
            Tag::Inline(len) => {
                let value = Value::bytes(self.reader.take(len as usize)?.to_vec());
                self.register(&value);
                Ok(value)
            }
        }
    }

    fn read_array(&mut self) -> Result<Value> {
        let at = self.reader.position();
        let count = match self.read_tag()? {
            Tag::Reference(index) => return self.object_reference(at, index),
            Tag::Inline(count) => count,
        };

        let mut key = self.read_string()?;
        if key.is_empty() {
            let handle = Rc::new(RefCell::new(Vec::new()));
            let value = Value::DenseArray(handle.clone());
            self.register(&value);
            let items = self.read_dense(count)?;
            *handle.borrow_mut() = items;
            return Ok(value);
        }

        let handle = Rc::new(RefCell::new(AssocArray::default()));
        let value = Value::AssocArray(handle.clone());
        self.register(&value);
        let mut entries = Vec::new();
        while !key.is_empty() {
            let item = self.read_value()?;
            entries.push((key, item));
            key = self.read_string()?;
        }
        let dense = self.read_dense(count)?;
        *handle.borrow_mut() = AssocArray { entries, dense };
        Ok(value)
    }

    fn read_dense(&mut self, count: u32) -> Result<Vec<Value>> {
        let mut items = Vec::with_capacity(self.capacity_hint(count));
        for _ in 0..count {
            items.push(self.read_value()?);
        }
        Ok(items)
    }

    fn read_object(&mut self) -> Result<Value> {
        let at = self.reader.position();
        let header = self.reader.read_u29()?;
        if header & 0b1 == 0 {
            return self.object_reference(at, (header >> 1) as usize);
        }

        let traits = if header & 0b10 == 0 {
            let index = (header >> 2) as usize;
            self.traits.get(index).cloned().ok_or_else(|| {
                Error::malformed(
                    at,
                    format!(
                        "traits reference {} out of range ({} entries)",
                        index,
                        self.traits.len()
                    ),
                )
            })?
        } else {
            let traits = Rc::new(self.read_inline_traits(header)?);
            self.traits.push(traits.clone());
            traits
        };

        let handle = Rc::new(RefCell::new(TypedObject::new(traits.clone())));
        let value = Value::TypedObject(handle.clone());
        self.register(&value);

        let fields = if traits.externalizable {
            external::read_external(self, &traits, at)?
        } else {
            let mut fields = Vec::with_capacity(traits.sealed.len());
            for name in &traits.sealed {
                let member = self.read_value()?;
                fields.push((name.clone(), member));
            }
            if traits.dynamic {
                loop {
                    let key_at = self.reader.position();
                    let key = self.read_string()?;
                    if key.is_empty() {
                        break;
                    }
                    if traits.sealed.contains(&key) {
                        return Err(Error::malformed(
                            key_at,
                            format!("dynamic member {} shadows a sealed member", key),
                        ));
                    }
                    let member = self.read_value()?;
                    fields.push((key, member));
                }
            }
            fields
        };
        handle.borrow_mut().fields = fields;
        Ok(value)
    }

    fn read_inline_traits(&mut self, header: u32) -> Result<Traits> {
        let externalizable = header & 0b100 != 0;
        let dynamic = header & 0b1000 != 0;
        let count = header >> 4;

        let wire_name = self.read_string()?;
        let mut sealed = Vec::with_capacity(self.capacity_hint(count));
        for _ in 0..count {
            sealed.push(self.read_string()?);
        }

        Ok(Traits {
            class_name: self.registry.resolve_or_self(&wire_name).into_owned(),
            sealed,
            dynamic,
            externalizable,
        })
    }
}
