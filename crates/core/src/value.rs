//! Value types for AMF3 object graphs
//!
//! This module defines the in-memory representation of anything the AMF3
//! codec can read or write.
//!
//! ## Identity
//!
//! Complex values (dates, byte arrays, XML, arrays, objects) live behind
//! `Rc` handles. Cloning a `Value` clones the handle, so two occurrences of
//! one instance inside a graph are two handles to the same allocation. The
//! codec's object reference table is what establishes and reproduces this
//! sharing. Arrays and objects use `Rc<RefCell<_>>` so that a decoder can
//! register a container before filling it, which is how self-referential
//! graphs are materialised.
//!
//! Graphs containing cycles are not reclaimed when dropped.
//!
//! ## Equality Rules
//!
//! - `PartialEq` is structural and terminates on cyclic graphs
//! - Different variants are NEVER equal: `Integer(1)` != `Double(1.0)`
//! - Doubles use IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - [`Value::ptr_eq`] compares identity instead of structure

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Smallest value an AMF3 integer can carry (-2^28)
pub const INTEGER_MIN: i32 = -(1 << 28);

/// Largest value an AMF3 integer can carry (2^28 - 1)
pub const INTEGER_MAX: i32 = (1 << 28) - 1;

/// Mutable container with shared identity
pub type Shared<T> = Rc<RefCell<T>>;

/// An AMF3 value
///
/// ## The Twelve Types
///
/// 1. `Undefined` - ActionScript `undefined`
/// 2. `Null` - ActionScript `null`
/// 3. `Boolean`
/// 4. `Integer` - 29-bit signed integer (see [`INTEGER_MIN`], [`INTEGER_MAX`])
/// 5. `Double` - 64-bit IEEE-754 floating point
/// 6. `String` - UTF-8 string
/// 7. `Date` - milliseconds since the Unix epoch
/// 8. `ByteArray` - opaque bytes
/// 9. `XmlDocument` - raw XML text
/// 10. `DenseArray` - ordered sequence
/// 11. `AssocArray` - string-keyed entries plus a dense tail
/// 12. `TypedObject` - object described by shared [`Traits`]
#[derive(Clone)]
pub enum Value {
    /// ActionScript `undefined`
    Undefined,

    /// ActionScript `null`
    Null,

    /// Boolean true or false
    Boolean(bool),

    /// 29-bit signed integer
    ///
    /// Values outside `INTEGER_MIN..=INTEGER_MAX` are carried on the wire
    /// as doubles.
    Integer(i32),

    /// 64-bit IEEE-754 floating point
    Double(f64),

    /// UTF-8 string
    String(String),

    /// Point in time
    Date(Rc<Date>),

    /// Opaque binary data
    ByteArray(Rc<Vec<u8>>),

    /// Raw XML text
    XmlDocument(Rc<XmlDocument>),

    /// Ordered sequence of values
    DenseArray(Shared<Vec<Value>>),

    /// Associative array with an optional dense tail
    AssocArray(Shared<AssocArray>),

    /// Object with declared traits
    TypedObject(Shared<TypedObject>),
}

/// Date payload: milliseconds since the Unix epoch, UTC
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Date {
    /// Milliseconds since 1970-01-01T00:00:00Z
    pub epoch_millis: f64,
}

impl Date {
    /// Create a date from epoch milliseconds
    pub fn new(epoch_millis: f64) -> Self {
        Date { epoch_millis }
    }

    /// Create a date from a chrono timestamp
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Date {
            epoch_millis: dt.timestamp_millis() as f64,
        }
    }

    /// Convert to a chrono timestamp, truncating sub-millisecond precision
    ///
    /// Returns `None` for non-finite or out-of-range values.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.epoch_millis.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis(self.epoch_millis.trunc() as i64)
    }
}

/// Which AMF3 XML marker a document was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum XmlFlavor {
    /// Legacy `flash.xml.XMLDocument` (marker 0x07)
    #[default]
    Document,
    /// E4X `XML` (marker 0x0B)
    E4x,
}

/// XML text together with its flavor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Marker the document travels under
    pub flavor: XmlFlavor,
    /// Raw XML text, never parsed
    pub text: String,
}

/// Associative array: ordered string-keyed entries plus a dense part
#[derive(Debug, Clone, Default)]
pub struct AssocArray {
    /// Keyed entries in wire order
    pub entries: Vec<(String, Value)>,
    /// Dense (index-addressed) tail
    pub dense: Vec<Value>,
}

impl AssocArray {
    /// Look up a keyed entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Shape record shared by all objects of one class and field set
///
/// Within one decode or encode call, objects of identical shape share one
/// `Rc<Traits>` and the codec writes the shape only once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Traits {
    /// Qualified class name; empty for anonymous objects
    pub class_name: String,
    /// Sealed member names in declared order
    pub sealed: Vec<String>,
    /// Whether dynamic members follow the sealed ones
    pub dynamic: bool,
    /// Whether the class serializes itself (see the codec's external layouts)
    pub externalizable: bool,
}

impl Traits {
    /// Traits of a plain anonymous dynamic object
    pub fn anonymous() -> Self {
        Traits {
            dynamic: true,
            ..Traits::default()
        }
    }

    /// Sealed, non-dynamic traits for a named class
    pub fn sealed(class_name: impl Into<String>, sealed: Vec<String>) -> Self {
        Traits {
            class_name: class_name.into(),
            sealed,
            dynamic: false,
            externalizable: false,
        }
    }

    /// Traits for an externalizable class
    pub fn externalizable(class_name: impl Into<String>) -> Self {
        Traits {
            class_name: class_name.into(),
            sealed: Vec::new(),
            dynamic: false,
            externalizable: true,
        }
    }

    /// Check whether the object has no class name
    pub fn is_anonymous(&self) -> bool {
        self.class_name.is_empty()
    }
}

/// Object instance
///
/// `fields` holds the sealed members first, in the order `traits.sealed`
/// declares them, followed by dynamic members. For externalizable objects
/// it holds the externalized members instead.
#[derive(Debug, Clone)]
pub struct TypedObject {
    /// Shape of this object
    pub traits: Rc<Traits>,
    /// Member values
    pub fields: Vec<(String, Value)>,
}

impl TypedObject {
    /// Create an object with no member values yet
    pub fn new(traits: Rc<Traits>) -> Self {
        TypedObject {
            traits,
            fields: Vec::new(),
        }
    }

    /// Qualified class name; empty for anonymous objects
    pub fn class_name(&self) -> &str {
        &self.traits.class_name
    }

    /// Look up a member by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Replace a member's value, or append it when absent
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Sealed members
    pub fn sealed_fields(&self) -> &[(String, Value)] {
        if self.traits.externalizable {
            return &[];
        }
        let n = self.traits.sealed.len().min(self.fields.len());
        &self.fields[..n]
    }

    /// Dynamic members
    pub fn dynamic_fields(&self) -> &[(String, Value)] {
        if self.traits.externalizable {
            return &[];
        }
        let n = self.traits.sealed.len().min(self.fields.len());
        &self.fields[n..]
    }
}

impl Value {
    /// Build a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build a date value
    pub fn date(epoch_millis: f64) -> Self {
        Value::Date(Rc::new(Date::new(epoch_millis)))
    }

    /// Build a byte array value
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::ByteArray(Rc::new(bytes.into()))
    }

    /// Build a legacy XML document value
    pub fn xml(text: impl Into<String>) -> Self {
        Value::XmlDocument(Rc::new(XmlDocument {
            flavor: XmlFlavor::Document,
            text: text.into(),
        }))
    }

    /// Build an E4X XML value
    pub fn e4x(text: impl Into<String>) -> Self {
        Value::XmlDocument(Rc::new(XmlDocument {
            flavor: XmlFlavor::E4x,
            text: text.into(),
        }))
    }

    /// Build a dense array
    pub fn dense(items: Vec<Value>) -> Self {
        Value::DenseArray(Rc::new(RefCell::new(items)))
    }

    /// Build an associative array
    pub fn assoc(entries: Vec<(String, Value)>, dense: Vec<Value>) -> Self {
        Value::AssocArray(Rc::new(RefCell::new(AssocArray { entries, dense })))
    }

    /// Build a sealed object of the given class
    ///
    /// Every field becomes a sealed member, in the order given.
    pub fn object<K: Into<String>>(class_name: &str, fields: Vec<(K, Value)>) -> Self {
        let fields: Vec<(String, Value)> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let sealed = fields.iter().map(|(k, _)| k.clone()).collect();
        let traits = Rc::new(Traits::sealed(class_name, sealed));
        Value::from_object(TypedObject { traits, fields })
    }

    /// Build an anonymous dynamic object
    pub fn anonymous<K: Into<String>>(fields: Vec<(K, Value)>) -> Self {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::from_object(TypedObject {
            traits: Rc::new(Traits::anonymous()),
            fields,
        })
    }

    /// Wrap an object in a fresh shared handle
    pub fn from_object(object: TypedObject) -> Self {
        Value::TypedObject(Rc::new(RefCell::new(object)))
    }

    /// Returns the type name as a string (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Date(_) => "Date",
            Value::ByteArray(_) => "ByteArray",
            Value::XmlDocument(_) => "XmlDocument",
            Value::DenseArray(_) => "DenseArray",
            Value::AssocArray(_) => "AssocArray",
            Value::TypedObject(_) => "TypedObject",
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as double
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the dense array handle
    pub fn as_dense(&self) -> Option<&Shared<Vec<Value>>> {
        match self {
            Value::DenseArray(a) => Some(a),
            _ => None,
        }
    }

    /// Try to get the object handle
    pub fn as_object(&self) -> Option<&Shared<TypedObject>> {
        match self {
            Value::TypedObject(o) => Some(o),
            _ => None,
        }
    }

    /// Identity of a complex value's allocation
    ///
    /// Returns `None` for scalars, which have no identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Date(d) => Some(Rc::as_ptr(d) as *const () as usize),
            Value::ByteArray(b) => Some(Rc::as_ptr(b) as *const () as usize),
            Value::XmlDocument(x) => Some(Rc::as_ptr(x) as *const () as usize),
            Value::DenseArray(a) => Some(Rc::as_ptr(a) as *const () as usize),
            Value::AssocArray(a) => Some(Rc::as_ptr(a) as *const () as usize),
            Value::TypedObject(o) => Some(Rc::as_ptr(o) as *const () as usize),
            _ => None,
        }
    }

    /// Check whether two values are handles to the same allocation
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Copy the whole graph into fresh allocations
    ///
    /// Sharing inside the graph is preserved: two handles to one instance
    /// in `self` become two handles to one (new) instance in the copy.
    pub fn deep_copy(&self) -> Value {
        let mut copies = HashMap::new();
        copy_value(self, &mut copies)
    }
}

fn copy_value(value: &Value, copies: &mut HashMap<usize, Value>) -> Value {
    if let Some(id) = value.identity() {
        if let Some(copy) = copies.get(&id) {
            return copy.clone();
        }
    }

    match value {
        Value::Date(d) => remember(value, copies, Value::Date(Rc::new(**d))),
        Value::ByteArray(b) => remember(value, copies, Value::ByteArray(Rc::new((**b).clone()))),
        Value::XmlDocument(x) => {
            remember(value, copies, Value::XmlDocument(Rc::new((**x).clone())))
        }
        Value::DenseArray(items) => {
            let fresh = Rc::new(RefCell::new(Vec::new()));
            remember(value, copies, Value::DenseArray(fresh.clone()));
            let copied = items.borrow().iter().map(|v| copy_value(v, copies)).collect();
            *fresh.borrow_mut() = copied;
            Value::DenseArray(fresh)
        }
        Value::AssocArray(array) => {
            let fresh = Rc::new(RefCell::new(AssocArray::default()));
            remember(value, copies, Value::AssocArray(fresh.clone()));
            let source = array.borrow();
            let entries = source
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), copy_value(v, copies)))
                .collect();
            let dense = source.dense.iter().map(|v| copy_value(v, copies)).collect();
            *fresh.borrow_mut() = AssocArray { entries, dense };
            Value::AssocArray(fresh)
        }
        Value::TypedObject(object) => {
            let source = object.borrow();
            let fresh = Rc::new(RefCell::new(TypedObject::new(source.traits.clone())));
            remember(value, copies, Value::TypedObject(fresh.clone()));
            let fields = source
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), copy_value(v, copies)))
                .collect();
            fresh.borrow_mut().fields = fields;
            Value::TypedObject(fresh)
        }
        scalar => scalar.clone(),
    }
}

fn remember(original: &Value, copies: &mut HashMap<usize, Value>, copy: Value) -> Value {
    if let Some(id) = original.identity() {
        copies.insert(id, copy.clone());
    }
    copy
}

// ============================================================================
// Structural equality (cycle-safe, no type coercion)
// ============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut visiting = HashSet::new();
        structural_eq(self, other, &mut visiting)
    }
}

fn structural_eq(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    if let (Some(ia), Some(ib)) = (a.identity(), b.identity()) {
        // A pair already under comparison is assumed equal; any difference
        // shows up elsewhere on the path.
        if !visiting.insert((ia, ib)) {
            return true;
        }
    }

    match (a, b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Double(x), Value::Double(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x.epoch_millis == y.epoch_millis,
        (Value::ByteArray(x), Value::ByteArray(y)) => x == y,
        (Value::XmlDocument(x), Value::XmlDocument(y)) => x == y,
        (Value::DenseArray(x), Value::DenseArray(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            seq_eq(&x, &y, visiting)
        }
        (Value::AssocArray(x), Value::AssocArray(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            pairs_eq(&x.entries, &y.entries, visiting) && seq_eq(&x.dense, &y.dense, visiting)
        }
        (Value::TypedObject(x), Value::TypedObject(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.traits == y.traits && pairs_eq(&x.fields, &y.fields, visiting)
        }
        // Different types: NEVER equal
        _ => false,
    }
}

fn seq_eq(a: &[Value], b: &[Value], visiting: &mut HashSet<(usize, usize)>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structural_eq(x, y, visiting))
}

fn pairs_eq(
    a: &[(String, Value)],
    b: &[(String, Value)],
    visiting: &mut HashSet<(usize, usize)>,
) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|((ka, va), (kb, vb))| ka == kb && structural_eq(va, vb, visiting))
}

impl PartialEq for AssocArray {
    fn eq(&self, other: &Self) -> bool {
        let mut visiting = HashSet::new();
        pairs_eq(&self.entries, &other.entries, &mut visiting)
            && seq_eq(&self.dense, &other.dense, &mut visiting)
    }
}

impl PartialEq for TypedObject {
    fn eq(&self, other: &Self) -> bool {
        let mut visiting = HashSet::new();
        self.traits == other.traits && pairs_eq(&self.fields, &other.fields, &mut visiting)
    }
}

// ============================================================================
// Debug (cycle-safe)
// ============================================================================

thread_local! {
    static DEBUG_PATH: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn debug_guarded(
    id: usize,
    f: &mut fmt::Formatter<'_>,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    if DEBUG_PATH.with(|path| path.borrow().contains(&id)) {
        return write!(f, "<cycle {:#x}>", id);
    }
    DEBUG_PATH.with(|path| path.borrow_mut().push(id));
    let result = body(f);
    DEBUG_PATH.with(|path| path.borrow_mut().pop());
    result
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Value::Double(d) => f.debug_tuple("Double").field(d).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Date(d) => f.debug_tuple("Date").field(&d.epoch_millis).finish(),
            Value::ByteArray(b) => f.debug_tuple("ByteArray").field(b).finish(),
            Value::XmlDocument(x) => f.debug_tuple("XmlDocument").field(x).finish(),
            Value::DenseArray(a) => debug_guarded(Rc::as_ptr(a) as *const () as usize, f, |f| {
                match a.try_borrow() {
                    Ok(items) => f.debug_tuple("DenseArray").field(&*items).finish(),
                    Err(_) => f.write_str("DenseArray(<borrowed>)"),
                }
            }),
            Value::AssocArray(a) => debug_guarded(Rc::as_ptr(a) as *const () as usize, f, |f| {
                match a.try_borrow() {
                    Ok(array) => f.debug_tuple("AssocArray").field(&*array).finish(),
                    Err(_) => f.write_str("AssocArray(<borrowed>)"),
                }
            }),
            Value::TypedObject(o) => debug_guarded(Rc::as_ptr(o) as *const () as usize, f, |f| {
                match o.try_borrow() {
                    Ok(object) => f.debug_tuple("TypedObject").field(&*object).finish(),
                    Err(_) => f.write_str("TypedObject(<borrowed>)"),
                }
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
