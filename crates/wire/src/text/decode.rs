//! Text tree → value

use super::{class_from_text, tag, TextTree};
use crate::amf3::MAX_DEPTH;
use amfxml_core::{
    ActionMessage, AliasRegistry, AssocArray, Date, Error, Framing, MessageBody, MessageHeader,
    Result, Traits, TypedObject, Value, AMF3_VERSION, INTEGER_MAX, INTEGER_MIN,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Number};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type Node = Map<String, TextTree>;

/// Map a text tree back to a value
pub fn tree_to_value(tree: &TextTree, registry: &AliasRegistry) -> Result<Value> {
    TreeReader::new(registry).read(tree)
}

/// Map a message tree back to a message
///
/// A missing `version` defaults to 3; missing `headers` or `bodies` mean
/// none.
pub fn tree_to_message(tree: &TextTree, registry: &AliasRegistry) -> Result<ActionMessage> {
    let node = tree
        .as_object()
        .ok_or_else(|| Error::unparseable("message must be an object"))?;

    let version = match node.get("version") {
        None => AMF3_VERSION,
        Some(v) => v
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| Error::unparseable(format!("invalid message version {}", v)))?,
    };

    let mut message = ActionMessage::new(version);
    for header in list(node, "headers")? {
        let header = header
            .as_object()
            .ok_or_else(|| Error::unparseable("header must be an object"))?;
        message.headers.push(MessageHeader {
            name: string_field(header, "name")?,
            must_understand: match header.get("mustUnderstand") {
                None => false,
                Some(v) => v
                    .as_bool()
                    .ok_or_else(|| Error::unparseable("mustUnderstand must be a boolean"))?,
            },
            framing: framing_field(header)?,
            value: tree_to_value(required(header, "value")?, registry)?,
        });
    }
    for body in list(node, "bodies")? {
        let body = body
            .as_object()
            .ok_or_else(|| Error::unparseable("body must be an object"))?;
        message.bodies.push(MessageBody {
            target_uri: string_field(body, "targetUri")?,
            response_uri: string_field(body, "responseUri")?,
            framing: framing_field(body)?,
            data: tree_to_value(required(body, "data")?, registry)?,
        });
    }
    Ok(message)
}

fn list<'t>(node: &'t Node, key: &str) -> Result<&'t [TextTree]> {
    match node.get(key) {
        None => Ok(&[]),
        Some(TextTree::Array(items)) => Ok(items),
        Some(_) => Err(Error::unparseable(format!("{} must be an array", key))),
    }
}

fn required<'t>(node: &'t Node, key: &str) -> Result<&'t TextTree> {
    node.get(key)
        .ok_or_else(|| Error::unparseable(format!("missing {}", key)))
}

fn string_field(node: &Node, key: &str) -> Result<String> {
    required(node, key)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::unparseable(format!("{} must be a string", key)))
}

fn framing_field(node: &Node) -> Result<Framing> {
    match node.get("framing") {
        None => Ok(Framing::Avmplus),
        Some(v) => v
            .as_str()
            .and_then(Framing::parse)
            .ok_or_else(|| Error::unparseable(format!("unknown framing {}", v))),
    }
}

/// Which wrapper a `$`-tagged node is
#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Ref,
    Undefined,
    F64,
    Date,
    Bytes,
    Xml,
    E4x,
    Assoc,
    Array,
    Object,
}

impl Kind {
    fn of(node: &Node) -> Result<Kind> {
        let has = |key: &str| node.contains_key(key);
        let kind = if has(tag::REF) {
            Kind::Ref
        } else if has(tag::UNDEFINED) {
            Kind::Undefined
        } else if has(tag::F64) {
            Kind::F64
        } else if has(tag::DATE) {
            Kind::Date
        } else if has(tag::BYTES) {
            Kind::Bytes
        } else if has(tag::XML) {
            Kind::Xml
        } else if has(tag::E4X) {
            Kind::E4x
        } else if has(tag::ASSOC) {
            Kind::Assoc
        } else if has(tag::ARRAY) {
            Kind::Array
        } else if has(tag::CLASS) || has(tag::SEALED) || has(tag::DYNAMIC) || has(tag::EXTERNAL)
        {
            Kind::Object
        } else {
            return Err(Error::unparseable(format!(
                "unrecognised node with keys {:?}",
                node.keys().collect::<Vec<_>>()
            )));
        };

        for key in node.keys() {
            if !kind.allows(key) {
                return Err(Error::unparseable(format!(
                    "unexpected key {:?} in {:?} node",
                    key, kind
                )));
            }
        }
        Ok(kind)
    }

    fn allows(self, key: &str) -> bool {
        let own: &[&str] = match self {
            Kind::Ref => return key == tag::REF,
            Kind::Undefined => return key == tag::UNDEFINED,
            Kind::F64 => return key == tag::F64,
            Kind::Date => &[tag::DATE],
            Kind::Bytes => &[tag::BYTES],
            Kind::Xml => &[tag::XML],
            Kind::E4x => &[tag::E4X],
            Kind::Assoc => &[tag::ASSOC, tag::ARRAY],
            Kind::Array => &[tag::ARRAY],
            Kind::Object => &[
                tag::CLASS,
                tag::SEALED,
                tag::DYNAMIC,
                tag::EXTERNAL,
                tag::TRAITS,
            ],
        };
        key == tag::ID || own.contains(&key)
    }
}

struct TreeReader<'r> {
    registry: &'r AliasRegistry,
    ids: HashMap<u64, Value>,
    /// Interned traits, so objects of one shape share a record
    traits: HashMap<Traits, Rc<Traits>>,
    depth: usize,
}

impl<'r> TreeReader<'r> {
    fn new(registry: &'r AliasRegistry) -> Self {
        TreeReader {
            registry,
            ids: HashMap::new(),
            traits: HashMap::new(),
            depth: 0,
        }
    }

    fn read(&mut self, tree: &TextTree) -> Result<Value> {
        match tree {
            TextTree::Null => Ok(Value::Null),
            TextTree::Bool(b) => Ok(Value::Boolean(*b)),
            TextTree::Number(n) => Ok(number(n)),
            TextTree::String(s) => Ok(Value::String(s.clone())),
            TextTree::Array(items) => self.nested(|reader| {
                let items = items
                    .iter()
                    .map(|item| reader.read(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::dense(items))
            }),
            TextTree::Object(node) if node.keys().all(|k| !k.starts_with('$')) => {
                self.nested(|reader| {
                    let traits = reader.intern(Traits::anonymous());
                    let handle = Rc::new(RefCell::new(TypedObject::new(traits)));
                    let fields = reader.read_members(node)?;
                    handle.borrow_mut().fields = fields;
                    Ok(Value::TypedObject(handle))
                })
            }
            TextTree::Object(node) => self.read_tagged(node),
        }
    }

    /// Count one container level, matching the AMF3 codec's limit
    fn nested(&mut self, read: impl FnOnce(&mut Self) -> Result<Value>) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::unparseable(format!(
                "nesting deeper than {} levels",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    fn read_tagged(&mut self, node: &Node) -> Result<Value> {
        let kind = Kind::of(node)?;
        let value = match kind {
            Kind::Ref => {
                let id = id_of(&node[tag::REF])?;
                return self
                    .ids
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::unparseable(format!("reference to unknown id {}", id)));
            }
            Kind::Undefined => {
                return match node[tag::UNDEFINED] {
                    TextTree::Bool(true) => Ok(Value::Undefined),
                    ref other => Err(Error::unparseable(format!(
                        "$undefined must be true, got {}",
                        other
                    ))),
                }
            }
            Kind::F64 => return Ok(Value::Double(special_double(&node[tag::F64])?)),
            Kind::Date => Value::Date(Rc::new(date(&node[tag::DATE])?)),
            Kind::Bytes => {
                let text = node[tag::BYTES]
                    .as_str()
                    .ok_or_else(|| Error::unparseable("$bytes must be a base64 string"))?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(text)
                    .map_err(|e| Error::unparseable(format!("invalid base64: {}", e)))?;
                Value::bytes(bytes)
            }
            Kind::Xml => Value::xml(text_of(node, tag::XML)?),
            Kind::E4x => Value::e4x(text_of(node, tag::E4X)?),
            Kind::Array => {
                return self.nested(|reader| {
                    let handle = Rc::new(RefCell::new(Vec::new()));
                    let value = Value::DenseArray(handle.clone());
                    reader.register(node, &value)?;
                    let items = reader.read_items(&node[tag::ARRAY])?;
                    *handle.borrow_mut() = items;
                    Ok(value)
                });
            }
            Kind::Assoc => return self.nested(|reader| reader.read_assoc(node)),
            Kind::Object => return self.nested(|reader| reader.read_object(node)),
        };
        self.register(node, &value)?;
        Ok(value)
    }

    fn read_assoc(&mut self, node: &Node) -> Result<Value> {
        let handle = Rc::new(RefCell::new(AssocArray::default()));
        let value = Value::AssocArray(handle.clone());
        self.register(node, &value)?;
        let entries = match &node[tag::ASSOC] {
            TextTree::Object(members) => self.read_members(members)?,
            _ => return Err(Error::unparseable("$assoc must be an object")),
        };
        let dense = match node.get(tag::ARRAY) {
            Some(items) => self.read_items(items)?,
            None => Vec::new(),
        };
        *handle.borrow_mut() = AssocArray { entries, dense };
        Ok(value)
    }

    fn read_object(&mut self, node: &Node) -> Result<Value> {
        let class_name = match node.get(tag::CLASS) {
            None => String::new(),
            Some(TextTree::String(code)) => class_from_text(code, self.registry),
            Some(_) => return Err(Error::unparseable("$class must be a string")),
        };

        let external = node.get(tag::EXTERNAL);
        if external.is_some() && (node.contains_key(tag::SEALED) || node.contains_key(tag::DYNAMIC))
        {
            return Err(Error::unparseable(
                "$external cannot be combined with $sealed or $dynamic",
            ));
        }

        let traits = match external {
            Some(_) => {
                let sealed = match node.get(tag::TRAITS) {
                    None => Vec::new(),
                    Some(TextTree::Array(names)) => names
                        .iter()
                        .map(|n| {
                            n.as_str().map(str::to_owned).ok_or_else(|| {
                                Error::unparseable("$traits must be an array of strings")
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    Some(_) => return Err(Error::unparseable("$traits must be an array")),
                };
                Traits {
                    class_name,
                    sealed,
                    dynamic: false,
                    externalizable: true,
                }
            }
            None => {
                if node.contains_key(tag::TRAITS) {
                    return Err(Error::unparseable(
                        "$traits is only valid on externalizable objects",
                    ));
                }
                let sealed = member_names(node.get(tag::SEALED), tag::SEALED)?;
                Traits {
                    class_name,
                    sealed,
                    dynamic: node.contains_key(tag::DYNAMIC),
                    externalizable: false,
                }
            }
        };

        let sealed_count = if traits.externalizable {
            0
        } else {
            traits.sealed.len()
        };
        let handle = Rc::new(RefCell::new(TypedObject::new(self.intern(traits))));
        let value = Value::TypedObject(handle.clone());
        self.register(node, &value)?;

        let mut fields = Vec::new();
        for key in [tag::EXTERNAL, tag::SEALED, tag::DYNAMIC] {
            match node.get(key) {
                None => {}
                Some(TextTree::Object(members)) => fields.extend(self.read_members(members)?),
                Some(_) => return Err(Error::unparseable(format!("{} must be an object", key))),
            }
        }
        if let Some((name, _)) = fields[sealed_count..]
            .iter()
            .find(|(name, _)| fields[..sealed_count].iter().any(|(s, _)| s == name))
        {
            return Err(Error::unparseable(format!(
                "member {} is both sealed and dynamic",
                name
            )));
        }
        handle.borrow_mut().fields = fields;
        Ok(value)
    }

    fn read_items(&mut self, tree: &TextTree) -> Result<Vec<Value>> {
        match tree {
            TextTree::Array(items) => items.iter().map(|item| self.read(item)).collect(),
            _ => Err(Error::unparseable("$array must be an array")),
        }
    }

    fn read_members(&mut self, members: &Node) -> Result<Vec<(String, Value)>> {
        members
            .iter()
            .map(|(name, member)| Ok((name.clone(), self.read(member)?)))
            .collect()
    }

    /// Remember `value` under the node's `$id`, before its children are read
    fn register(&mut self, node: &Node, value: &Value) -> Result<()> {
        let Some(id) = node.get(tag::ID) else {
            return Ok(());
        };
        let id = id_of(id)?;
        if self.ids.insert(id, value.clone()).is_some() {
            return Err(Error::unparseable(format!("duplicate id {}", id)));
        }
        Ok(())
    }

    fn intern(&mut self, traits: Traits) -> Rc<Traits> {
        self.traits
            .entry(traits.clone())
            .or_insert_with(|| Rc::new(traits))
            .clone()
    }
}

/// Integers inside the 29-bit range stay integers; anything else is a double
fn number(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) if (i64::from(INTEGER_MIN)..=i64::from(INTEGER_MAX)).contains(&i) => {
            Value::Integer(i as i32)
        }
        _ => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn id_of(tree: &TextTree) -> Result<u64> {
    tree.as_u64()
        .ok_or_else(|| Error::unparseable(format!("id must be a non-negative integer, got {}", tree)))
}

fn text_of(node: &Node, key: &str) -> Result<String> {
    node[key]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::unparseable(format!("{} must be a string", key)))
}

fn member_names(members: Option<&TextTree>, key: &str) -> Result<Vec<String>> {
    match members {
        None => Ok(Vec::new()),
        Some(TextTree::Object(members)) => Ok(members.keys().cloned().collect()),
        Some(_) => Err(Error::unparseable(format!("{} must be an object", key))),
    }
}

fn special_double(tree: &TextTree) -> Result<f64> {
    match tree.as_str() {
        Some("NaN") => Ok(f64::NAN),
        Some("+Inf") => Ok(f64::INFINITY),
        Some("-Inf") => Ok(f64::NEG_INFINITY),
        Some("-0.0") => Ok(-0.0),
        _ => Err(Error::unparseable(format!("invalid $f64 literal {}", tree))),
    }
}

/// Epoch milliseconds, an RFC 3339 timestamp, or a `$f64` wrapper
fn date(tree: &TextTree) -> Result<Date> {
    match tree {
        TextTree::Number(n) => n
            .as_f64()
            .map(Date::new)
            .ok_or_else(|| Error::unparseable(format!("invalid $date {}", n))),
        TextTree::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Date::from_datetime(dt.with_timezone(&Utc)))
            .map_err(|e| Error::unparseable(format!("invalid $date {:?}: {}", s, e))),
        TextTree::Object(node) if node.len() == 1 && node.contains_key(tag::F64) => {
            Ok(Date::new(special_double(&node[tag::F64])?))
        }
        other => Err(Error::unparseable(format!("invalid $date {}", other))),
    }
}
