//! Value → text tree

use super::{class_to_text, tag, TextTree};
use amfxml_core::{ActionMessage, AliasRegistry, Framing, TypedObject, Value, XmlFlavor};
use base64::Engine;
use serde_json::{json, Map, Number};
use std::collections::HashMap;

/// Map a value to its text tree
pub fn value_to_tree(value: &Value, registry: &AliasRegistry) -> TextTree {
    TreeWriter::new(value, registry).write(value)
}

/// Map a message to its text tree
///
/// `framing` is omitted for AMF3-framed values.
pub fn message_to_tree(message: &ActionMessage, registry: &AliasRegistry) -> TextTree {
    let headers: Vec<TextTree> = message
        .headers
        .iter()
        .map(|header| {
            let mut node = Map::new();
            node.insert("name".into(), json!(header.name));
            node.insert("mustUnderstand".into(), json!(header.must_understand));
            insert_framing(&mut node, header.framing);
            node.insert("value".into(), value_to_tree(&header.value, registry));
            TextTree::Object(node)
        })
        .collect();

    let bodies: Vec<TextTree> = message
        .bodies
        .iter()
        .map(|body| {
            let mut node = Map::new();
            node.insert("targetUri".into(), json!(body.target_uri));
            node.insert("responseUri".into(), json!(body.response_uri));
            insert_framing(&mut node, body.framing);
            node.insert("data".into(), value_to_tree(&body.data, registry));
            TextTree::Object(node)
        })
        .collect();

    json!({
        "version": message.version,
        "headers": headers,
        "bodies": bodies,
    })
}

fn insert_framing(node: &mut Map<String, TextTree>, framing: Framing) {
    if framing != Framing::Avmplus {
        node.insert("framing".into(), json!(framing.as_str()));
    }
}

/// Single-member object `{key: value}`
pub(super) fn wrapper(key: &str, value: TextTree) -> TextTree {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    TextTree::Object(map)
}

/// Double as a JSON number, or a `$f64` wrapper when JSON cannot spell it
pub(super) fn double_node(d: f64) -> TextTree {
    if d.is_nan() {
        wrapper(tag::F64, json!("NaN"))
    } else if d == f64::INFINITY {
        wrapper(tag::F64, json!("+Inf"))
    } else if d == f64::NEG_INFINITY {
        wrapper(tag::F64, json!("-Inf"))
    } else if d.to_bits() == (-0.0_f64).to_bits() {
        wrapper(tag::F64, json!("-0.0"))
    } else {
        Number::from_f64(d).map_or(TextTree::Null, TextTree::Number)
    }
}

struct TreeWriter<'r> {
    registry: &'r AliasRegistry,
    /// Occurrence count per complex value
    seen: HashMap<usize, usize>,
    /// Ids handed out so far
    ids: HashMap<usize, u64>,
    next_id: u64,
}

impl<'r> TreeWriter<'r> {
    fn new(root: &Value, registry: &'r AliasRegistry) -> Self {
        let mut seen = HashMap::new();
        count_occurrences(root, &mut seen);
        TreeWriter {
            registry,
            seen,
            ids: HashMap::new(),
            next_id: 1,
        }
    }

    fn write(&mut self, value: &Value) -> TextTree {
        let mut node = Map::new();
        if let Some(addr) = value.identity() {
            if let Some(id) = self.ids.get(&addr) {
                return wrapper(tag::REF, json!(id));
            }
            if self.seen.get(&addr).copied().unwrap_or(0) > 1 {
                let id = self.next_id;
                self.next_id += 1;
                self.ids.insert(addr, id);
                node.insert(tag::ID.into(), json!(id));
            }
        }

        match value {
            Value::Undefined => return wrapper(tag::UNDEFINED, json!(true)),
            Value::Null => return TextTree::Null,
            Value::Boolean(b) => return json!(b),
            Value::Integer(i) => return json!(i),
            Value::Double(d) => return double_node(*d),
            Value::String(s) => return json!(s),
            Value::Date(date) => {
                node.insert(tag::DATE.into(), double_node(date.epoch_millis));
            }
            Value::ByteArray(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes.as_slice());
                node.insert(tag::BYTES.into(), json!(encoded));
            }
            Value::XmlDocument(xml) => {
                let key = match xml.flavor {
                    XmlFlavor::Document => tag::XML,
                    XmlFlavor::E4x => tag::E4X,
                };
                node.insert(key.into(), json!(xml.text));
            }
            Value::DenseArray(items) => {
                let items: Vec<TextTree> = items.borrow().iter().map(|v| self.write(v)).collect();
                if node.is_empty() {
                    return TextTree::Array(items);
                }
                node.insert(tag::ARRAY.into(), TextTree::Array(items));
            }
            Value::AssocArray(array) => {
                let array = array.borrow();
                let entries = self.write_members(&array.entries);
                let dense: Vec<TextTree> = array.dense.iter().map(|v| self.write(v)).collect();
                node.insert(tag::ASSOC.into(), TextTree::Object(entries));
                node.insert(tag::ARRAY.into(), TextTree::Array(dense));
            }
            Value::TypedObject(object) => self.write_object(&object.borrow(), &mut node),
        }
        TextTree::Object(node)
    }

    fn write_object(&mut self, object: &TypedObject, node: &mut Map<String, TextTree>) {
        let traits = &object.traits;
        let class = class_to_text(&traits.class_name, self.registry);
        node.insert(tag::CLASS.into(), json!(class));

        if traits.externalizable {
            if !traits.sealed.is_empty() {
                node.insert(tag::TRAITS.into(), json!(traits.sealed));
            }
            let members = self.write_members(&object.fields);
            node.insert(tag::EXTERNAL.into(), TextTree::Object(members));
            return;
        }

        let sealed = self.write_members(object.sealed_fields());
        node.insert(tag::SEALED.into(), TextTree::Object(sealed));
        if traits.dynamic {
            let dynamic = self.write_members(object.dynamic_fields());
            node.insert(tag::DYNAMIC.into(), TextTree::Object(dynamic));
        }
    }

    fn write_members(&mut self, members: &[(String, Value)]) -> Map<String, TextTree> {
        let mut map = Map::new();
        for (name, member) in members {
            let node = self.write(member);
            map.insert(name.clone(), node);
        }
        map
    }
}

/// Count how often each complex value is reached, without descending twice
fn count_occurrences(value: &Value, seen: &mut HashMap<usize, usize>) {
    if let Some(addr) = value.identity() {
        let count = seen.entry(addr).or_insert(0);
        *count += 1;
        if *count > 1 {
            return;
        }
    }
    match value {
        Value::DenseArray(items) => {
            for item in items.borrow().iter() {
                count_occurrences(item, seen);
            }
        }
        Value::AssocArray(array) => {
            let array = array.borrow();
            for (_, item) in &array.entries {
                count_occurrences(item, seen);
            }
            for item in &array.dense {
                count_occurrences(item, seen);
            }
        }
        Value::TypedObject(object) => {
            for (_, item) in &object.borrow().fields {
                count_occurrences(item, seen);
            }
        }
        _ => {}
    }
}
