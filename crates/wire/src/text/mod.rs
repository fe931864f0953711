//! Structured text mapping for AMF3 values and action messages
//!
//! Values map onto a JSON tree ([`TextTree`]). JSON covers null, booleans,
//! strings and arrays directly; everything else uses a `$`-tagged wrapper
//! object:
//!
//! - `{"$undefined": true}` for `undefined`
//! - `{"$f64": "NaN|+Inf|-Inf|-0.0"}` for doubles JSON cannot spell
//! - `{"$date": <millis>}` for dates (RFC 3339 strings are accepted on input)
//! - `{"$bytes": "<base64>"}` for byte arrays
//! - `{"$xml": "..."}` / `{"$e4x": "..."}` for XML documents
//! - `{"$assoc": {...}, "$array": [...]}` for associative arrays
//! - `{"$class": "...", "$sealed": {...}, "$dynamic": {...}}` for objects
//!   (`$dynamic` only when the traits are dynamic)
//! - `{"$class": "...", "$external": {...}}` for externalizable objects
//!
//! `$class` goes through the alias registry; the standard Flex message
//! classes additionally get short tags such as `RemotingMessage` (see
//! [`MESSAGE_TAGS`]).
//!
//! Integers are JSON integers and doubles always carry a fraction or an
//! exponent, so `7` and `7.0` stay distinct.
//!
//! ## Identity
//!
//! A complex value that occurs more than once in a graph is written in full
//! at its first (pre-order) occurrence with an `"$id": n` member; later
//! occurrences are `{"$ref": n}`. A dense array that needs an id is written
//! as `{"$id": n, "$array": [...]}`. Each top-level value has its own id
//! space.

mod decode;
mod encode;

pub use decode::{tree_to_message, tree_to_value};
pub use encode::{message_to_tree, value_to_tree};

use crate::amf3::MAX_DEPTH;
use amfxml_core::{ActionMessage, AliasRegistry, Error, Result, Value};
use serde::Deserialize;
use std::borrow::Cow;

/// Generic text tree every value maps onto
pub type TextTree = serde_json::Value;

/// Text-only tags for the standard Flex message classes
///
/// Written in place of the qualified name unless the registry binds the
/// class itself. Bytes always carry the name the registry yields.
pub const MESSAGE_TAGS: [(&str, &str); 5] = [
    ("RemotingMessage", "flex.messaging.messages.RemotingMessage"),
    ("CommandMessage", "flex.messaging.messages.CommandMessage"),
    ("AcknowledgeMessage", "flex.messaging.messages.AcknowledgeMessage"),
    ("ErrorMessage", "flex.messaging.messages.ErrorMessage"),
    ("AsyncMessage", "flex.messaging.messages.AsyncMessage"),
];

/// Class name as written in `$class`
fn class_to_text<'a>(class_name: &'a str, registry: &AliasRegistry) -> Cow<'a, str> {
    if let Some(code) = registry.compress(class_name) {
        return Cow::Owned(code);
    }
    match MESSAGE_TAGS.iter().find(|(_, qualified)| *qualified == class_name) {
        Some(&(short, _)) => Cow::Borrowed(short),
        None => Cow::Borrowed(class_name),
    }
}

/// Class name a `$class` tag stands for
fn class_from_text(tag: &str, registry: &AliasRegistry) -> String {
    if let Some(qualified) = registry.resolve(tag) {
        return qualified;
    }
    match MESSAGE_TAGS.iter().find(|(short, _)| *short == tag) {
        Some(&(_, qualified)) => qualified.to_owned(),
        None => tag.to_owned(),
    }
}

/// Deepest bracket nesting accepted on input
///
/// A container takes at most two JSON levels (the node and its member map),
/// a leaf wrapper at most two, and a message adds three above its values.
pub const MAX_TEXT_DEPTH: usize = 2 * MAX_DEPTH + 8;

/// Wrapper keys
pub mod tag {
    /// Identity of a shared value
    pub const ID: &str = "$id";
    /// Back-reference to a value carrying `$id`
    pub const REF: &str = "$ref";
    /// `undefined`
    pub const UNDEFINED: &str = "$undefined";
    /// Non-finite or negative-zero double
    pub const F64: &str = "$f64";
    /// Date in epoch milliseconds
    pub const DATE: &str = "$date";
    /// Base64 byte array
    pub const BYTES: &str = "$bytes";
    /// Legacy XML document
    pub const XML: &str = "$xml";
    /// E4X XML
    pub const E4X: &str = "$e4x";
    /// Dense part of an array
    pub const ARRAY: &str = "$array";
    /// Keyed part of an associative array
    pub const ASSOC: &str = "$assoc";
    /// Class tag of an object
    pub const CLASS: &str = "$class";
    /// Sealed members
    pub const SEALED: &str = "$sealed";
    /// Dynamic members
    pub const DYNAMIC: &str = "$dynamic";
    /// Externalized members
    pub const EXTERNAL: &str = "$external";
    /// Sealed names declared by an externalizable class
    pub const TRAITS: &str = "$traits";
}

/// Render a tree as JSON text
pub fn render(tree: &TextTree, pretty: bool) -> String {
    if pretty {
        format!("{:#}", tree)
    } else {
        tree.to_string()
    }
}

/// Parse JSON text into a tree
///
/// Nesting is bounded by [`MAX_TEXT_DEPTH`] rather than serde_json's own
/// recursion limit, so anything the codecs accept can be read back.
pub fn parse(text: &str) -> Result<TextTree> {
    check_nesting(text)?;
    let invalid = |e: serde_json::Error| Error::unparseable(format!("invalid JSON: {}", e));
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let tree = TextTree::deserialize(&mut de).map_err(invalid)?;
    de.end().map_err(invalid)?;
    Ok(tree)
}

/// Reject bracket nesting past [`MAX_TEXT_DEPTH`] before the recursive parse
fn check_nesting(text: &str) -> Result<()> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > MAX_TEXT_DEPTH {
                    return Err(Error::unparseable(format!(
                        "nesting deeper than {} levels at byte {}",
                        MAX_TEXT_DEPTH, offset
                    )));
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// Map a value straight to JSON text
pub fn value_to_text(value: &Value, registry: &AliasRegistry, pretty: bool) -> String {
    render(&value_to_tree(value, registry), pretty)
}

/// Map JSON text straight to a value
pub fn text_to_value(text: &str, registry: &AliasRegistry) -> Result<Value> {
    tree_to_value(&parse(text)?, registry)
}

/// Map a message straight to JSON text
pub fn message_to_text(message: &ActionMessage, registry: &AliasRegistry, pretty: bool) -> String {
    render(&message_to_tree(message, registry), pretty)
}

/// Map JSON text straight to a message
pub fn text_to_message(text: &str, registry: &AliasRegistry) -> Result<ActionMessage> {
    tree_to_message(&parse(text)?, registry)
}

#[cfg(test)]
mod tests;
