//! Wire formats for amfxml
//!
//! Three codecs live here:
//!
//! - [`amf3`]: single AMF3 values, with per-call string, object and traits
//!   reference tables
//! - [`amf0`]: the action message packet (version, headers, bodies) that
//!   carries AMF3 values
//! - [`text`]: the JSON tree a human edits, with `$`-tagged wrappers for
//!   values JSON has no literal for
//!
//! ## Examples
//!
//! ```
//! use amfxml_core::{AliasRegistry, Value};
//! use amfxml_wire::{decode_value, encode_value, value_to_text};
//!
//! let registry = AliasRegistry::new();
//! let ping = Value::object("com.example.Ping", vec![("count", Value::Integer(7))]);
//!
//! let bytes = encode_value(&ping, &registry).unwrap();
//! assert_eq!(decode_value(&bytes, &registry).unwrap(), ping);
//!
//! let text = value_to_text(&ping, &registry, false);
//! assert_eq!(text, r#"{"$class":"com.example.Ping","$sealed":{"count":7}}"#);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod amf0;
pub mod amf3;
mod bytes;
pub mod text;

// Re-export main entry points
pub use amf0::{decode_message, encode_message};
pub use amf3::{decode_value, encode_value};
pub use text::{
    message_to_text, message_to_tree, parse, render, text_to_message, text_to_value,
    tree_to_message, tree_to_value, value_to_text, value_to_tree, MESSAGE_TAGS, TextTree,
};
