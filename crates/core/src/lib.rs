//! Core types for amfxml
//!
//! This crate defines the data model shared by the codec and the text
//! mapper:
//! - [`Value`]: the AMF3 object graph
//! - [`ActionMessage`]: the request/response envelope
//! - [`AliasRegistry`]: short code ↔ qualified class name mapping
//! - [`Error`]: the error kinds every conversion can report

#![warn(missing_docs)]

pub mod alias;
pub mod envelope;
pub mod error;
pub mod value;

pub use alias::AliasRegistry;
pub use envelope::{ActionMessage, Framing, MessageBody, MessageHeader, AMF3_VERSION};
pub use error::{Error, Result};
pub use value::{
    AssocArray, Date, Shared, Traits, TypedObject, Value, XmlDocument, XmlFlavor, INTEGER_MAX,
    INTEGER_MIN,
};
