//! # amfxml
//!
//! Convert AMF3 object graphs and Flex action messages to editable JSON text
//! and back.
//!
//! A traffic inspector sees Flex/BlazeDS remoting payloads as opaque bytes.
//! amfxml decodes them into a JSON document a person can read and edit, then
//! encodes the edited document back into bytes the server accepts.
//!
//! ## Quick Start
//!
//! ```
//! use amfxml::prelude::*;
//!
//! let converter = Converter::builder().pretty(false).build()?;
//!
//! // One AMF3 value
//! let bytes = converter.text_to_amf_object(r#"{"$class": "com.example.Ping", "$sealed": {"count": 7}}"#);
//! let text = converter.amf_object_to_text(&bytes);
//! assert_eq!(text, r#"{"$class":"com.example.Ping","$sealed":{"count":7}}"#);
//!
//! // A full action message
//! let message = json!({
//!     "version": 3,
//!     "headers": [],
//!     "bodies": [{
//!         "targetUri": "x",
//!         "responseUri": "y",
//!         "data": {"$class": "com.example.Ping", "$sealed": {"count": 7}}
//!     }]
//! });
//! let bytes = converter.text_to_amf_message(&message.to_string())?;
//! let text = converter.amf_message_to_text(&bytes, false)?;
//! assert_eq!(text, Some(message.to_string()));
//! # Ok::<(), amfxml::Error>(())
//! ```
//!
//! ## Layers
//!
//! - [`Converter`] - the four text ↔ bytes conversions on one shared
//!   alias registry
//! - [`is_acknowledgment`] - recognises messages with nothing to render
//! - [`amfxml_wire`] - the AMF3, AMF0 envelope and text codecs
//! - [`amfxml_core`] - the value model and the alias registry

#![warn(missing_docs)]

mod ack;
mod converter;
mod error;
mod options;

pub mod prelude;

// Re-export main entry points
pub use converter::{Converter, ConverterBuilder, RENDERING_ALIASES};
pub use error::{Error, Result};
pub use options::ConverterOptions;

// Re-export the filter
pub use ack::{is_acknowledgment, ACK_CODES};

// Re-export the layers below
pub use amfxml_core;
pub use amfxml_wire;
pub use amfxml_core::{
    ActionMessage, AliasRegistry, AssocArray, Date, Framing, MessageBody, MessageHeader, Traits,
    TypedObject, Value, XmlDocument, XmlFlavor,
};
