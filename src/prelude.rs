//! Convenient imports for amfxml.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```
//! use amfxml::prelude::*;
//!
//! let converter = Converter::default();
//! let text = converter.amf_object_to_text(&[0x04, 0x07]);
//! assert_eq!(text, "7");
//! ```

// Main entry point
pub use crate::converter::{Converter, ConverterBuilder, RENDERING_ALIASES};
pub use crate::options::ConverterOptions;

// Error handling
pub use crate::error::{Error, Result};

// Acknowledgment filter
pub use crate::ack::{is_acknowledgment, ACK_CODES};

// Value model
pub use amfxml_core::{
    ActionMessage, AliasRegistry, Framing, MessageBody, MessageHeader, Traits, TypedObject, Value,
};

// Re-export serde_json for convenience
pub use serde_json::json;
