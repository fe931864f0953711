//! Action message envelope
//!
//! The top-level request/response container: a version, headers, and
//! bodies. Each header and body carries one [`Value`].

use crate::value::Value;

/// Envelope version used by AMF3-capable Flex clients
pub const AMF3_VERSION: u16 = 3;

/// How a header or body value is embedded in the AMF0 envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Framing {
    /// AMF0 avmplus switch (0x11) followed by one AMF3 value
    #[default]
    Avmplus,
    /// AMF0 strict array whose elements are each AMF3-switched
    ///
    /// Flex clients send request bodies this way; the value is a
    /// `DenseArray`.
    StrictArray,
    /// A bare AMF0 primitive: number, boolean, string, null or undefined
    Amf0,
}

impl Framing {
    /// Name used in the text form
    pub fn as_str(&self) -> &'static str {
        match self {
            Framing::Avmplus => "avmplus",
            Framing::StrictArray => "strict-array",
            Framing::Amf0 => "amf0",
        }
    }

    /// Parse the text form name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "avmplus" => Some(Framing::Avmplus),
            "strict-array" => Some(Framing::StrictArray),
            "amf0" => Some(Framing::Amf0),
            _ => None,
        }
    }
}

/// Envelope header
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    /// Header name
    pub name: String,
    /// Whether the receiver must understand the header
    pub must_understand: bool,
    /// Embedding of `value`
    pub framing: Framing,
    /// Header value
    pub value: Value,
}

impl MessageHeader {
    /// Create an AMF3-framed header
    pub fn new(name: impl Into<String>, must_understand: bool, value: Value) -> Self {
        MessageHeader {
            name: name.into(),
            must_understand,
            framing: Framing::Avmplus,
            value,
        }
    }

    /// Change how the value is framed
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }
}

/// Envelope body
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBody {
    /// Target URI (e.g. `null` or a service method)
    pub target_uri: String,
    /// Response URI (e.g. `/1`)
    pub response_uri: String,
    /// Embedding of `data`
    pub framing: Framing,
    /// Body payload
    pub data: Value,
}

impl MessageBody {
    /// Create an AMF3-framed body
    pub fn new(target_uri: impl Into<String>, response_uri: impl Into<String>, data: Value) -> Self {
        MessageBody {
            target_uri: target_uri.into(),
            response_uri: response_uri.into(),
            framing: Framing::Avmplus,
            data,
        }
    }

    /// Set the framing, builder style
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }
}

/// Request/response envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMessage {
    /// Envelope version (3 for AMF3)
    pub version: u16,
    /// Headers in wire order
    pub headers: Vec<MessageHeader>,
    /// Bodies in wire order
    pub bodies: Vec<MessageBody>,
}

impl Default for ActionMessage {
    fn default() -> Self {
        Self::new(AMF3_VERSION)
    }
}

impl ActionMessage {
    /// Create an empty envelope
    pub fn new(version: u16) -> Self {
        ActionMessage {
            version,
            headers: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Append a header, builder style
    pub fn with_header(mut self, header: MessageHeader) -> Self {
        self.headers.push(header);
        self
    }

    /// Append a body, builder style
    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.bodies.push(body);
        self
    }

    /// Number of bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Body at `index`
    pub fn body(&self, index: usize) -> Option<&MessageBody> {
        self.bodies.get(index)
    }

    /// First header with the given name
    pub fn header(&self, name: &str) -> Option<&MessageHeader> {
        self.headers.iter().find(|h| h.name == name)
    }
}
