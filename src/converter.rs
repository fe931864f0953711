//! Converter entry point
//!
//! This module provides [`Converter`], which ties the AMF codecs, the text
//! mapper and the acknowledgment filter to one shared [`AliasRegistry`].
//!
//! Object-level calls are lenient: a failure is logged and yields an empty
//! result. Message-level calls surface the error. Each call is independent,
//! so a failed conversion never affects the next one.

use crate::ack::is_acknowledgment;
use crate::error::Result;
use crate::options::ConverterOptions;
use amfxml_core::{ActionMessage, AliasRegistry};
use amfxml_wire::text;
use std::sync::Arc;
use tracing::{debug, warn};

/// Aliases registered before rendering a message when asked to
///
/// Flex small messages name their class with the short code on the wire;
/// these pairs let the rendered text show the short code for objects that
/// arrived under the expanded name too.
pub const RENDERING_ALIASES: [(&str, &str); 2] = [
    ("DSC", "flex.messaging.messages.CommandMessageExt"),
    ("DSK", "flex.messaging.messages.AcknowledgeMessageExt"),
];

/// AMF ↔ text converter.
///
/// Create one with [`Converter::new`] or [`Converter::builder`].
///
/// # Example
///
/// ```
/// use amfxml::prelude::*;
///
/// let converter = Converter::builder().pretty(false).build()?;
///
/// let bytes = converter.text_to_amf_object(r#"{"$class": "com.example.Ping", "$sealed": {"count": 7}}"#);
/// assert!(!bytes.is_empty());
///
/// let text = converter.amf_object_to_text(&bytes);
/// assert_eq!(text, r#"{"$class":"com.example.Ping","$sealed":{"count":7}}"#);
/// # Ok::<(), amfxml::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    registry: Arc<AliasRegistry>,
    options: ConverterOptions,
}

impl Converter {
    /// Create a converter over `registry` with default options
    pub fn new(registry: Arc<AliasRegistry>) -> Self {
        Converter {
            registry,
            options: ConverterOptions::default(),
        }
    }

    /// Create a builder for converter configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use amfxml::prelude::*;
    /// use std::sync::Arc;
    ///
    /// let converter = Converter::builder()
    ///     .registry(Arc::new(AliasRegistry::new()))
    ///     .alias("PNG", "com.example.Ping")
    ///     .build()?;
    /// assert_eq!(converter.registry().resolve("PNG").as_deref(), Some("com.example.Ping"));
    /// # Ok::<(), amfxml::Error>(())
    /// ```
    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::new()
    }

    /// The shared alias registry
    pub fn registry(&self) -> &Arc<AliasRegistry> {
        &self.registry
    }

    /// Options in effect
    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    // =========================================================================
    // Object level
    // =========================================================================

    /// Encode one AMF3 value written as text.
    ///
    /// Returns an empty vector if the text does not parse or the value
    /// cannot be encoded. Use [`Converter::try_text_to_amf_object`] to see
    /// why.
    pub fn text_to_amf_object(&self, text: &str) -> Vec<u8> {
        self.try_text_to_amf_object(text).unwrap_or_else(|e| {
            warn!(error = %e, "text to AMF object conversion failed");
            Vec::new()
        })
    }

    /// Encode one AMF3 value written as text, surfacing failures
    pub fn try_text_to_amf_object(&self, text: &str) -> Result<Vec<u8>> {
        let value = text::text_to_value(text, &self.registry)?;
        amfxml_wire::encode_value(&value, &self.registry)
    }

    /// Render one AMF3 value as text.
    ///
    /// Returns an empty string if the bytes do not decode. Use
    /// [`Converter::try_amf_object_to_text`] to see why.
    pub fn amf_object_to_text(&self, bytes: &[u8]) -> String {
        self.try_amf_object_to_text(bytes).unwrap_or_else(|e| {
            warn!(error = %e, len = bytes.len(), "AMF object to text conversion failed");
            String::new()
        })
    }

    /// Render one AMF3 value as text, surfacing failures
    pub fn try_amf_object_to_text(&self, bytes: &[u8]) -> Result<String> {
        let value = amfxml_wire::decode_value(bytes, &self.registry)?;
        Ok(text::value_to_text(&value, &self.registry, self.options.pretty))
    }

    // =========================================================================
    // Message level
    // =========================================================================

    /// Encode an action message written as text
    pub fn text_to_amf_message(&self, text: &str) -> Result<Vec<u8>> {
        let message = text::text_to_message(text, &self.registry)?;
        self.encode_message(&message)
    }

    /// Render an action message as text.
    ///
    /// Returns `Ok(None)` when the message is a pure acknowledgment and
    /// acknowledgments are suppressed. With `apply_aliases_for_rendering`
    /// set, [`RENDERING_ALIASES`] are registered once the bytes have
    /// decoded; a pair that conflicts with an existing binding is skipped.
    pub fn amf_message_to_text(
        &self,
        bytes: &[u8],
        apply_aliases_for_rendering: bool,
    ) -> Result<Option<String>> {
        // A failed decode leaves the registry untouched
        let message = self.decode_message(bytes)?;
        if apply_aliases_for_rendering {
            self.register_rendering_aliases();
        }
        if self.options.suppress_acknowledgments && is_acknowledgment(&message, &self.registry) {
            debug!(bodies = message.bodies.len(), "suppressed acknowledgment message");
            return Ok(None);
        }
        Ok(Some(text::message_to_text(
            &message,
            &self.registry,
            self.options.pretty,
        )))
    }

    /// Render an action message, registering rendering aliases when the
    /// options ask for it
    pub fn render_message(&self, bytes: &[u8]) -> Result<Option<String>> {
        self.amf_message_to_text(bytes, self.options.render_aliases)
    }

    /// Decode an action message into the value model
    pub fn decode_message(&self, bytes: &[u8]) -> Result<ActionMessage> {
        amfxml_wire::decode_message(bytes, &self.registry)
    }

    /// Encode an action message from the value model
    pub fn encode_message(&self, message: &ActionMessage) -> Result<Vec<u8>> {
        amfxml_wire::encode_message(message, &self.registry)
    }

    fn register_rendering_aliases(&self) {
        for (code, qualified) in RENDERING_ALIASES {
            if let Err(e) = self.registry.register(code, qualified) {
                warn!(error = %e, "skipping rendering alias");
            }
        }
    }
}

impl Default for Converter {
    fn default() -> Self {
        Converter::new(Arc::new(AliasRegistry::new()))
    }
}

/// Builder for converter configuration.
///
/// # Example
///
/// ```
/// use amfxml::prelude::*;
///
/// // Compact output, acknowledgments rendered like any other message
/// let converter = Converter::builder()
///     .pretty(false)
///     .suppress_acknowledgments(false)
///     .build()?;
///
/// // Options parsed from JSON, on the process-wide registry
/// let options = ConverterOptions::from_json_str(r#"{"render_aliases": true}"#)?;
/// let converter = Converter::builder()
///     .registry(AliasRegistry::global())
///     .options(options)
///     .build()?;
/// # Ok::<(), amfxml::Error>(())
/// ```
#[derive(Debug)]
pub struct ConverterBuilder {
    registry: Option<Arc<AliasRegistry>>,
    options: ConverterOptions,
}

impl ConverterBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        ConverterBuilder {
            registry: None,
            options: ConverterOptions::default(),
        }
    }

    /// Share an existing registry instead of creating a private one.
    pub fn registry(mut self, registry: Arc<AliasRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace all options.
    pub fn options(mut self, options: ConverterOptions) -> Self {
        self.options = options;
        self
    }

    /// Indent rendered text.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.options.pretty = pretty;
        self
    }

    /// Return `None` for pure acknowledgment messages.
    pub fn suppress_acknowledgments(mut self, suppress: bool) -> Self {
        self.options.suppress_acknowledgments = suppress;
        self
    }

    /// Register rendering aliases in [`Converter::render_message`].
    pub fn render_aliases(mut self, render: bool) -> Self {
        self.options.render_aliases = render;
        self
    }

    /// Bind an extra alias when the converter is built.
    pub fn alias(mut self, code: impl Into<String>, qualified: impl Into<String>) -> Self {
        self.options.aliases.insert(code.into(), qualified.into());
        self
    }

    /// Build the converter.
    ///
    /// Fails with [`Error::Conflict`](crate::Error::Conflict) if a
    /// configured alias clashes with the registry; in that case none of the
    /// configured aliases are bound.
    pub fn build(self) -> Result<Converter> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(AliasRegistry::new()));
        registry.extend(&self.options.aliases)?;
        Ok(Converter {
            registry,
            options: self.options,
        })
    }
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
