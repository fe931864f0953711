//! Converter configuration
//!
//! Options are plain data so hosts can keep them in a JSON file:
//!
//! ```json
//! {
//!   "pretty": true,
//!   "suppress_acknowledgments": true,
//!   "render_aliases": false,
//!   "aliases": { "PNG": "com.example.Ping" }
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Converter options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterOptions {
    /// Indent rendered text
    pub pretty: bool,
    /// Return `None` instead of text for pure acknowledgment messages
    pub suppress_acknowledgments: bool,
    /// Register the Flex small-message aliases before rendering a message
    pub render_aliases: bool,
    /// Extra `code → qualified name` aliases bound when the converter is built
    pub aliases: BTreeMap<String, String>,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        ConverterOptions {
            pretty: true,
            suppress_acknowledgments: true,
            render_aliases: false,
            aliases: BTreeMap::new(),
        }
    }
}

impl ConverterOptions {
    /// Parse options from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read options from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}
