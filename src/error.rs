//! Error types for amfxml.
//!
//! Every crate in the workspace reports failures through one enum, defined
//! in `amfxml-core` and re-exported here so callers need a single import.

pub use amfxml_core::error::{Error, Result};
