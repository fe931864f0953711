//! Error types shared by every amfxml crate
//!
//! A conversion either produces a complete result or one of these errors.
//! Nothing is partially applied: a failing decode exposes no half-built
//! value, and a failing registration leaves the alias registry untouched.

use thiserror::Error;

/// All amfxml errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Truncated or invalid bytes, a bad reference index, or an unknown marker
    #[error("malformed stream at byte {offset}: {reason}")]
    MalformedStream {
        /// Byte offset at which decoding stopped
        offset: usize,
        /// What was wrong
        reason: String,
    },

    /// Structurally invalid text tree or an unknown leaf tag
    #[error("unparseable text: {0}")]
    UnparseableText(String),

    /// Alias registry double binding
    #[error("alias conflict: {alias} is already bound to {bound_to}, cannot bind it to {requested}")]
    Conflict {
        /// The code or qualified name that is already bound
        alias: String,
        /// Its existing counterpart
        bound_to: String,
        /// The counterpart the caller asked for
        requested: String,
    },

    /// A length that the wire format cannot express
    #[error("{what} is too large to encode: {len} exceeds {max}")]
    ValueTooLarge {
        /// Which field overflowed
        what: &'static str,
        /// Actual length
        len: usize,
        /// Largest encodable length
        max: usize,
    },

    /// A value whose shape the wire format cannot express
    #[error("cannot encode value: {0}")]
    Unencodable(String),

    /// Invalid converter options
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for amfxml operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `MalformedStream` error.
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedStream {
            offset,
            reason: reason.into(),
        }
    }

    /// Build an `UnparseableText` error.
    pub fn unparseable(reason: impl Into<String>) -> Self {
        Error::UnparseableText(reason.into())
    }

    /// Check if this is a binary decoding failure.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedStream { .. })
    }

    /// Check if this is a text mapping failure.
    pub fn is_unparseable(&self) -> bool {
        matches!(self, Error::UnparseableText(_))
    }

    /// Check if this is an alias conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}
