//! Class alias registry
//!
//! Maps short codes used on the wire (e.g. `DSK`) to fully qualified class
//! names (e.g. `flex.messaging.messages.AcknowledgeMessageExt`) and back.
//!
//! ## Binding policy
//!
//! The first binding wins. Registering the same pair again is a no-op.
//! Binding a code that already maps to a different name, or a name that
//! already maps to a different code, fails with [`Error::Conflict`] and
//! leaves the registry unchanged.
//!
//! ## Thread Safety
//!
//! Both directions live behind one `parking_lot::RwLock`, so a reader never
//! observes a code without its reverse entry.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

static GLOBAL: Lazy<Arc<AliasRegistry>> = Lazy::new(|| Arc::new(AliasRegistry::new()));

/// Bidirectional code ↔ qualified-name registry
#[derive(Debug, Default)]
pub struct AliasRegistry {
    tables: RwLock<AliasTables>,
}

#[derive(Debug, Clone, Default)]
struct AliasTables {
    by_code: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl AliasTables {
    fn bind(&mut self, code: &str, qualified: &str) -> Result<bool> {
        if let Some(bound) = self.by_code.get(code) {
            if bound == qualified {
                return Ok(false);
            }
            return Err(Error::Conflict {
                alias: code.to_string(),
                bound_to: bound.clone(),
                requested: qualified.to_string(),
            });
        }
        if let Some(bound) = self.by_name.get(qualified) {
            return Err(Error::Conflict {
                alias: qualified.to_string(),
                bound_to: bound.clone(),
                requested: code.to_string(),
            });
        }
        self.by_code.insert(code.to_string(), qualified.to_string());
        self.by_name.insert(qualified.to_string(), code.to_string());
        Ok(true)
    }
}

impl AliasRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry for hosts that want a single shared instance
    pub fn global() -> Arc<AliasRegistry> {
        GLOBAL.clone()
    }

    /// Build a registry from a JSON object of `{"code": "qualified.Name"}` pairs
    pub fn from_json_str(json: &str) -> Result<Self> {
        let pairs: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        let registry = Self::new();
        registry.extend(pairs)?;
        Ok(registry)
    }

    /// Bind `code` to `qualified` in both directions
    pub fn register(&self, code: &str, qualified: &str) -> Result<()> {
        let inserted = self.tables.write().bind(code, qualified)?;
        if inserted {
            debug!(code, qualified, "registered class alias");
        }
        Ok(())
    }

    /// Bind several pairs; either all are bound or none are
    pub fn extend<I, C, Q>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (C, Q)>,
        C: AsRef<str>,
        Q: AsRef<str>,
    {
        let mut tables = self.tables.write();
        let mut staged = tables.clone();
        for (code, qualified) in pairs {
            staged.bind(code.as_ref(), qualified.as_ref())?;
        }
        *tables = staged;
        Ok(())
    }

    /// Expand a short code to its qualified name
    pub fn resolve(&self, code: &str) -> Option<String> {
        self.tables.read().by_code.get(code).cloned()
    }

    /// Compress a qualified name to its short code
    pub fn compress(&self, qualified: &str) -> Option<String> {
        self.tables.read().by_name.get(qualified).cloned()
    }

    /// Expand a code, falling back to the input when it is not registered
    pub fn resolve_or_self<'a>(&self, code: &'a str) -> Cow<'a, str> {
        match self.resolve(code) {
            Some(name) => Cow::Owned(name),
            None => Cow::Borrowed(code),
        }
    }

    /// Compress a name, falling back to the input when it has no code
    pub fn compress_or_self<'a>(&self, qualified: &'a str) -> Cow<'a, str> {
        match self.compress(qualified) {
            Some(code) => Cow::Owned(code),
            None => Cow::Borrowed(qualified),
        }
    }

    /// Number of registered pairs
    pub fn len(&self) -> usize {
        self.tables.read().by_code.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all pairs, sorted by code
    pub fn entries(&self) -> Vec<(String, String)> {
        let tables = self.tables.read();
        let mut entries: Vec<_> = tables
            .by_code
            .iter()
            .map(|(c, q)| (c.clone(), q.clone()))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACK_EXT: &str = "flex.messaging.messages.AcknowledgeMessageExt";

    #[test]
    fn test_register_resolve_compress() {
        let registry = AliasRegistry::new();
        registry.register("DSK", ACK_EXT).unwrap();

        assert_eq!(registry.resolve("DSK").as_deref(), Some(ACK_EXT));
        assert_eq!(registry.compress(ACK_EXT).as_deref(), Some("DSK"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookups_never_fail() {
        let registry = AliasRegistry::new();
        assert!(registry.resolve("nope").is_none());
        assert!(registry.compress("no.Such").is_none());
        assert_eq!(registry.resolve_or_self("nope"), "nope");
        assert_eq!(registry.compress_or_self("no.Such"), "no.Such");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistering_same_pair_is_noop() {
        let registry = AliasRegistry::new();
        registry.register("DSK", ACK_EXT).unwrap();
        registry.register("DSK", ACK_EXT).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_code_conflict_first_binding_wins() {
        let registry = AliasRegistry::new();
        registry.register("DSK", ACK_EXT).unwrap();

        let err = registry
            .register("DSK", "flex.messaging.messages.OtherType")
            .unwrap_err();
        assert_eq!(
            err,
            Error::Conflict {
                alias: "DSK".into(),
                bound_to: ACK_EXT.into(),
                requested: "flex.messaging.messages.OtherType".into(),
            }
        );
        assert_eq!(registry.resolve("DSK").as_deref(), Some(ACK_EXT));
        assert!(registry.compress("flex.messaging.messages.OtherType").is_none());
    }

    #[test]
    fn test_name_conflict() {
        let registry = AliasRegistry::new();
        registry.register("DSK", ACK_EXT).unwrap();

        let err = registry.register("ACK", ACK_EXT).unwrap_err();
        assert!(err.is_conflict());
        assert!(registry.resolve("ACK").is_none());
        assert_eq!(registry.compress(ACK_EXT).as_deref(), Some("DSK"));
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let registry = AliasRegistry::new();
        registry.register("DSK", ACK_EXT).unwrap();

        let result = registry.extend([("DSC", "a.Command"), ("DSK", "b.Other")]);
        assert!(result.unwrap_err().is_conflict());
        assert!(registry.resolve("DSC").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_json_str() {
        let registry =
            AliasRegistry::from_json_str(r#"{"DSK": "a.Ack", "DSC": "a.Command"}"#).unwrap();
        assert_eq!(
            registry.entries(),
            vec![
                ("DSC".to_string(), "a.Command".to_string()),
                ("DSK".to_string(), "a.Ack".to_string()),
            ]
        );

        let err = AliasRegistry::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_concurrent_register_and_lookup() {
        let registry = Arc::new(AliasRegistry::new());
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let code = format!("C{}_{}", i, j);
                        let name = format!("pkg.Class{}_{}", i, j);
                        registry.register(&code, &name).unwrap();
                    }
                })
            })
            .collect();
        let reader = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    for (code, name) in registry.entries() {
                        assert_eq!(registry.compress(&name).as_deref(), Some(code.as_str()));
                    }
                }
            })
        };
        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(registry.len(), 400);
    }

    #[test]
    fn test_global_is_shared() {
        let a = AliasRegistry::global();
        let b = AliasRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
