//! Parameter schema: the set of legal configuration names and their defaults.
//!
//! The schema document itself belongs to the simulation binary. This module
//! only consumes it through the [`DefaultsGenerator`] seam, so a caller can
//! plug in whatever schema library they already use.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::{KernelError, Result};

/// Turns a schema document into `name → default` pairs.
pub trait DefaultsGenerator {
    /// Extract every legal parameter name with its default value.
    ///
    /// # Errors
    ///
    /// Implementations return [`KernelError::Validation`] for documents they
    /// cannot interpret.
    fn parameter_defaults(&self, schema: &Value) -> Result<BTreeMap<String, Value>>;
}

/// Walks a schema document and records every object that has a `default`.
///
/// Starts at the top-level `config` member when present, otherwise at the
/// root. Keys beginning with `idmType:` name type definitions, not
/// parameters, and are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaWalker;

impl DefaultsGenerator for SchemaWalker {
    fn parameter_defaults(&self, schema: &Value) -> Result<BTreeMap<String, Value>> {
        let root = schema.get("config").unwrap_or(schema);
        let Value::Object(_) = root else {
            return Err(KernelError::validation("schema document is not an object"));
        };
        let mut out = BTreeMap::new();
        walk(root, &mut out);
        if out.is_empty() {
            return Err(KernelError::validation(
                "schema document declares no parameters",
            ));
        }
        Ok(out)
    }
}

fn walk(node: &Value, out: &mut BTreeMap<String, Value>) {
    let Value::Object(map) = node else {
        return;
    };
    for (key, child) in map {
        if key.starts_with("idmType:") {
            continue;
        }
        match child.get("default") {
            Some(default) if child.is_object() => {
                out.insert(key.clone(), default.clone());
            }
            _ => walk(child, out),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    defaults: BTreeMap<String, Value>,
}

impl ParameterSchema {
    #[must_use]
    pub fn from_defaults(defaults: BTreeMap<String, Value>) -> Self {
        Self { defaults }
    }

    /// Build from a schema document through `generator`.
    ///
    /// # Errors
    ///
    /// Whatever `generator` reports.
    pub fn from_document(schema: &Value, generator: &dyn DefaultsGenerator) -> Result<Self> {
        Ok(Self::from_defaults(generator.parameter_defaults(schema)?))
    }

    /// Read a schema JSON file and walk it with [`SchemaWalker`].
    ///
    /// # Errors
    ///
    /// [`KernelError::Io`], [`KernelError::Json`], or walker validation errors.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| KernelError::io(path, e))?;
        let doc: Value = serde_json::from_slice(&bytes)?;
        Self::from_document(&doc, &SchemaWalker)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.defaults.contains_key(name)
    }

    #[must_use]
    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.defaults.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }
}
