//! The simulation configuration document (`config.json`).

use std::sync::Arc;

use serde_json::{Map, Value};

use super::schema::ParameterSchema;
use crate::error::{KernelError, Result};
use crate::proof::canon::document_json_bytes;

/// String-keyed parameter tree, optionally backed by a schema.
///
/// Keys are kept in a `serde_json::Map`, which is ordered, so the rendered
/// document always has sorted keys.
#[derive(Debug, Clone, Default)]
pub struct ConfigDocument {
    parameters: Map<String, Value>,
    schema: Option<Arc<ParameterSchema>>,
}

impl ConfigDocument {
    /// Empty document with no schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Document seeded with every schema default.
    #[must_use]
    pub fn from_schema(schema: Arc<ParameterSchema>) -> Self {
        let parameters = schema
            .defaults()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            parameters,
            schema: Some(schema),
        }
    }

    /// Attach a schema after the fact; existing values are kept and missing
    /// defaults are filled in.
    pub fn attach_schema(&mut self, schema: Arc<ParameterSchema>) {
        for (name, default) in schema.defaults() {
            self.parameters
                .entry(name.clone())
                .or_insert_with(|| default.clone());
        }
        self.schema = Some(schema);
    }

    #[must_use]
    pub fn schema(&self) -> Option<&ParameterSchema> {
        self.schema.as_deref()
    }

    /// Set a parameter known to the schema.
    ///
    /// # Errors
    ///
    /// [`KernelError::MissingPrerequisite`] without a schema,
    /// [`KernelError::Validation`] for a name the schema does not declare.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.require_known(name)?;
        self.parameters.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Look up a parameter, falling back to its schema default.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigDocument::set_parameter`] when the name is not set.
    pub fn get_parameter(&self, name: &str) -> Result<&Value> {
        if let Some(value) = self.parameters.get(name) {
            return Ok(value);
        }
        self.require_known(name)?;
        self.schema
            .as_ref()
            .and_then(|s| s.default_for(name))
            .ok_or_else(|| KernelError::validation(format!("no value for {name}")))
    }

    /// Write a key without schema validation. Used by file-set rendering,
    /// whose keys are fixed by the simulation binary.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.parameters.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.parameters.remove(name)
    }

    #[must_use]
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Replace values from an existing `{"parameters": {...}}` document.
    ///
    /// # Errors
    ///
    /// [`KernelError::Json`] for unparsable bytes, [`KernelError::Validation`]
    /// if the `parameters` object is missing.
    pub fn merge_config_json(&mut self, bytes: &[u8]) -> Result<()> {
        let doc: Value = serde_json::from_slice(bytes)?;
        let Some(Value::Object(params)) = doc.get("parameters") else {
            return Err(KernelError::validation(
                "config document has no \"parameters\" object",
            ));
        };
        for (k, v) in params {
            self.parameters.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    /// Render `{"parameters": {...}}` with sorted keys.
    ///
    /// # Errors
    ///
    /// [`KernelError::Json`] if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut root = Map::new();
        root.insert("parameters".into(), Value::Object(self.parameters.clone()));
        document_json_bytes(&Value::Object(root))
    }

    fn require_known(&self, name: &str) -> Result<()> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| KernelError::missing(format!("schema (needed to validate {name})")))?;
        if schema.contains(name) {
            Ok(())
        } else {
            Err(KernelError::validation(format!(
                "{name} is not a parameter known to the schema"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn schema() -> Arc<ParameterSchema> {
        let mut d = BTreeMap::new();
        d.insert("Run_Number".to_string(), json!(0));
        d.insert("Simulation_Duration".to_string(), json!(365));
        Arc::new(ParameterSchema::from_defaults(d))
    }

    #[test]
    fn set_without_schema_is_missing_prerequisite() {
        let mut doc = ConfigDocument::new();
        let err = doc.set_parameter("Run_Number", 3).unwrap_err();
        assert!(matches!(err, KernelError::MissingPrerequisite(_)));
        assert!(doc.parameters().is_empty());
    }

    #[test]
    fn set_unknown_name_is_validation() {
        let mut doc = ConfigDocument::from_schema(schema());
        let err = doc.set_parameter("Run_Numbr", 3).unwrap_err();
        assert!(matches!(err, KernelError::Validation(_)));
    }

    #[test]
    fn get_returns_defaults_and_overrides() {
        let mut doc = ConfigDocument::from_schema(schema());
        assert_eq!(doc.get_parameter("Simulation_Duration").unwrap(), &json!(365));
        doc.set_parameter("Simulation_Duration", 730).unwrap();
        assert_eq!(doc.get_parameter("Simulation_Duration").unwrap(), &json!(730));
    }

    #[test]
    fn attach_schema_keeps_existing_values() {
        let mut doc = ConfigDocument::new();
        doc.insert("Run_Number", 9);
        doc.attach_schema(schema());
        assert_eq!(doc.get("Run_Number"), Some(&json!(9)));
        assert_eq!(doc.get("Simulation_Duration"), Some(&json!(365)));
    }

    #[test]
    fn renders_sorted_parameters_object() {
        let mut doc = ConfigDocument::new();
        doc.insert("b", 1);
        doc.insert("a", 2.5);
        let value: Value = serde_json::from_slice(&doc.to_json_bytes().unwrap()).unwrap();
        assert_eq!(value, json!({"parameters": {"a": 2.5, "b": 1}}));
        let text = String::from_utf8(doc.to_json_bytes().unwrap()).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn merge_config_json_requires_parameters() {
        let mut doc = ConfigDocument::new();
        doc.merge_config_json(br#"{"parameters":{"Run_Number":4}}"#).unwrap();
        assert_eq!(doc.get("Run_Number"), Some(&json!(4)));
        let err = doc.merge_config_json(br#"{"Run_Number":4}"#).unwrap_err();
        assert!(matches!(err, KernelError::Validation(_)));
    }
}
