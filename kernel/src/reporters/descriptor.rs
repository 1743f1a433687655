//! Reporter descriptors: inline (folded into `config.json`) or registry
//! (listed in the custom reports document).

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::filter::{FilterCapabilities, ReportFilter};
use crate::error::{KernelError, Result};

/// Key the registry document uses for the report type.
pub const CLASS_KEY: &str = "class";

/// Reporter whose parameters live in the main configuration under a prefix.
///
/// Renders `<prefix> = 1` plus `<prefix>_<key>` for every parameter and
/// every resolved filter field.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineReporter {
    prefix: String,
    capabilities: FilterCapabilities,
    parameters: BTreeMap<String, Value>,
    filter: BTreeMap<String, Value>,
}

impl InlineReporter {
    /// # Errors
    ///
    /// [`KernelError::Validation`] for an empty prefix.
    pub fn new(prefix: &str, capabilities: FilterCapabilities) -> Result<Self> {
        validate_class(prefix)?;
        Ok(Self {
            prefix: prefix.to_string(),
            capabilities,
            parameters: BTreeMap::new(),
            filter: BTreeMap::new(),
        })
    }

    /// Add an unprefixed parameter.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] if `key` is empty or already set by the filter.
    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        if key.is_empty() {
            return Err(KernelError::validation(format!(
                "{}: empty parameter name",
                self.prefix
            )));
        }
        if self.filter.contains_key(key) {
            return Err(filter_collision(&self.prefix, key));
        }
        self.parameters.insert(key.to_string(), value.into());
        Ok(self)
    }

    /// Resolve and attach a filter; replaces any earlier filter.
    ///
    /// # Errors
    ///
    /// Filter validation errors, or [`KernelError::Validation`] if a filter
    /// key collides with an explicit parameter.
    pub fn with_filter(mut self, filter: &ReportFilter) -> Result<Self> {
        let resolved = filter.resolve(self.capabilities, &self.prefix)?;
        if let Some(key) = resolved.keys().find(|k| self.parameters.contains_key(*k)) {
            return Err(filter_collision(&self.prefix, key));
        }
        self.filter = resolved;
        Ok(self)
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.prefix
    }

    /// Fully prefixed configuration keys, enable flag included.
    #[must_use]
    pub fn config_parameters(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        out.insert(self.prefix.clone(), Value::from(1));
        for (key, value) in self.parameters.iter().chain(&self.filter) {
            out.insert(format!("{}_{key}", self.prefix), value.clone());
        }
        out
    }
}

/// Reporter listed as one object in the registry document.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryReporter {
    class_name: String,
    capabilities: FilterCapabilities,
    parameters: BTreeMap<String, Value>,
    filter: BTreeMap<String, Value>,
}

impl RegistryReporter {
    /// # Errors
    ///
    /// [`KernelError::Validation`] for an empty class name.
    pub fn new(class_name: &str, capabilities: FilterCapabilities) -> Result<Self> {
        validate_class(class_name)?;
        Ok(Self {
            class_name: class_name.to_string(),
            capabilities,
            parameters: BTreeMap::new(),
            filter: BTreeMap::new(),
        })
    }

    /// # Errors
    ///
    /// [`KernelError::Validation`] for an empty key, the reserved `class`
    /// key, or a key already set by the filter.
    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        if key.is_empty() || key == CLASS_KEY {
            return Err(KernelError::validation(format!(
                "{}: invalid parameter name {key:?}",
                self.class_name
            )));
        }
        if self.filter.contains_key(key) {
            return Err(filter_collision(&self.class_name, key));
        }
        self.parameters.insert(key.to_string(), value.into());
        Ok(self)
    }

    /// Resolve and attach a filter; replaces any earlier filter.
    ///
    /// # Errors
    ///
    /// Filter validation errors, or [`KernelError::Validation`] if a filter
    /// key collides with an explicit parameter.
    pub fn with_filter(mut self, filter: &ReportFilter) -> Result<Self> {
        let resolved = filter.resolve(self.capabilities, &self.class_name)?;
        if let Some(key) = resolved.keys().find(|k| self.parameters.contains_key(*k)) {
            return Err(filter_collision(&self.class_name, key));
        }
        self.filter = resolved;
        Ok(self)
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The `{"class": ..., ...}` object for the `Reports` array.
    #[must_use]
    pub fn to_report(&self) -> Value {
        let mut obj: Map<String, Value> = self
            .parameters
            .iter()
            .chain(&self.filter)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        obj.insert(CLASS_KEY.into(), Value::from(self.class_name.as_str()));
        Value::Object(obj)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReporterDescriptor {
    Inline(InlineReporter),
    Registry(RegistryReporter),
}

impl ReporterDescriptor {
    #[must_use]
    pub fn class_name(&self) -> &str {
        match self {
            Self::Inline(r) => r.class_name(),
            Self::Registry(r) => r.class_name(),
        }
    }
}

impl From<InlineReporter> for ReporterDescriptor {
    fn from(r: InlineReporter) -> Self {
        Self::Inline(r)
    }
}

impl From<RegistryReporter> for ReporterDescriptor {
    fn from(r: RegistryReporter) -> Self {
        Self::Registry(r)
    }
}

fn validate_class(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(KernelError::validation("reporter class name is empty"))
    } else {
        Ok(())
    }
}

fn filter_collision(class: &str, key: &str) -> KernelError {
    KernelError::validation(format!(
        "{class}: parameter {key} is also set by the filter"
    ))
}
