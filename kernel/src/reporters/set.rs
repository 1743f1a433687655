//! Reporter collection and its rendering into config + registry document.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::descriptor::{InlineReporter, RegistryReporter, ReporterDescriptor};
use crate::asset::{AssetCollection, AssetEntry};
use crate::config::ConfigDocument;
use crate::error::{KernelError, Result};
use crate::proof::canon::document_json_bytes;

/// Config key naming the registry document.
pub const CUSTOM_REPORTS_KEY: &str = "Custom_Reports_Filename";

const PLUGIN_EXTENSIONS: [&str; 2] = ["dll", "so"];

#[derive(Debug, Clone, Default)]
pub struct ReporterSet {
    inline: Vec<InlineReporter>,
    registry: Vec<RegistryReporter>,
    plugins: AssetCollection,
}

impl ReporterSet {
    /// Empty set whose plugin libraries land in `plugin_folder`.
    #[must_use]
    pub fn new(plugin_folder: &str) -> Self {
        Self {
            inline: Vec::new(),
            registry: Vec::new(),
            plugins: AssetCollection::new(plugin_folder),
        }
    }

    /// Add a reporter.
    ///
    /// Registry reporters always append; several instances of one report
    /// type are legal.
    ///
    /// # Errors
    ///
    /// [`KernelError::ConfigurationConflict`] for a second inline reporter of
    /// the same class.
    pub fn add(&mut self, descriptor: impl Into<ReporterDescriptor>) -> Result<()> {
        match descriptor.into() {
            ReporterDescriptor::Inline(reporter) => {
                if self.has_inline(reporter.class_name()) {
                    return Err(KernelError::ConfigurationConflict {
                        class: reporter.class_name().to_string(),
                    });
                }
                debug!(class = reporter.class_name(), "inline reporter added");
                self.inline.push(reporter);
            }
            ReporterDescriptor::Registry(reporter) => {
                debug!(class = reporter.class_name(), "registry reporter added");
                self.registry.push(reporter);
            }
        }
        Ok(())
    }

    /// Track a reporter plugin library (`.dll` or `.so`).
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for any other extension;
    /// [`KernelError::DuplicateAsset`] when a library of the same name but
    /// different bytes is already tracked. The same filename with identical
    /// bytes is a no-op.
    pub fn add_plugin_library(&mut self, path: &Path) -> Result<()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !ext.as_deref().is_some_and(|e| PLUGIN_EXTENSIONS.contains(&e)) {
            return Err(KernelError::validation(format!(
                "reporter plugin must be a .dll or .so library: {}",
                path.display()
            )));
        }
        let entry = AssetEntry::from_file(path, self.plugins.relative_path())?;
        add_plugin(&mut self.plugins, Arc::new(entry))
    }

    /// Fold inline reporters into `config` and build the registry document.
    ///
    /// Inline keys go through schema validation. When registry reporters
    /// exist, `Custom_Reports_Filename` is set to `registry_filename` and the
    /// document is returned as an in-memory entry. `config` is unchanged on
    /// error.
    ///
    /// # Errors
    ///
    /// [`KernelError::MissingPrerequisite`] if inline reporters exist and
    /// `config` has no schema; [`KernelError::Validation`] for keys the
    /// schema does not declare.
    pub fn render(
        &self,
        config: &mut ConfigDocument,
        registry_filename: &str,
    ) -> Result<Option<AssetEntry>> {
        let mut staged = config.clone();
        for reporter in &self.inline {
            if staged.schema().is_none() {
                return Err(KernelError::missing(format!(
                    "schema (needed to render inline reporter {})",
                    reporter.class_name()
                )));
            }
            for (key, value) in reporter.config_parameters() {
                staged.set_parameter(&key, value)?;
            }
        }

        let registry = if self.registry.is_empty() {
            None
        } else {
            staged.insert(CUSTOM_REPORTS_KEY, registry_filename);
            let bytes = document_json_bytes(&self.registry_document())?;
            Some(AssetEntry::from_content(registry_filename, bytes, "")?)
        };

        debug!(
            inline = self.inline.len(),
            registry = self.registry.len(),
            "reporters rendered"
        );
        *config = staged;
        Ok(registry)
    }

    /// `{"Reports": [...], "Use_Defaults": 1}`.
    #[must_use]
    pub fn registry_document(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "Reports".into(),
            Value::Array(self.registry.iter().map(RegistryReporter::to_report).collect()),
        );
        root.insert("Use_Defaults".into(), Value::from(1));
        Value::Object(root)
    }

    /// Union of two sets: `self` first, then `other`.
    ///
    /// Plugin libraries are merged with identical-bytes dedup.
    ///
    /// # Errors
    ///
    /// [`KernelError::ConfigurationConflict`] if both hold an inline reporter
    /// of the same class; [`KernelError::DuplicateAsset`] if both hold a
    /// plugin library of the same name with different bytes.
    pub fn merged_with(&self, other: &Self) -> Result<Self> {
        let mut merged = self.clone();
        for reporter in &other.inline {
            merged.add(reporter.clone())?;
        }
        merged.registry.extend(other.registry.iter().cloned());
        for plugin in other.plugins.iter() {
            add_plugin(&mut merged.plugins, Arc::clone(plugin))?;
        }
        Ok(merged)
    }

    pub fn gather_plugins(&mut self) -> Vec<Arc<AssetEntry>> {
        self.plugins.gather()
    }

    pub fn mark_all_persisted(&mut self) {
        self.plugins.mark_all_persisted();
    }

    pub fn mark_all_unpersisted(&mut self) {
        self.plugins.mark_all_unpersisted();
    }

    #[must_use]
    pub fn has_inline(&self, class_name: &str) -> bool {
        self.inline.iter().any(|r| r.class_name() == class_name)
    }

    #[must_use]
    pub fn inline(&self) -> &[InlineReporter] {
        &self.inline
    }

    #[must_use]
    pub fn registry(&self) -> &[RegistryReporter] {
        &self.registry
    }

    #[must_use]
    pub fn plugins(&self) -> &AssetCollection {
        &self.plugins
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inline.is_empty() && self.registry.is_empty() && self.plugins.is_empty()
    }
}

fn add_plugin(plugins: &mut AssetCollection, entry: Arc<AssetEntry>) -> Result<()> {
    if let Some(existing) = plugins.get(entry.filename()) {
        if existing.content_hash() != entry.content_hash() {
            return Err(KernelError::DuplicateAsset {
                path: entry.destination(),
            });
        }
    }
    plugins.add_shared(entry, false)?;
    Ok(())
}
