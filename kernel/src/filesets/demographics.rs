//! Demographics inputs: an ordered list of `.json` documents.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::asset::entry::require_extension;
use crate::asset::{AssetCollection, AssetEntry};
use crate::config::ConfigDocument;
use crate::error::{KernelError, Result};

pub const FILENAMES_KEY: &str = "Demographics_Filenames";
pub const BUILTIN_KEY: &str = "Enable_Demographics_Builtin";

#[derive(Debug, Clone, Default)]
pub struct DemographicsFileSet {
    assets: AssetCollection,
}

impl DemographicsFileSet {
    #[must_use]
    pub fn new(relative_path: &str) -> Self {
        Self {
            assets: AssetCollection::new(relative_path),
        }
    }

    /// Add one `.json` file, or every `.json` file directly inside a directory.
    ///
    /// `filename` renames a single file; it is ignored for directories.
    /// Directory contents are added in filename order.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for a non-`.json` file or a directory
    /// without `.json` files; [`KernelError::DuplicateAsset`] if a filename is
    /// already present; [`KernelError::Io`] on read failures. Nothing is
    /// added on error.
    pub fn add_from_file(&mut self, path: &Path, filename: Option<&str>) -> Result<()> {
        let relative = self.assets.relative_path().to_string();
        let entries = if path.is_dir() {
            let mut found = Vec::new();
            let listing = std::fs::read_dir(path).map_err(|e| KernelError::io(path, e))?;
            for item in listing {
                let item = item.map_err(|e| KernelError::io(path, e))?;
                let candidate = item.path();
                if candidate.is_file() && require_extension(&candidate, "json").is_ok() {
                    found.push(candidate);
                }
            }
            if found.is_empty() {
                return Err(KernelError::validation(format!(
                    "no .json demographics files in {}",
                    path.display()
                )));
            }
            found.sort();
            found
                .iter()
                .map(|p| AssetEntry::from_file(p, &relative))
                .collect::<Result<Vec<_>>>()?
        } else {
            require_extension(path, "json")?;
            let entry = match filename {
                Some(name) => AssetEntry::from_file_named(path, &relative, name)?,
                None => AssetEntry::from_file(path, &relative)?,
            };
            vec![entry]
        };
        debug!(count = entries.len(), source = %path.display(), "demographics added");
        self.assets.extend(entries, true)
    }

    /// Add an in-memory demographics document.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] if `filename` does not end in `.json`,
    /// [`KernelError::DuplicateAsset`] if it is already present.
    pub fn add_document(&mut self, filename: &str, document: &Value) -> Result<()> {
        require_extension(Path::new(filename), "json")?;
        let bytes = serde_json::to_vec_pretty(document)?;
        self.assets.add_content(filename, bytes, true)?;
        Ok(())
    }

    /// Drop every entry (e.g. to discard defaults before loading custom files).
    pub fn clear(&mut self) {
        self.assets.clear();
    }

    /// Write `Demographics_Filenames` and `Enable_Demographics_Builtin=0`.
    ///
    /// Without `extend` the filename list is replaced. With `extend`, names
    /// not already listed are appended in order after the existing ones.
    pub fn render(&self, config: &mut ConfigDocument, extend: bool) {
        let mine: Vec<String> = self.destinations().collect();
        let list: Vec<Value> = if extend {
            let mut existing: Vec<Value> = match config.get(FILENAMES_KEY) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            for name in mine {
                let value = Value::from(name);
                if !existing.contains(&value) {
                    existing.push(value);
                }
            }
            existing
        } else {
            mine.into_iter().map(Value::from).collect()
        };
        config.insert(FILENAMES_KEY, Value::Array(list));
        config.insert(BUILTIN_KEY, 0);
    }

    pub fn destinations(&self) -> impl Iterator<Item = String> + '_ {
        self.assets.iter().map(|e| e.destination())
    }

    pub fn gather(&mut self) -> Vec<Arc<AssetEntry>> {
        self.assets.gather()
    }

    pub fn mark_all_persisted(&mut self) {
        self.assets.mark_all_persisted();
    }

    pub fn mark_all_unpersisted(&mut self) {
        self.assets.mark_all_unpersisted();
    }

    #[must_use]
    pub fn assets(&self) -> &AssetCollection {
        &self.assets
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
