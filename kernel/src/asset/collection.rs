//! Ordered, uniqueness-checked group of assets sharing one destination folder.
//!
//! # Persisted contract
//!
//! Each slot carries a `persisted` flag. [`AssetCollection::gather`] returns
//! only unpersisted entries and flips them, so a second gather without new
//! entries is empty. Clones share entries through `Arc`; the flags are per
//! collection instance.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::entry::{normalize_relative, AssetEntry};
use crate::error::{KernelError, Result};

/// What [`AssetCollection::add`] did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New filename; appended.
    Added,
    /// Same filename and same bytes as an existing entry; nothing changed.
    Skipped,
    /// Same filename, different bytes, duplicates allowed; old entry replaced.
    Replaced,
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Arc<AssetEntry>,
    persisted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AssetCollection {
    relative_path: String,
    slots: Vec<Slot>,
}

impl AssetCollection {
    #[must_use]
    pub fn new(relative_path: &str) -> Self {
        Self {
            relative_path: normalize_relative(relative_path),
            slots: Vec::new(),
        }
    }

    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Add an entry.
    ///
    /// With `fail_on_duplicate`, any filename collision is an error. Without
    /// it, an entry with identical bytes is skipped and one with different
    /// bytes replaces the existing slot (logged, returned as
    /// [`AddOutcome::Replaced`]).
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] if the entry targets another folder,
    /// [`KernelError::DuplicateAsset`] on a forbidden collision.
    pub fn add(&mut self, entry: AssetEntry, fail_on_duplicate: bool) -> Result<AddOutcome> {
        self.add_shared(Arc::new(entry), fail_on_duplicate)
    }

    /// [`AssetCollection::add`] for an entry already shared with another collection.
    ///
    /// # Errors
    ///
    /// See [`AssetCollection::add`].
    pub fn add_shared(
        &mut self,
        entry: Arc<AssetEntry>,
        fail_on_duplicate: bool,
    ) -> Result<AddOutcome> {
        if entry.relative_path() != self.relative_path {
            return Err(KernelError::validation(format!(
                "{} does not belong in folder {:?}",
                entry.destination(),
                self.relative_path
            )));
        }

        let Some(index) = self.position(entry.filename()) else {
            debug!(destination = %entry.destination(), "asset added");
            self.slots.push(Slot {
                entry,
                persisted: false,
            });
            return Ok(AddOutcome::Added);
        };

        if fail_on_duplicate {
            return Err(KernelError::DuplicateAsset {
                path: entry.destination(),
            });
        }
        if self.slots[index].entry.content_hash() == entry.content_hash() {
            return Ok(AddOutcome::Skipped);
        }
        warn!(
            destination = %entry.destination(),
            old = %self.slots[index].entry.content_hash(),
            new = %entry.content_hash(),
            "asset replaced with different content"
        );
        self.slots[index] = Slot {
            entry,
            persisted: false,
        };
        Ok(AddOutcome::Replaced)
    }

    /// Add a file from disk under its own filename.
    ///
    /// # Errors
    ///
    /// See [`AssetEntry::from_file`] and [`AssetCollection::add`].
    pub fn add_file(&mut self, path: &Path, fail_on_duplicate: bool) -> Result<AddOutcome> {
        let entry = AssetEntry::from_file(path, &self.relative_path)?;
        self.add(entry, fail_on_duplicate)
    }

    /// Add in-memory content.
    ///
    /// # Errors
    ///
    /// See [`AssetEntry::from_content`] and [`AssetCollection::add`].
    pub fn add_content(
        &mut self,
        filename: &str,
        content: impl Into<Vec<u8>>,
        fail_on_duplicate: bool,
    ) -> Result<AddOutcome> {
        let entry = AssetEntry::from_content(filename, content, &self.relative_path)?;
        self.add(entry, fail_on_duplicate)
    }

    /// Add several entries; either all are applied or none.
    ///
    /// # Errors
    ///
    /// The first error any single `add` would raise.
    pub fn extend(
        &mut self,
        entries: impl IntoIterator<Item = AssetEntry>,
        fail_on_duplicate: bool,
    ) -> Result<()> {
        let mut staged = self.clone();
        for entry in entries {
            staged.add(entry, fail_on_duplicate)?;
        }
        *self = staged;
        Ok(())
    }

    /// Return unpersisted entries in insertion order and mark them persisted.
    pub fn gather(&mut self) -> Vec<Arc<AssetEntry>> {
        let mut out = Vec::new();
        for slot in &mut self.slots {
            if !slot.persisted {
                slot.persisted = true;
                out.push(Arc::clone(&slot.entry));
            }
        }
        out
    }

    /// Mark every current entry persisted without returning it.
    pub fn mark_all_persisted(&mut self) {
        for slot in &mut self.slots {
            slot.persisted = true;
        }
    }

    /// Forget what was gathered, so the next gather returns every entry again.
    pub fn mark_all_unpersisted(&mut self) {
        for slot in &mut self.slots {
            slot.persisted = false;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Drop the entry staged under `filename`, if any.
    pub fn remove(&mut self, filename: &str) -> Option<Arc<AssetEntry>> {
        let index = self.position(filename)?;
        Some(self.slots.remove(index).entry)
    }

    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&Arc<AssetEntry>> {
        self.position(filename).map(|i| &self.slots[i].entry)
    }

    #[must_use]
    pub fn is_persisted(&self, filename: &str) -> Option<bool> {
        self.position(filename).map(|i| self.slots[i].persisted)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AssetEntry>> {
        self.slots.iter().map(|s| &s.entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn position(&self, filename: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.entry.filename() == filename)
    }
}

/// Merge gathered lists from several collections into one upload list.
///
/// Entries with the same destination and the same bytes are emitted once;
/// the same destination with different bytes is an error.
///
/// # Errors
///
/// [`KernelError::DuplicateAsset`] naming the conflicting destination.
pub fn dedupe_by_destination(
    entries: impl IntoIterator<Item = Arc<AssetEntry>>,
) -> Result<Vec<Arc<AssetEntry>>> {
    let mut seen: BTreeMap<String, Arc<AssetEntry>> = BTreeMap::new();
    let mut out = Vec::new();
    for entry in entries {
        let destination = entry.destination();
        match seen.get(&destination) {
            Some(existing) if existing.content_hash() == entry.content_hash() => {}
            Some(_) => return Err(KernelError::DuplicateAsset { path: destination }),
            None => {
                seen.insert(destination, Arc::clone(&entry));
                out.push(entry);
            }
        }
    }
    Ok(out)
}
