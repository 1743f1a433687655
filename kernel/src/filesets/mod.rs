//! Domain file sets: migration, demographics, climate.
//!
//! Each set wraps an [`AssetCollection`] with domain parameters and renders
//! its keys into a [`crate::config::ConfigDocument`]. Mutations are staged on
//! a copy and swapped in only on success, so a failed call leaves the set
//! untouched.

pub mod climate;
pub mod demographics;
pub mod migration;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::asset::entry::require_extension;
use crate::asset::{AddOutcome, AssetCollection, AssetEntry};
use crate::error::{KernelError, Result};

pub use climate::{
    ClimateChannel, ClimateFileSet, ClimateModel, ClimateStochasticity, UpdateResolution,
};
pub use demographics::DemographicsFileSet;
pub use migration::{
    MigrationBuilder, MigrationFileSet, MigrationModel, MigrationPattern, MigrationType,
};

/// A binary input together with its optional JSON header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StagedBinary {
    pub entry: Arc<AssetEntry>,
    pub sidecar: Option<Arc<AssetEntry>>,
}

impl StagedBinary {
    /// Load `path` (which must end in `.bin`) and `<path>.json` if it exists.
    pub(crate) fn from_file(path: &Path, relative_path: &str) -> Result<Self> {
        require_extension(path, "bin")?;
        let entry = AssetEntry::from_file(path, relative_path)?;
        let sidecar_path = sidecar_path(path);
        let sidecar = if sidecar_path.is_file() {
            Some(Arc::new(AssetEntry::from_file(&sidecar_path, relative_path)?))
        } else {
            None
        };
        Ok(Self {
            entry: Arc::new(entry),
            sidecar,
        })
    }

    /// Wrap in-memory bytes; `filename` must end in `.bin`.
    pub(crate) fn from_content(
        filename: &str,
        content: Vec<u8>,
        header: Option<&serde_json::Value>,
        relative_path: &str,
    ) -> Result<Self> {
        require_extension(Path::new(filename), "bin")?;
        let entry = AssetEntry::from_content(filename, content, relative_path)?;
        let sidecar = match header {
            Some(h) => Some(Arc::new(AssetEntry::from_content(
                &format!("{filename}.json"),
                serde_json::to_vec_pretty(h)?,
                relative_path,
            )?)),
            None => None,
        };
        Ok(Self {
            entry: Arc::new(entry),
            sidecar,
        })
    }

    fn entries(&self) -> impl Iterator<Item = &Arc<AssetEntry>> {
        std::iter::once(&self.entry).chain(self.sidecar.iter())
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".json");
    PathBuf::from(s)
}

/// Put `incoming` into `assets`, dropping `replacing` first.
///
/// A filename already held by another binary is accepted only when the bytes
/// are identical.
pub(crate) fn stage_into(
    assets: &mut AssetCollection,
    incoming: &StagedBinary,
    replacing: Option<&StagedBinary>,
) -> Result<()> {
    if let Some(old) = replacing {
        for entry in old.entries() {
            assets.remove(entry.filename());
        }
    }
    for entry in incoming.entries() {
        if assets.add_shared(Arc::clone(entry), false)? == AddOutcome::Replaced {
            return Err(KernelError::DuplicateAsset {
                path: entry.destination(),
            });
        }
    }
    Ok(())
}

/// True when another key of `map` still refers to the same destination as `key`.
pub(crate) fn shared_elsewhere<K: Ord + Copy>(
    map: &std::collections::BTreeMap<K, StagedBinary>,
    key: K,
) -> bool {
    let Some(target) = map.get(&key) else {
        return false;
    };
    map.iter()
        .any(|(k, v)| *k != key && v.entry.filename() == target.entry.filename())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_is_picked_up_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("Local_Migration.bin");
        std::fs::write(&bin, [0u8; 12]).unwrap();
        std::fs::write(dir.path().join("Local_Migration.bin.json"), b"{}").unwrap();

        let staged = StagedBinary::from_file(&bin, "").unwrap();
        assert_eq!(
            staged.sidecar.as_ref().unwrap().filename(),
            "Local_Migration.bin.json"
        );
    }

    #[test]
    fn non_bin_is_rejected_before_io() {
        let err = StagedBinary::from_file(Path::new("/nowhere/rates.csv"), "").unwrap_err();
        assert!(matches!(err, KernelError::Validation(_)));
    }

    #[test]
    fn stage_rejects_same_name_different_bytes() {
        let mut assets = AssetCollection::new("");
        let a = StagedBinary::from_content("m.bin", vec![1], None, "").unwrap();
        let b = StagedBinary::from_content("m.bin", vec![2], None, "").unwrap();
        stage_into(&mut assets, &a, None).unwrap();
        let err = stage_into(&mut assets, &b, None).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateAsset { .. }));
    }
}
