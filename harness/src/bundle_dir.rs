//! Run directory persistence: write/read/verify a [`RunBundle`] on disk.
//!
//! # Layout
//!
//! ```text
//! <dir>/
//!   run_manifest.json        canonical JSON, full artifact listing
//!   run_digest.txt           "sha256:..." over the manifest
//!   config.json              transient artifacts at the root
//!   campaign.json
//!   Assets/                  common artifacts under the assets folder
//!     Eradication
//!     climate/rain.bin
//! ```
//!
//! The directory path is never hashed. The manifest is the source of truth
//! for what must exist.
//!
//! # Fail-closed semantics
//!
//! - Missing declared artifact → error
//! - Extra undeclared file anywhere below `<dir>` → error
//! - Content hash, manifest or digest mismatch → error

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use emodkit_kernel::proof::hash::{canonical_hash, ContentHash, HashDomain};

use crate::bundle::{
    validate_path, ArtifactScope, BundleError, RunArtifact, RunBundle, RUN_MANIFEST_VERSION,
};

const MANIFEST_FILENAME: &str = "run_manifest.json";
const DIGEST_FILENAME: &str = "run_digest.txt";
const METADATA_FILENAMES: &[&str] = &[MANIFEST_FILENAME, DIGEST_FILENAME];
const TEMP_PREFIX: &str = ".tmp_";

#[derive(Debug, Error)]
pub enum RunDirError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing metadata file: {filename}")]
    MissingMetadata { filename: String },

    #[error("missing artifact: {path}")]
    MissingArtifact { path: String },

    #[error("undeclared extra file: {path}")]
    ExtraFile { path: String },

    #[error("manifest invalid: {detail}")]
    ManifestInvalid { detail: String },

    #[error("manifest version mismatch: {found}")]
    ManifestVersionMismatch { found: String },

    #[error("digest mismatch: stored={stored}, recomputed={recomputed}")]
    DigestMismatch { stored: String, recomputed: String },

    #[error(transparent)]
    Bundle(#[from] BundleError),
}

impl RunDirError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn invalid(detail: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            detail: detail.into(),
        }
    }
}

/// Write `bundle` into `dir`, creating folders as needed.
///
/// # Errors
///
/// [`RunDirError::Io`] on any filesystem failure.
pub fn write_run_dir(bundle: &RunBundle, dir: &Path) -> Result<(), RunDirError> {
    std::fs::create_dir_all(dir).map_err(|e| RunDirError::io(dir, e))?;

    for artifact in bundle.artifacts.values() {
        write_atomic(&dir.join(&artifact.path), &artifact.content)?;
    }
    write_atomic(&dir.join(MANIFEST_FILENAME), &bundle.manifest)?;
    write_atomic(&dir.join(DIGEST_FILENAME), bundle.digest.as_str().as_bytes())?;

    info!(
        dir = %dir.display(),
        artifacts = bundle.artifacts.len(),
        digest = %bundle.digest,
        "run directory written"
    );
    Ok(())
}

/// Read a run directory back into a [`RunBundle`].
///
/// Declared hashes are taken from the manifest; use [`verify_run_dir`] to
/// also recheck the bytes.
///
/// # Errors
///
/// Any layout violation listed in the module docs.
pub fn read_run_dir(dir: &Path) -> Result<RunBundle, RunDirError> {
    let manifest_bytes = read_required(dir, MANIFEST_FILENAME)?;
    let digest_bytes = read_required(dir, DIGEST_FILENAME)?;

    let manifest: serde_json::Value =
        serde_json::from_slice(&manifest_bytes).map_err(|e| RunDirError::invalid(e.to_string()))?;

    let version = manifest["schema_version"].as_str().unwrap_or("");
    if version != RUN_MANIFEST_VERSION {
        return Err(RunDirError::ManifestVersionMismatch {
            found: version.to_string(),
        });
    }

    let command_line = manifest["command_line"]
        .as_array()
        .ok_or_else(|| RunDirError::invalid("\"command_line\" is not an array"))?
        .iter()
        .map(|t| {
            t.as_str()
                .map(str::to_string)
                .ok_or_else(|| RunDirError::invalid("command line token is not a string"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let entries = manifest["artifacts"]
        .as_array()
        .ok_or_else(|| RunDirError::invalid("\"artifacts\" is not an array"))?;

    let mut artifacts = BTreeMap::new();
    for entry in entries {
        let path = entry["path"]
            .as_str()
            .ok_or_else(|| RunDirError::invalid("missing \"path\" field"))?
            .to_string();
        validate_path(&path)?;
        let scope = entry["scope"]
            .as_str()
            .and_then(ArtifactScope::parse)
            .ok_or_else(|| RunDirError::invalid(format!("bad \"scope\" for {path}")))?;
        let hash_str = entry["content_hash"]
            .as_str()
            .ok_or_else(|| RunDirError::invalid(format!("missing \"content_hash\" for {path}")))?;
        let content_hash = ContentHash::parse(hash_str)
            .ok_or_else(|| RunDirError::invalid(format!("bad content_hash for {path}: {hash_str}")))?;

        let content = std::fs::read(dir.join(&path))
            .map_err(|_| RunDirError::MissingArtifact { path: path.clone() })?;

        artifacts.insert(
            path.clone(),
            RunArtifact {
                path,
                scope,
                content,
                content_hash,
            },
        );
    }

    let metadata: BTreeSet<&str> = METADATA_FILENAMES.iter().copied().collect();
    for found in list_files(dir)? {
        if !artifacts.contains_key(&found) && !metadata.contains(found.as_str()) {
            return Err(RunDirError::ExtraFile { path: found });
        }
    }

    let recomputed = canonical_hash(HashDomain::RunDigest, &manifest_bytes);
    let stored = String::from_utf8_lossy(&digest_bytes).trim().to_string();
    if recomputed.as_str() != stored {
        return Err(RunDirError::DigestMismatch {
            stored,
            recomputed: recomputed.to_string(),
        });
    }

    debug!(dir = %dir.display(), artifacts = artifacts.len(), "run directory read");
    Ok(RunBundle {
        artifacts,
        command_line,
        manifest: manifest_bytes,
        digest: recomputed,
    })
}

/// Read a run directory and recheck every byte against its manifest.
///
/// # Errors
///
/// Read errors, or [`RunDirError::Bundle`] on an integrity mismatch.
pub fn verify_run_dir(dir: &Path) -> Result<RunBundle, RunDirError> {
    let bundle = read_run_dir(dir)?;
    bundle.verify()?;
    Ok(bundle)
}

/// Write through a temp file in the same folder, then rename.
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), RunDirError> {
    let parent = path
        .parent()
        .ok_or_else(|| RunDirError::invalid(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| RunDirError::io(parent, e))?;

    let temp_name = format!(
        "{TEMP_PREFIX}{}",
        path.file_name().unwrap_or_default().to_string_lossy()
    );
    let temp_path = parent.join(temp_name);
    std::fs::write(&temp_path, content).map_err(|e| RunDirError::io(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| RunDirError::io(path, e))?;
    Ok(())
}

fn read_required(dir: &Path, filename: &str) -> Result<Vec<u8>, RunDirError> {
    std::fs::read(dir.join(filename)).map_err(|_| RunDirError::MissingMetadata {
        filename: filename.to_string(),
    })
}

/// Every regular file below `dir`, as `/`-joined relative paths.
fn list_files(dir: &Path) -> Result<BTreeSet<String>, RunDirError> {
    let mut files = BTreeSet::new();
    let mut pending = vec![(dir.to_path_buf(), String::new())];
    while let Some((current, prefix)) = pending.pop() {
        let listing = std::fs::read_dir(&current).map_err(|e| RunDirError::io(&current, e))?;
        for item in listing {
            let item = item.map_err(|e| RunDirError::io(&current, e))?;
            let file_type = item.file_type().map_err(|e| RunDirError::io(&item.path(), e))?;
            let Some(name) = item.file_name().to_str().map(str::to_string) else {
                return Err(RunDirError::ExtraFile {
                    path: item.path().display().to_string(),
                });
            };
            let relative = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            if file_type.is_dir() {
                pending.push((item.path(), relative));
            } else if !name.starts_with(TEMP_PREFIX) {
                files.insert(relative);
            }
        }
    }
    Ok(files)
}
