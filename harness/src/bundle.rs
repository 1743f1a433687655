//! In-memory run bundle: everything one simulation run needs on disk.
//!
//! No file I/O beyond reading asset sources. Artifacts are keyed by their
//! path inside the run directory: common assets live under the assets
//! folder, transient ones at the root.
//!
//! The run digest is `canonical_hash(RunDigest, manifest)`, where the
//! manifest is canonical JSON listing every artifact path, scope and content
//! hash plus the command line tokens.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use emodkit_kernel::asset::entry::join_relative;
use emodkit_kernel::asset::AssetEntry;
use emodkit_kernel::proof::canon::canonical_json_bytes;
use emodkit_kernel::proof::hash::{canonical_hash, ContentHash, HashDomain};
use emodkit_kernel::KernelError;

use crate::command::CommandLine;

/// Manifest `schema_version`.
pub const RUN_MANIFEST_VERSION: &str = "run.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactScope {
    /// Experiment-wide asset, placed under the assets folder.
    Common,
    /// Per-run document or override, placed at the run root.
    Transient,
}

impl ArtifactScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Transient => "transient",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "common" => Some(Self::Common),
            "transient" => Some(Self::Transient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifact {
    /// `/`-separated path inside the run directory.
    pub path: String,
    pub scope: ArtifactScope,
    pub content: Vec<u8>,
    pub content_hash: ContentHash,
}

#[derive(Debug, Clone)]
pub struct RunBundle {
    pub artifacts: BTreeMap<String, RunArtifact>,
    pub command_line: Vec<String>,
    /// Canonical JSON manifest.
    pub manifest: Vec<u8>,
    pub digest: ContentHash,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("two artifacts map to {path}")]
    DuplicatePath { path: String },

    #[error("invalid artifact path {path:?}")]
    InvalidPath { path: String },

    #[error("content hash mismatch for {path}: expected {expected}, got {actual}")]
    ContentHashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("stored manifest does not match the artifacts")]
    ManifestMismatch,

    #[error("manifest is not canonical JSON")]
    ManifestNotCanonical,

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

impl RunBundle {
    /// Assemble a bundle from gathered assets.
    ///
    /// Asset bytes are read now and checked against the hash taken when the
    /// entry was created, so a source file edited in between is caught.
    ///
    /// # Errors
    ///
    /// [`BundleError::ContentHashMismatch`] for a changed source,
    /// [`BundleError::DuplicatePath`] when two assets land on one path,
    /// kernel I/O errors.
    pub fn build(
        common: &[Arc<AssetEntry>],
        transient: &[Arc<AssetEntry>],
        command_line: &CommandLine,
        assets_dir: &str,
    ) -> Result<Self, BundleError> {
        let mut artifacts = BTreeMap::new();
        let scoped = common
            .iter()
            .map(|e| (ArtifactScope::Common, e))
            .chain(transient.iter().map(|e| (ArtifactScope::Transient, e)));
        for (scope, entry) in scoped {
            let path = match scope {
                ArtifactScope::Common => join_relative(assets_dir, &entry.destination(), '/'),
                ArtifactScope::Transient => entry.destination(),
            };
            validate_path(&path)?;
            let content = entry.read_bytes()?.into_owned();
            let actual = canonical_hash(HashDomain::AssetContent, &content);
            if &actual != entry.content_hash() {
                return Err(BundleError::ContentHashMismatch {
                    path,
                    expected: entry.content_hash().to_string(),
                    actual: actual.to_string(),
                });
            }
            if artifacts.contains_key(&path) {
                return Err(BundleError::DuplicatePath { path });
            }
            artifacts.insert(
                path.clone(),
                RunArtifact {
                    path,
                    scope,
                    content,
                    content_hash: actual,
                },
            );
        }
        Self::assemble(artifacts, command_line.tokens())
    }

    /// Compute manifest and digest for already-hashed artifacts.
    pub(crate) fn assemble(
        artifacts: BTreeMap<String, RunArtifact>,
        command_line: Vec<String>,
    ) -> Result<Self, BundleError> {
        let manifest = compute_manifest_bytes(&artifacts, &command_line)?;
        let digest = canonical_hash(HashDomain::RunDigest, &manifest);
        Ok(Self {
            artifacts,
            command_line,
            manifest,
            digest,
        })
    }

    /// Recheck every artifact hash, the manifest and the digest.
    ///
    /// # Errors
    ///
    /// The first mismatch found.
    pub fn verify(&self) -> Result<(), BundleError> {
        for artifact in self.artifacts.values() {
            let recomputed = canonical_hash(HashDomain::AssetContent, &artifact.content);
            if recomputed != artifact.content_hash {
                return Err(BundleError::ContentHashMismatch {
                    path: artifact.path.clone(),
                    expected: artifact.content_hash.to_string(),
                    actual: recomputed.to_string(),
                });
            }
        }

        let expected = compute_manifest_bytes(&self.artifacts, &self.command_line)?;
        if expected != self.manifest {
            return Err(BundleError::ManifestMismatch);
        }
        verify_canonical_json(&self.manifest)?;

        let recomputed = canonical_hash(HashDomain::RunDigest, &self.manifest);
        if recomputed != self.digest {
            return Err(BundleError::DigestMismatch {
                expected: self.digest.to_string(),
                actual: recomputed.to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn artifact(&self, path: &str) -> Option<&RunArtifact> {
        self.artifacts.get(path)
    }
}

/// Reject absolute paths, backslashes, and empty / `.` / `..` components.
pub(crate) fn validate_path(path: &str) -> Result<(), BundleError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..");
    if bad {
        Err(BundleError::InvalidPath {
            path: path.to_string(),
        })
    } else {
        Ok(())
    }
}

fn compute_manifest_bytes(
    artifacts: &BTreeMap<String, RunArtifact>,
    command_line: &[String],
) -> Result<Vec<u8>, BundleError> {
    let listed: Vec<serde_json::Value> = artifacts
        .values()
        .map(|a| {
            serde_json::json!({
                "content_hash": a.content_hash.as_str(),
                "path": a.path,
                "scope": a.scope.as_str(),
            })
        })
        .collect();

    let manifest = serde_json::json!({
        "artifacts": listed,
        "command_line": command_line,
        "schema_version": RUN_MANIFEST_VERSION,
    });
    Ok(canonical_json_bytes(&manifest)?)
}

fn verify_canonical_json(bytes: &[u8]) -> Result<(), BundleError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| BundleError::ManifestNotCanonical)?;
    let canonical = canonical_json_bytes(&value).map_err(|_| BundleError::ManifestNotCanonical)?;
    if canonical == bytes {
        Ok(())
    } else {
        Err(BundleError::ManifestNotCanonical)
    }
}
