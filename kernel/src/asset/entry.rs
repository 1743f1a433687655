//! One staged input file.
//!
//! An [`AssetEntry`] is immutable once built: identity is the destination
//! (relative folder + filename) and the bytes are pinned by a content hash
//! computed at construction. Changing a file means building a new entry.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{KernelError, Result};
use crate::proof::hash::{canonical_hash, hash_file, ContentHash, HashDomain};

/// Where the bytes of an entry come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Absolute path of a file on the local filesystem.
    File(PathBuf),
    /// Literal content held in memory.
    Content(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    relative_path: String,
    filename: String,
    source: AssetSource,
    content_hash: ContentHash,
}

impl AssetEntry {
    /// Build a file-backed entry named after the source file.
    ///
    /// The source path is made absolute and the file is hashed immediately.
    ///
    /// # Errors
    ///
    /// [`KernelError::Io`] if the file cannot be resolved or read,
    /// [`KernelError::Validation`] if the path has no filename.
    pub fn from_file(path: impl AsRef<Path>, relative_path: &str) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                KernelError::validation(format!("{} has no usable filename", path.display()))
            })?
            .to_string();
        Self::from_file_named(path, relative_path, &filename)
    }

    /// Build a file-backed entry staged under a different filename.
    ///
    /// # Errors
    ///
    /// See [`AssetEntry::from_file`].
    pub fn from_file_named(
        path: impl AsRef<Path>,
        relative_path: &str,
        filename: &str,
    ) -> Result<Self> {
        let path = path.as_ref();
        validate_filename(filename)?;
        let absolute = std::fs::canonicalize(path).map_err(|e| KernelError::io(path, e))?;
        if !absolute.is_file() {
            return Err(KernelError::validation(format!(
                "{} is not a regular file",
                absolute.display()
            )));
        }
        let content_hash = hash_file(HashDomain::AssetContent, &absolute)?;
        Ok(Self {
            relative_path: normalize_relative(relative_path),
            filename: filename.to_string(),
            source: AssetSource::File(absolute),
            content_hash,
        })
    }

    /// Build an in-memory entry.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] if `filename` is empty or contains a path separator.
    pub fn from_content(
        filename: &str,
        content: impl Into<Vec<u8>>,
        relative_path: &str,
    ) -> Result<Self> {
        validate_filename(filename)?;
        let content = content.into();
        let content_hash = canonical_hash(HashDomain::AssetContent, &content);
        Ok(Self {
            relative_path: normalize_relative(relative_path),
            filename: filename.to_string(),
            source: AssetSource::Content(content),
            content_hash,
        })
    }

    /// Destination folder, `/`-separated, empty for the asset root.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    #[must_use]
    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    /// Destination path relative to the asset root (`folder/filename`).
    #[must_use]
    pub fn destination(&self) -> String {
        join_relative(&self.relative_path, &self.filename, '/')
    }

    /// Lower-cased extension of the destination filename, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Load the entry's bytes.
    ///
    /// # Errors
    ///
    /// [`KernelError::Io`] if a file-backed source can no longer be read.
    pub fn read_bytes(&self) -> Result<Cow<'_, [u8]>> {
        match &self.source {
            AssetSource::Content(bytes) => Ok(Cow::Borrowed(bytes)),
            AssetSource::File(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| KernelError::io(path, e)),
        }
    }
}

/// Join a relative folder and a filename with `sep`; empty folder yields the filename.
#[must_use]
pub fn join_relative(relative_path: &str, filename: &str, sep: char) -> String {
    if relative_path.is_empty() {
        filename.to_string()
    } else {
        let folder = relative_path.replace(['/', '\\'], &sep.to_string());
        format!("{folder}{sep}{filename}")
    }
}

/// Require `path` to carry extension `ext` (case-insensitive, no dot).
///
/// # Errors
///
/// [`KernelError::Validation`] naming the offending path.
pub fn require_extension(path: &Path, ext: &str) -> Result<()> {
    let matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext));
    if matches {
        Ok(())
    } else {
        Err(KernelError::validation(format!(
            "{} must have a .{ext} extension",
            path.display()
        )))
    }
}

pub(crate) fn normalize_relative(relative_path: &str) -> String {
    relative_path
        .replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() || filename.contains(['/', '\\']) || filename == ".." {
        return Err(KernelError::validation(format!(
            "invalid asset filename {filename:?}"
        )));
    }
    Ok(())
}
