//! Content hashing with typed domain separation.
//!
//! Algorithm: SHA-256 for everything. Result format: `"sha256:<hex>"`.
//! Every hash computation selects a [`HashDomain`]; the domain bytes are fed
//! into the digest before the data so that an asset hash can never collide
//! with a manifest digest over the same bytes.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{KernelError, Result};

/// A content-addressed hash with algorithm identifier.
///
/// Invariant: the inner string contains a `:` separator with non-empty
/// substrings on both sides (enforced by [`ContentHash::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash {
    full: String,
    colon: usize,
}

impl ContentHash {
    /// Parse from `"algorithm:hex"` format.
    ///
    /// Returns `None` if the colon is missing or either side is empty.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let colon = s.find(':')?;
        if colon == 0 || colon == s.len() - 1 {
            return None;
        }
        Some(Self {
            full: s.to_string(),
            colon,
        })
    }

    fn from_digest(digest: &[u8]) -> Self {
        let full = format!("sha256:{}", hex::encode(digest));
        Self { full, colon: 6 }
    }

    /// The algorithm portion (e.g., "sha256").
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.full[..self.colon]
    }

    /// The hex digest portion.
    #[must_use]
    pub fn hex_digest(&self) -> &str {
        &self.full[self.colon + 1..]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

/// Declares `HashDomain`, `as_bytes()` and `ALL` from one list.
macro_rules! define_hash_domains {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident => $bytes:expr
        ),+ $(,)?
    ) => {
        /// Typed domain separator for [`canonical_hash`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HashDomain {
            $(
                $(#[$meta])*
                $variant,
            )+
        }

        impl HashDomain {
            /// The raw domain-separator bytes (null-terminated).
            #[must_use]
            pub const fn as_bytes(&self) -> &'static [u8] {
                match self {
                    $( Self::$variant => $bytes, )+
                }
            }

            /// All domain variants in declaration order.
            pub const ALL: &[HashDomain] = &[
                $( Self::$variant, )+
            ];
        }
    };
}

define_hash_domains! {
    /// Bytes of one staged asset (file-backed or in-memory).
    AssetContent => b"EMODKIT::ASSET_CONTENT::V1\0",

    /// Run digest over the manifest bytes.
    RunDigest => b"EMODKIT::RUN_DIGEST::V1\0",
}

/// Hash a byte slice under `domain`.
#[must_use]
pub fn canonical_hash(domain: HashDomain, data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(data);
    ContentHash::from_digest(&hasher.finalize())
}

/// Hash the contents of a file under `domain` without loading it whole.
///
/// # Errors
///
/// Returns [`KernelError::Io`] if the file cannot be opened or read.
pub fn hash_file(domain: HashDomain, path: &Path) -> Result<ContentHash> {
    let mut file = std::fs::File::open(path).map_err(|e| KernelError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| KernelError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ContentHash::from_digest(&hasher.finalize()))
}
