//! Canonical JSON writers and content hashing.
//!
//! Depends on nothing internal except `error`. Everything that hashes or
//! serializes a document for the simulation routes through here.

pub mod canon;
pub mod hash;
