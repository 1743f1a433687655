//! emodkit kernel: the data model behind one simulation launch.
//!
//! # API Surface
//!
//! - [`asset`] -- content-hashed entries and uniqueness-checked collections
//!   with a persisted flag for idempotent gathering
//! - [`config`] -- the parameter document and its schema
//! - [`filesets`] -- migration, demographics and climate inputs, each
//!   rendering its own configuration keys
//! - [`reporters`] -- inline and registry reporters with filter capabilities
//! - [`proof`] -- content hashing and canonical JSON
//!
//! # Module Dependency Direction
//!
//! `proof` ← `asset` ← `config` ← `filesets`, `reporters`
//!
//! One-way only. Orchestration (stages, scopes, command line) lives in the
//! harness crate.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod asset;
pub mod config;
pub mod error;
pub mod filesets;
pub mod proof;
pub mod reporters;

pub use error::{KernelError, Result};
