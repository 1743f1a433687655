//! Shared fixtures for the lock tests and the `run_fixture` binary.

pub mod fixtures;
