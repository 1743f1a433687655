//! emodkit harness: task lifecycle and run layout on top of the kernel.
//!
//! The harness owns orchestration (scopes, stages, command line, sweeps)
//! and packages a run as a self-contained bundle. Data model and rendering
//! rules live in the kernel; the harness only sequences them.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bundle;
pub mod bundle_dir;
pub mod campaign;
pub mod command;
pub mod config;
pub mod error;
pub mod sweep;
pub mod task;
pub mod telemetry;

pub use error::{Result, TaskError};
pub use task::{DemographicsBuild, FileSets, Scope, SimulationTask, TaskStage};
