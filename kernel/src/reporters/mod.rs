//! Reporter descriptors, filters and the per-task reporter set.

pub mod catalog;
pub mod descriptor;
pub mod filter;
pub mod set;

pub use catalog::ReporterKind;
pub use descriptor::{InlineReporter, RegistryReporter, ReporterDescriptor};
pub use filter::{FilterCapabilities, FilterField, ReportFilter};
pub use set::{ReporterSet, CUSTOM_REPORTS_KEY};
