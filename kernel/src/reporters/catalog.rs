//! Known reporter types and their constructors.
//!
//! Each type carries one [`FilterCapabilities`] record; the constructors
//! validate their own parameters and delegate filter checks to
//! [`ReportFilter::resolve`].

use serde_json::Value;

use super::descriptor::{InlineReporter, RegistryReporter, ReporterDescriptor};
use super::filter::{validate_key_value, FilterCapabilities, FilterField, ReportFilter};
use crate::error::{KernelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReporterKind {
    EventRecorder,
    NodeEventRecorder,
    EventCounter,
    NodeDemographics,
    HumanMigrationTracking,
}

impl ReporterKind {
    pub const ALL: [ReporterKind; 5] = [
        Self::EventRecorder,
        Self::NodeEventRecorder,
        Self::EventCounter,
        Self::NodeDemographics,
        Self::HumanMigrationTracking,
    ];

    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::EventRecorder => "Report_Event_Recorder",
            Self::NodeEventRecorder => "Report_Node_Event_Recorder",
            Self::EventCounter => "ReportEventCounter",
            Self::NodeDemographics => "ReportNodeDemographics",
            Self::HumanMigrationTracking => "ReportHumanMigrationTracking",
        }
    }

    #[must_use]
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::EventRecorder | Self::NodeEventRecorder)
    }

    #[must_use]
    pub const fn capabilities(self) -> FilterCapabilities {
        match self {
            Self::EventRecorder => FilterCapabilities::INDIVIDUAL
                .with(FilterField::StartYear)
                .with(FilterField::EndYear),
            Self::NodeEventRecorder => FilterCapabilities::DAYS_AND_NODES,
            Self::EventCounter => FilterCapabilities::INDIVIDUAL.with(FilterField::FilenameSuffix),
            Self::NodeDemographics => FilterCapabilities::NONE,
            Self::HumanMigrationTracking => FilterCapabilities::DAYS,
        }
    }

    fn inline(self) -> Result<InlineReporter> {
        InlineReporter::new(self.class_name(), self.capabilities())
    }

    fn registry(self) -> Result<RegistryReporter> {
        RegistryReporter::new(self.class_name(), self.capabilities())
    }
}

/// Individual-level event log, configured inline.
///
/// With `ignore_listed`, `events` is an exclusion list instead.
///
/// # Errors
///
/// [`KernelError::Validation`] for blank event names, malformed property
/// `key:value` pairs, or filter errors.
pub fn event_recorder(
    events: &[&str],
    ignore_listed: bool,
    individual_properties: &[&str],
    filter: &ReportFilter,
) -> Result<ReporterDescriptor> {
    let kind = ReporterKind::EventRecorder;
    validate_events(kind, events)?;
    for property in individual_properties {
        if property.trim().is_empty() {
            return Err(KernelError::validation(format!(
                "{}: empty individual property name",
                kind.class_name()
            )));
        }
    }
    Ok(kind
        .inline()?
        .with_parameter("Events", strings(events))?
        .with_parameter("Ignore_Events_In_List", u8::from(ignore_listed))?
        .with_parameter("Individual_Properties", strings(individual_properties))?
        .with_filter(filter)?
        .into())
}

/// Node-level event log, configured inline.
///
/// `node_properties` restricts output to nodes carrying these `key:value` pairs.
///
/// # Errors
///
/// As [`event_recorder`].
pub fn node_event_recorder(
    events: &[&str],
    node_properties: &[&str],
    filter: &ReportFilter,
) -> Result<ReporterDescriptor> {
    let kind = ReporterKind::NodeEventRecorder;
    validate_events(kind, events)?;
    for pair in node_properties {
        validate_key_value(pair)?;
    }
    Ok(kind
        .inline()?
        .with_parameter("Events", strings(events))?
        .with_parameter("Ignore_Events_In_List", 0)?
        .with_parameter("Node_Properties_To_Record", strings(node_properties))?
        .with_filter(filter)?
        .into())
}

/// Daily counts of the listed events.
///
/// # Errors
///
/// [`KernelError::Validation`] for an empty or blank event list, or filter errors.
pub fn event_counter(events: &[&str], filter: &ReportFilter) -> Result<ReporterDescriptor> {
    let kind = ReporterKind::EventCounter;
    if events.is_empty() {
        return Err(KernelError::validation(format!(
            "{}: at least one event is required",
            kind.class_name()
        )));
    }
    validate_events(kind, events)?;
    Ok(kind
        .registry()?
        .with_parameter("Event_Trigger_List", strings(events))?
        .with_filter(filter)?
        .into())
}

/// Per-node population broken down by age bin and optionally gender / an IP key.
///
/// # Errors
///
/// [`KernelError::Validation`] if `age_bins` is empty, not strictly
/// ascending, or holds a negative / non-finite bound.
pub fn node_demographics(
    age_bins: &[f64],
    ip_key_to_collect: Option<&str>,
    stratify_by_gender: bool,
) -> Result<ReporterDescriptor> {
    let kind = ReporterKind::NodeDemographics;
    validate_age_bins(age_bins)?;
    let mut reporter = kind
        .registry()?
        .with_parameter("Age_Bins", Value::from(age_bins.to_vec()))?
        .with_parameter("Stratify_By_Gender", u8::from(stratify_by_gender))?;
    if let Some(key) = ip_key_to_collect {
        if key.trim().is_empty() {
            return Err(KernelError::validation(format!(
                "{}: empty IP key",
                kind.class_name()
            )));
        }
        reporter = reporter.with_parameter("IP_Key_To_Collect", key)?;
    }
    Ok(reporter.into())
}

/// Per-trip migration log.
///
/// # Errors
///
/// Filter errors.
pub fn human_migration_tracking(filter: &ReportFilter) -> Result<ReporterDescriptor> {
    Ok(ReporterKind::HumanMigrationTracking
        .registry()?
        .with_filter(filter)?
        .into())
}

/// Strictly ascending, finite, non-negative bin upper bounds.
///
/// # Errors
///
/// [`KernelError::Validation`] otherwise.
pub fn validate_age_bins(bins: &[f64]) -> Result<()> {
    if bins.is_empty() {
        return Err(KernelError::validation("age bins are empty"));
    }
    if let Some(bad) = bins.iter().find(|b| !b.is_finite() || **b < 0.0) {
        return Err(KernelError::validation(format!("invalid age bin {bad}")));
    }
    if let Some(pair) = bins.windows(2).find(|w| w[0] >= w[1]) {
        return Err(KernelError::validation(format!(
            "age bins must be strictly ascending ({} then {})",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

fn validate_events(kind: ReporterKind, events: &[&str]) -> Result<()> {
    if events.iter().any(|e| e.trim().is_empty()) {
        return Err(KernelError::validation(format!(
            "{}: empty event name",
            kind.class_name()
        )));
    }
    Ok(())
}

fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::from(*s)).collect())
}
