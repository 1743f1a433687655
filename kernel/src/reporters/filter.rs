//! Report filters and per-reporter filter capabilities.
//!
//! Every reporter type declares which of the ten filter fields it accepts
//! as a [`FilterCapabilities`] record. [`ReportFilter::resolve`] is the one
//! routine that checks a filter against that record and validates values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KernelError, Result};

const MIN_YEAR: f64 = 1900.0;
const MAX_YEAR: f64 = 2200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    StartDay,
    EndDay,
    NodeIds,
    MinAgeYears,
    MaxAgeYears,
    MustHaveIpKeyValue,
    MustHaveIntervention,
    FilenameSuffix,
    StartYear,
    EndYear,
}

impl FilterField {
    pub const ALL: [FilterField; 10] = [
        Self::StartDay,
        Self::EndDay,
        Self::NodeIds,
        Self::MinAgeYears,
        Self::MaxAgeYears,
        Self::MustHaveIpKeyValue,
        Self::MustHaveIntervention,
        Self::FilenameSuffix,
        Self::StartYear,
        Self::EndYear,
    ];

    /// Parameter name, unprefixed.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::StartDay => "Start_Day",
            Self::EndDay => "End_Day",
            Self::NodeIds => "Node_IDs_Of_Interest",
            Self::MinAgeYears => "Min_Age_Years",
            Self::MaxAgeYears => "Max_Age_Years",
            Self::MustHaveIpKeyValue => "Must_Have_IP_Key_Value",
            Self::MustHaveIntervention => "Must_Have_Intervention",
            Self::FilenameSuffix => "Filename_Suffix",
            Self::StartYear => "Start_Year",
            Self::EndYear => "End_Year",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of filter fields a reporter type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterCapabilities(u16);

impl FilterCapabilities {
    pub const NONE: Self = Self(0);

    pub const DAYS: Self = Self::NONE
        .with(FilterField::StartDay)
        .with(FilterField::EndDay);

    pub const DAYS_AND_NODES: Self = Self::DAYS.with(FilterField::NodeIds);

    /// Day window, nodes, ages, IP and intervention membership.
    pub const INDIVIDUAL: Self = Self::DAYS_AND_NODES
        .with(FilterField::MinAgeYears)
        .with(FilterField::MaxAgeYears)
        .with(FilterField::MustHaveIpKeyValue)
        .with(FilterField::MustHaveIntervention);

    #[must_use]
    pub const fn with(self, field: FilterField) -> Self {
        Self(self.0 | field.bit())
    }

    #[must_use]
    pub const fn allows(self, field: FilterField) -> bool {
        self.0 & field.bit() != 0
    }
}

/// Optional filter values; unset fields are not rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFilter {
    pub start_day: Option<f64>,
    pub end_day: Option<f64>,
    pub node_ids: Option<Vec<u32>>,
    pub min_age_years: Option<f64>,
    pub max_age_years: Option<f64>,
    pub must_have_ip_key_value: Option<String>,
    pub must_have_intervention: Option<String>,
    pub filename_suffix: Option<String>,
    pub start_year: Option<f64>,
    pub end_year: Option<f64>,
}

impl ReportFilter {
    /// Check the filter against `capabilities` and turn it into parameters.
    ///
    /// Keys are unprefixed; inline reporters prefix them when rendering.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] naming `reporter` when a field is not
    /// supported or a value is out of range / malformed.
    pub fn resolve(
        &self,
        capabilities: FilterCapabilities,
        reporter: &str,
    ) -> Result<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        let mut put = |field: FilterField, value: Value| -> Result<()> {
            if !capabilities.allows(field) {
                return Err(KernelError::validation(format!(
                    "{reporter} does not support the {} filter",
                    field.key()
                )));
            }
            out.insert(field.key().to_string(), value);
            Ok(())
        };

        if let Some(day) = self.start_day {
            non_negative("start day", day)?;
            put(FilterField::StartDay, day.into())?;
        }
        if let Some(day) = self.end_day {
            non_negative("end day", day)?;
            if self.start_day.is_some_and(|start| start > day) {
                return Err(KernelError::validation(format!(
                    "end day {day} is before start day"
                )));
            }
            put(FilterField::EndDay, day.into())?;
        }
        if let Some(nodes) = &self.node_ids {
            if nodes.is_empty() || nodes.contains(&0) {
                return Err(KernelError::validation(
                    "node ids of interest must be a non-empty list of positive ids",
                ));
            }
            put(FilterField::NodeIds, Value::from(nodes.clone()))?;
        }
        if let Some(age) = self.min_age_years {
            non_negative("min age", age)?;
            put(FilterField::MinAgeYears, age.into())?;
        }
        if let Some(age) = self.max_age_years {
            non_negative("max age", age)?;
            if self.min_age_years.is_some_and(|min| min > age) {
                return Err(KernelError::validation(format!(
                    "max age {age} is below min age"
                )));
            }
            put(FilterField::MaxAgeYears, age.into())?;
        }
        if let Some(pair) = &self.must_have_ip_key_value {
            validate_key_value(pair)?;
            put(FilterField::MustHaveIpKeyValue, pair.as_str().into())?;
        }
        if let Some(intervention) = &self.must_have_intervention {
            if intervention.trim().is_empty() {
                return Err(KernelError::validation("intervention name is empty"));
            }
            put(FilterField::MustHaveIntervention, intervention.as_str().into())?;
        }
        if let Some(suffix) = &self.filename_suffix {
            if suffix.is_empty() || suffix.contains(['/', '\\']) {
                return Err(KernelError::validation(format!(
                    "invalid filename suffix {suffix:?}"
                )));
            }
            put(FilterField::FilenameSuffix, suffix.as_str().into())?;
        }
        if let Some(year) = self.start_year {
            year_in_range("start year", year)?;
            put(FilterField::StartYear, year.into())?;
        }
        if let Some(year) = self.end_year {
            year_in_range("end year", year)?;
            if self.start_year.is_some_and(|start| start > year) {
                return Err(KernelError::validation(format!(
                    "end year {year} is before start year"
                )));
            }
            put(FilterField::EndYear, year.into())?;
        }
        Ok(out)
    }
}

/// Validate a `key:value` pair (one colon, both sides non-empty).
///
/// # Errors
///
/// [`KernelError::Validation`] for anything else.
pub fn validate_key_value(pair: &str) -> Result<()> {
    match pair.split_once(':') {
        Some((k, v)) if !k.trim().is_empty() && !v.trim().is_empty() && !v.contains(':') => Ok(()),
        _ => Err(KernelError::validation(format!(
            "expected a key:value pair, got {pair:?}"
        ))),
    }
}

fn non_negative(what: &str, v: f64) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(KernelError::validation(format!(
            "{what} must be non-negative, got {v}"
        )))
    }
}

fn year_in_range(what: &str, v: f64) -> Result<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&v) {
        Ok(())
    } else {
        Err(KernelError::validation(format!(
            "{what} must be within [{MIN_YEAR}, {MAX_YEAR}], got {v}"
        )))
    }
}
