//! Climate inputs: per-channel binary series, or constant/Koppen modes.
//!
//! The climate model is a single mode. Attaching a channel file switches to
//! `CLIMATE_BY_DATA`; [`ClimateFileSet::set_constant`] switches to
//! `CLIMATE_CONSTANT`. Leaving `CLIMATE_BY_DATA` drops every attached file,
//! so nothing is uploaded that the rendered config does not name.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{shared_elsewhere, stage_into, StagedBinary};
use crate::asset::entry::join_relative;
use crate::asset::{AssetCollection, AssetEntry};
use crate::config::ConfigDocument;
use crate::error::{KernelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClimateChannel {
    AirTemperature,
    LandTemperature,
    RelativeHumidity,
    Rainfall,
}

impl ClimateChannel {
    pub const ALL: [ClimateChannel; 4] = [
        Self::AirTemperature,
        Self::LandTemperature,
        Self::RelativeHumidity,
        Self::Rainfall,
    ];

    #[must_use]
    pub const fn filename_key(self) -> &'static str {
        match self {
            Self::AirTemperature => "Air_Temperature_Filename",
            Self::LandTemperature => "Land_Temperature_Filename",
            Self::RelativeHumidity => "Relative_Humidity_Filename",
            Self::Rainfall => "Rainfall_Filename",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimateModel {
    #[serde(rename = "CLIMATE_OFF")]
    Off,
    #[serde(rename = "CLIMATE_CONSTANT")]
    Constant,
    #[serde(rename = "CLIMATE_KOPPEN")]
    Koppen,
    #[serde(rename = "CLIMATE_BY_DATA")]
    ByData,
}

impl ClimateModel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "CLIMATE_OFF",
            Self::Constant => "CLIMATE_CONSTANT",
            Self::Koppen => "CLIMATE_KOPPEN",
            Self::ByData => "CLIMATE_BY_DATA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateResolution {
    #[serde(rename = "CLIMATE_UPDATE_YEAR")]
    Year,
    #[serde(rename = "CLIMATE_UPDATE_MONTH")]
    Month,
    #[serde(rename = "CLIMATE_UPDATE_WEEK")]
    Week,
    #[serde(rename = "CLIMATE_UPDATE_DAY")]
    Day,
    #[serde(rename = "CLIMATE_UPDATE_HOUR")]
    Hour,
}

impl UpdateResolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Year => "CLIMATE_UPDATE_YEAR",
            Self::Month => "CLIMATE_UPDATE_MONTH",
            Self::Week => "CLIMATE_UPDATE_WEEK",
            Self::Day => "CLIMATE_UPDATE_DAY",
            Self::Hour => "CLIMATE_UPDATE_HOUR",
        }
    }
}

/// Noise applied on top of the climate series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateStochasticity {
    pub air_temperature_variance: f64,
    pub land_temperature_variance: f64,
    pub relative_humidity_variance: f64,
    pub enable_rainfall_stochasticity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stochasticity {
    Disabled,
    Enabled(ClimateStochasticity),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ConstantClimate {
    base_air_temperature: f64,
    base_land_temperature: f64,
    base_rainfall: f64,
    base_relative_humidity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ClimateFileSet {
    assets: AssetCollection,
    files: BTreeMap<ClimateChannel, StagedBinary>,
    model: Option<ClimateModel>,
    constant: Option<ConstantClimate>,
    stochasticity: Option<Stochasticity>,
    resolution: Option<UpdateResolution>,
}

impl ClimateFileSet {
    #[must_use]
    pub fn new(relative_path: &str) -> Self {
        Self {
            assets: AssetCollection::new(relative_path),
            ..Self::default()
        }
    }

    /// Attach the series for `channel` (replacing any previous one) and
    /// switch to `CLIMATE_BY_DATA`.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for a non-`.bin` path, [`KernelError::Io`]
    /// if it cannot be read, [`KernelError::DuplicateAsset`] on a name clash.
    pub fn add_file(&mut self, channel: ClimateChannel, path: &Path) -> Result<()> {
        let staged = StagedBinary::from_file(path, self.assets.relative_path())?;
        self.attach(channel, staged)
    }

    /// In-memory variant of [`ClimateFileSet::add_file`].
    ///
    /// # Errors
    ///
    /// As [`ClimateFileSet::add_file`].
    pub fn add_content(
        &mut self,
        channel: ClimateChannel,
        filename: &str,
        content: Vec<u8>,
        header: Option<&serde_json::Value>,
    ) -> Result<()> {
        let staged =
            StagedBinary::from_content(filename, content, header, self.assets.relative_path())?;
        self.attach(channel, staged)
    }

    fn attach(&mut self, channel: ClimateChannel, staged: StagedBinary) -> Result<()> {
        let mut next = self.assets.clone();
        let replacing = if shared_elsewhere(&self.files, channel) {
            None
        } else {
            self.files.get(&channel)
        };
        stage_into(&mut next, &staged, replacing)?;
        debug!(?channel, destination = %staged.entry.destination(), "climate file attached");
        self.assets = next;
        self.files.insert(channel, staged);
        if self.model != Some(ClimateModel::ByData) {
            self.model = Some(ClimateModel::ByData);
            self.constant = None;
        }
        Ok(())
    }

    /// Switch to `CLIMATE_CONSTANT`.
    ///
    /// `base_land_temp` defaults to `base_air_temp`; the usual humidity is 0.1.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for non-finite temperatures, negative
    /// rainfall, or humidity outside `[0, 1]`.
    pub fn set_constant(
        &mut self,
        base_air_temp: f64,
        base_rainfall: f64,
        base_land_temp: Option<f64>,
        base_humidity: f64,
    ) -> Result<()> {
        let base_land_temp = base_land_temp.unwrap_or(base_air_temp);
        if !base_air_temp.is_finite() || !base_land_temp.is_finite() {
            return Err(KernelError::validation("base temperatures must be finite"));
        }
        if !(base_rainfall.is_finite() && base_rainfall >= 0.0) {
            return Err(KernelError::validation(format!(
                "base rainfall must be non-negative, got {base_rainfall}"
            )));
        }
        if !(0.0..=1.0).contains(&base_humidity) {
            return Err(KernelError::validation(format!(
                "base relative humidity must be within [0, 1], got {base_humidity}"
            )));
        }
        self.drop_files();
        self.model = Some(ClimateModel::Constant);
        self.constant = Some(ConstantClimate {
            base_air_temperature: base_air_temp,
            base_land_temperature: base_land_temp,
            base_rainfall,
            base_relative_humidity: base_humidity,
        });
        Ok(())
    }

    /// Select `CLIMATE_OFF` or `CLIMATE_KOPPEN`.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for `CONSTANT` (use `set_constant`) or
    /// `BY_DATA` without any attached channel.
    pub fn set_model(&mut self, model: ClimateModel) -> Result<()> {
        match model {
            ClimateModel::Constant if self.constant.is_none() => {
                return Err(KernelError::validation(
                    "CLIMATE_CONSTANT needs base values; use set_constant",
                ));
            }
            ClimateModel::ByData if self.files.is_empty() => {
                return Err(KernelError::validation(
                    "CLIMATE_BY_DATA needs at least one climate file",
                ));
            }
            _ => {}
        }
        if model != ClimateModel::ByData {
            self.drop_files();
        }
        self.model = Some(model);
        Ok(())
    }

    fn drop_files(&mut self) {
        if !self.files.is_empty() {
            debug!(count = self.files.len(), "climate files dropped with CLIMATE_BY_DATA");
            self.files.clear();
            self.assets.clear();
        }
    }

    /// Enable climate noise.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for negative or non-finite variances.
    pub fn set_stochasticity(&mut self, params: ClimateStochasticity) -> Result<()> {
        for (name, v) in [
            ("air temperature", params.air_temperature_variance),
            ("land temperature", params.land_temperature_variance),
            ("relative humidity", params.relative_humidity_variance),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(KernelError::validation(format!(
                    "{name} variance must be non-negative, got {v}"
                )));
            }
        }
        self.stochasticity = Some(Stochasticity::Enabled(params));
        Ok(())
    }

    pub fn disable_stochasticity(&mut self) {
        self.stochasticity = Some(Stochasticity::Disabled);
    }

    pub fn set_update_resolution(&mut self, resolution: UpdateResolution) {
        self.resolution = Some(resolution);
    }

    /// Write the keys of the active mode into `config`.
    ///
    /// Channel filenames use the backslash-joined relative path the
    /// simulation binary expects.
    pub fn render(&self, config: &mut ConfigDocument) {
        let Some(model) = self.model else {
            return;
        };
        config.insert("Climate_Model", model.as_str());
        match model {
            ClimateModel::Off => return,
            ClimateModel::ByData => {
                for (channel, staged) in &self.files {
                    let name = join_relative(
                        staged.entry.relative_path(),
                        staged.entry.filename(),
                        '\\',
                    );
                    config.insert(channel.filename_key(), name);
                }
            }
            ClimateModel::Constant => {
                if let Some(c) = self.constant {
                    config.insert("Base_Air_Temperature", c.base_air_temperature);
                    config.insert("Base_Land_Temperature", c.base_land_temperature);
                    config.insert("Base_Rainfall", c.base_rainfall);
                    config.insert("Base_Relative_Humidity", c.base_relative_humidity);
                }
            }
            ClimateModel::Koppen => {}
        }
        match self.stochasticity {
            Some(Stochasticity::Enabled(s)) => {
                config.insert("Enable_Climate_Stochasticity", 1);
                config.insert("Air_Temperature_Variance", s.air_temperature_variance);
                config.insert("Land_Temperature_Variance", s.land_temperature_variance);
                config.insert("Relative_Humidity_Variance", s.relative_humidity_variance);
                config.insert(
                    "Enable_Rainfall_Stochasticity",
                    i32::from(s.enable_rainfall_stochasticity),
                );
            }
            Some(Stochasticity::Disabled) => config.insert("Enable_Climate_Stochasticity", 0),
            None => {}
        }
        if let Some(resolution) = self.resolution {
            config.insert("Climate_Update_Resolution", resolution.as_str());
        }
    }

    pub fn gather(&mut self) -> Vec<Arc<AssetEntry>> {
        self.assets.gather()
    }

    pub fn mark_all_persisted(&mut self) {
        self.assets.mark_all_persisted();
    }

    pub fn mark_all_unpersisted(&mut self) {
        self.assets.mark_all_unpersisted();
    }

    #[must_use]
    pub fn model(&self) -> Option<ClimateModel> {
        self.model
    }

    #[must_use]
    pub fn file(&self, channel: ClimateChannel) -> Option<&Arc<AssetEntry>> {
        self.files.get(&channel).map(|s| &s.entry)
    }

    #[must_use]
    pub fn assets(&self) -> &AssetCollection {
        &self.assets
    }
}
