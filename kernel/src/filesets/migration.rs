//! Migration inputs: one binary rate file per migration type.
//!
//! # Rendered keys
//!
//! For every [`MigrationType`]: `Enable_<Type>_Migration` (1/0), and when a
//! file is present `<Type>_Migration_Filename` and `x_<Type>_Migration`.
//! `Migration_Model`, `Migration_Pattern` and extra parameters only when set.
//!
//! # Merge asymmetry
//!
//! [`MigrationFileSet::merge_with`] honours `left_precedence` for files,
//! multipliers and extra parameters, but always takes model and pattern from
//! `other`. This is long-standing observed behaviour; callers depend on it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{shared_elsewhere, stage_into, StagedBinary};
use crate::asset::{AssetCollection, AssetEntry};
use crate::config::ConfigDocument;
use crate::error::{KernelError, Result};

/// Seeded by [`MigrationFileSet::enable_migration`] into an empty extra bag.
pub const HETEROGENEITY_KEY: &str = "Enable_Migration_Heterogeneity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationType {
    Local,
    Air,
    Family,
    Regional,
    Sea,
}

impl MigrationType {
    pub const ALL: [MigrationType; 5] = [
        Self::Local,
        Self::Air,
        Self::Family,
        Self::Regional,
        Self::Sea,
    ];

    /// Word used inside configuration keys (`Local`, `Air`, ...).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Air => "Air",
            Self::Family => "Family",
            Self::Regional => "Regional",
            Self::Sea => "Sea",
        }
    }

    #[must_use]
    pub fn enable_key(self) -> String {
        format!("Enable_{}_Migration", self.label())
    }

    #[must_use]
    pub fn filename_key(self) -> String {
        format!("{}_Migration_Filename", self.label())
    }

    #[must_use]
    pub fn multiplier_key(self) -> String {
        format!("x_{}_Migration", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationModel {
    #[serde(rename = "NO_MIGRATION")]
    NoMigration,
    #[serde(rename = "FIXED_RATE_MIGRATION")]
    FixedRate,
}

impl MigrationModel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMigration => "NO_MIGRATION",
            Self::FixedRate => "FIXED_RATE_MIGRATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationPattern {
    RandomWalkDiffusion,
    SingleRoundTrips,
    WaypointsHome,
}

impl MigrationPattern {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RandomWalkDiffusion => "RANDOM_WALK_DIFFUSION",
            Self::SingleRoundTrips => "SINGLE_ROUND_TRIPS",
            Self::WaypointsHome => "WAYPOINTS_HOME",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationFileSet {
    assets: AssetCollection,
    files: BTreeMap<MigrationType, StagedBinary>,
    multipliers: BTreeMap<MigrationType, f64>,
    model: Option<MigrationModel>,
    pattern: Option<MigrationPattern>,
    extra: BTreeMap<String, Value>,
}

impl MigrationFileSet {
    #[must_use]
    pub fn new(relative_path: &str) -> Self {
        Self {
            assets: AssetCollection::new(relative_path),
            ..Self::default()
        }
    }

    /// Switch migration on without clobbering anything already chosen.
    pub fn enable_migration(&mut self) {
        self.model.get_or_insert(MigrationModel::FixedRate);
        self.pattern.get_or_insert(MigrationPattern::RandomWalkDiffusion);
        if self.extra.is_empty() {
            self.extra.insert(HETEROGENEITY_KEY.to_string(), Value::from(0));
        }
    }

    /// Attach the rate file for `migration_type` (replacing any previous one).
    ///
    /// A `<path>.json` header next to the file is staged with it.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for a non-`.bin` path, a negative or
    /// non-finite multiplier, or a model explicitly set to `NO_MIGRATION`;
    /// [`KernelError::Io`] if the file cannot be read.
    pub fn add_file(
        &mut self,
        migration_type: MigrationType,
        path: &Path,
        multiplier: f64,
    ) -> Result<()> {
        validate_multiplier(multiplier)?;
        self.require_model_allows_files()?;
        let staged = StagedBinary::from_file(path, self.assets.relative_path())?;
        self.attach(migration_type, staged, multiplier)
    }

    /// Attach an in-memory rate file, with an optional JSON header.
    ///
    /// # Errors
    ///
    /// As [`MigrationFileSet::add_file`].
    pub fn add_content(
        &mut self,
        migration_type: MigrationType,
        filename: &str,
        content: Vec<u8>,
        header: Option<&Value>,
        multiplier: f64,
    ) -> Result<()> {
        validate_multiplier(multiplier)?;
        self.require_model_allows_files()?;
        let staged =
            StagedBinary::from_content(filename, content, header, self.assets.relative_path())?;
        self.attach(migration_type, staged, multiplier)
    }

    fn attach(
        &mut self,
        migration_type: MigrationType,
        staged: StagedBinary,
        multiplier: f64,
    ) -> Result<()> {
        let mut next = self.assets.clone();
        let replacing = if shared_elsewhere(&self.files, migration_type) {
            None
        } else {
            self.files.get(&migration_type)
        };
        stage_into(&mut next, &staged, replacing)?;

        debug!(
            migration_type = migration_type.label(),
            destination = %staged.entry.destination(),
            multiplier,
            "migration file attached"
        );
        self.assets = next;
        self.files.insert(migration_type, staged);
        self.multipliers.insert(migration_type, multiplier);
        self.enable_migration();
        Ok(())
    }

    /// Set the model explicitly.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] when choosing `NO_MIGRATION` while files are attached.
    pub fn set_model(&mut self, model: MigrationModel) -> Result<()> {
        if model == MigrationModel::NoMigration && !self.files.is_empty() {
            return Err(KernelError::validation(
                "NO_MIGRATION cannot be combined with attached migration files",
            ));
        }
        self.model = Some(model);
        Ok(())
    }

    /// Set the pattern and merge `extra_params` (last write per key wins).
    pub fn update_pattern(
        &mut self,
        pattern: MigrationPattern,
        extra_params: impl IntoIterator<Item = (String, Value)>,
    ) {
        self.pattern = Some(pattern);
        self.extra.extend(extra_params);
    }

    /// Merge `other` into `self`.
    ///
    /// With `left_precedence`, keys already present in `self` are kept and
    /// only keys unique to `other` are added; otherwise `other` overwrites.
    /// Files, multipliers and extra parameters are merged independently.
    /// Model and pattern are always copied from `other`.
    ///
    /// # Errors
    ///
    /// [`KernelError::DuplicateAsset`] when a file from `other` collides by
    /// name with a different file of `self`; [`KernelError::Validation`]
    /// when the two sets stage into different folders. On error `self` is
    /// unchanged.
    pub fn merge_with(&mut self, other: &Self, left_precedence: bool) -> Result<()> {
        let mut merged = self.clone();
        for (&migration_type, staged) in &other.files {
            let present = merged.files.contains_key(&migration_type);
            if present && left_precedence {
                continue;
            }
            let replacing = if present && !shared_elsewhere(&merged.files, migration_type) {
                merged.files.get(&migration_type).cloned()
            } else {
                None
            };
            stage_into(&mut merged.assets, staged, replacing.as_ref())?;
            merged.files.insert(migration_type, staged.clone());
        }
        for (&migration_type, &multiplier) in &other.multipliers {
            if !(left_precedence && merged.multipliers.contains_key(&migration_type)) {
                merged.multipliers.insert(migration_type, multiplier);
            }
        }
        for (key, value) in &other.extra {
            if !(left_precedence && merged.extra.contains_key(key)) {
                merged.extra.insert(key.clone(), value.clone());
            }
        }
        merged.model = other.model;
        merged.pattern = other.pattern;
        *self = merged;
        Ok(())
    }

    /// Write migration keys into `config`.
    pub fn render(&self, config: &mut ConfigDocument) {
        if !self.files.is_empty() && self.model != Some(MigrationModel::FixedRate) {
            warn!(
                model = ?self.model,
                "migration files attached but model is not FIXED_RATE_MIGRATION"
            );
        }
        for migration_type in MigrationType::ALL {
            match self.files.get(&migration_type) {
                Some(staged) => {
                    config.insert(&migration_type.enable_key(), 1);
                    config.insert(&migration_type.filename_key(), staged.entry.destination());
                    let multiplier = self.multipliers.get(&migration_type).copied().unwrap_or(1.0);
                    config.insert(&migration_type.multiplier_key(), multiplier);
                }
                None => config.insert(&migration_type.enable_key(), 0),
            }
        }
        if let Some(model) = self.model {
            config.insert("Migration_Model", model.as_str());
        }
        if let Some(pattern) = self.pattern {
            config.insert("Migration_Pattern", pattern.as_str());
        }
        for (key, value) in &self.extra {
            config.insert(key, value.clone());
        }
    }

    /// Unpersisted rate files and headers, marking them persisted.
    pub fn gather(&mut self) -> Vec<Arc<AssetEntry>> {
        self.assets.gather()
    }

    pub fn mark_all_persisted(&mut self) {
        self.assets.mark_all_persisted();
    }

    pub fn mark_all_unpersisted(&mut self) {
        self.assets.mark_all_unpersisted();
    }

    /// Destinations of the files (and headers) that lose to `winner` when
    /// `winner` is merged with left precedence over `self`.
    ///
    /// A file still referenced by a type `winner` does not hold is kept out
    /// of the result.
    #[must_use]
    pub fn shadowed_by(&self, winner: &Self) -> BTreeSet<String> {
        let live: BTreeSet<&str> = self
            .files
            .iter()
            .filter(|(t, _)| !winner.files.contains_key(*t))
            .map(|(_, staged)| staged.entry.filename())
            .collect();
        self.files
            .iter()
            .filter(|(t, staged)| {
                winner.files.contains_key(*t) && !live.contains(staged.entry.filename())
            })
            .flat_map(|(_, staged)| staged.entries())
            .map(|entry| entry.destination())
            .collect()
    }

    #[must_use]
    pub fn file(&self, migration_type: MigrationType) -> Option<&Arc<AssetEntry>> {
        self.files.get(&migration_type).map(|s| &s.entry)
    }

    #[must_use]
    pub fn multiplier(&self, migration_type: MigrationType) -> Option<f64> {
        self.multipliers.get(&migration_type).copied()
    }

    #[must_use]
    pub fn model(&self) -> Option<MigrationModel> {
        self.model
    }

    #[must_use]
    pub fn pattern(&self) -> Option<MigrationPattern> {
        self.pattern
    }

    #[must_use]
    pub fn extra_parameters(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    #[must_use]
    pub fn assets(&self) -> &AssetCollection {
        &self.assets
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Nothing configured at all: no files, model, pattern or extra parameters.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.files.is_empty()
            && self.model.is_none()
            && self.pattern.is_none()
            && self.extra.is_empty()
    }

    fn require_model_allows_files(&self) -> Result<()> {
        if self.model == Some(MigrationModel::NoMigration) {
            return Err(KernelError::validation(
                "migration model is NO_MIGRATION; set FIXED_RATE_MIGRATION before adding files",
            ));
        }
        Ok(())
    }
}

fn validate_multiplier(multiplier: f64) -> Result<()> {
    if multiplier.is_finite() && multiplier >= 0.0 {
        Ok(())
    } else {
        Err(KernelError::validation(format!(
            "migration multiplier must be a finite non-negative number, got {multiplier}"
        )))
    }
}

/// In-memory migration files produced alongside a demographics document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationBuilder {
    files: Vec<BuiltMigrationFile>,
}

#[derive(Debug, Clone, PartialEq)]
struct BuiltMigrationFile {
    migration_type: MigrationType,
    filename: String,
    content: Vec<u8>,
    header: Option<Value>,
    multiplier: f64,
}

impl MigrationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(
        mut self,
        migration_type: MigrationType,
        filename: impl Into<String>,
        content: Vec<u8>,
        header: Option<Value>,
        multiplier: f64,
    ) -> Self {
        self.files.push(BuiltMigrationFile {
            migration_type,
            filename: filename.into(),
            content,
            header,
            multiplier,
        });
        self
    }

    /// Attach every built file to `target`; all or nothing.
    ///
    /// # Errors
    ///
    /// The first error [`MigrationFileSet::add_content`] reports.
    pub fn apply_to(&self, target: &mut MigrationFileSet) -> Result<()> {
        let mut staged = target.clone();
        for f in &self.files {
            staged.add_content(
                f.migration_type,
                &f.filename,
                f.content.clone(),
                f.header.as_ref(),
                f.multiplier,
            )?;
        }
        *target = staged;
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
