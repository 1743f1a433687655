//! Simulation task: layered file sets, staged lifecycle, sweep copies.
//!
//! # Lifecycle
//!
//! ```text
//! CONSTRUCTED → PRE_CREATION → COMMON_ASSETS_GATHERED
//!             → TRANSIENT_ASSETS_GATHERED → FINALIZED
//! ```
//!
//! Stages only move forward. A stage may be skipped (an experiment base
//! gathers common assets without ever running `pre_creation`), but the
//! transient gather needs a rendered configuration, and `finalize` needs the
//! transient gather. Each copy from [`SimulationTask::copy_simulation`]
//! starts again at `CONSTRUCTED`.
//!
//! # Scopes
//!
//! Every task owns two [`FileSets`]: common (experiment-wide, uploaded once)
//! and simulation (per run). The first copy freezes the common scope of the
//! base; from then on [`SimulationTask::common_mut`] fails.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use emodkit_kernel::asset::entry::require_extension;
use emodkit_kernel::asset::{dedupe_by_destination, AssetCollection, AssetEntry};
use emodkit_kernel::config::{ConfigDocument, ParameterSchema};
use emodkit_kernel::filesets::{
    ClimateFileSet, DemographicsFileSet, MigrationBuilder, MigrationFileSet,
};
use emodkit_kernel::reporters::ReporterSet;
use emodkit_kernel::KernelError;

use crate::campaign::{Campaign, CAMPAIGN_FILENAME_KEY, ENABLE_INTERVENTIONS_KEY};
use crate::command::{CommandLine, LaunchSpec, LocalPlatform, Platform};
use crate::config::TaskConfig;
use crate::error::{Result, TaskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskStage {
    Constructed,
    PreCreation,
    CommonAssetsGathered,
    TransientAssetsGathered,
    Finalized,
}

impl TaskStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Constructed => "CONSTRUCTED",
            Self::PreCreation => "PRE_CREATION",
            Self::CommonAssetsGathered => "COMMON_ASSETS_GATHERED",
            Self::TransientAssetsGathered => "TRANSIENT_ASSETS_GATHERED",
            Self::Finalized => "FINALIZED",
        }
    }

    fn permits(self, to: Self) -> bool {
        match (self, to) {
            (Self::Finalized, _) => false,
            (_, Self::TransientAssetsGathered) => self >= Self::PreCreation,
            (_, Self::Finalized) => self == Self::TransientAssetsGathered,
            _ => to >= self,
        }
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Common,
    Simulation,
}

/// One scope's worth of domain inputs.
#[derive(Debug, Clone)]
pub struct FileSets {
    pub migration: MigrationFileSet,
    pub demographics: DemographicsFileSet,
    pub climate: ClimateFileSet,
    pub reporters: ReporterSet,
}

impl FileSets {
    fn new(settings: &TaskConfig) -> Self {
        Self {
            migration: MigrationFileSet::new(""),
            demographics: DemographicsFileSet::new(""),
            climate: ClimateFileSet::new(&settings.climate_folder),
            reporters: ReporterSet::new(&settings.plugin_folder),
        }
    }

    fn gather(&mut self) -> Vec<Arc<AssetEntry>> {
        let mut out = self.demographics.gather();
        out.extend(self.reporters.gather_plugins());
        out.extend(self.migration.gather());
        out.extend(self.climate.gather());
        out
    }

    /// Like [`FileSets::gather`], leaving out migration files `common` overrides.
    fn gather_over(&mut self, common: &MigrationFileSet) -> Vec<Arc<AssetEntry>> {
        let shadowed = self.migration.shadowed_by(common);
        let mut out = self.demographics.gather();
        out.extend(self.reporters.gather_plugins());
        out.extend(
            self.migration
                .gather()
                .into_iter()
                .filter(|entry| !shadowed.contains(&entry.destination())),
        );
        out.extend(self.climate.gather());
        out
    }

    fn mark_all_persisted(&mut self) {
        self.demographics.mark_all_persisted();
        self.reporters.mark_all_persisted();
        self.migration.mark_all_persisted();
        self.climate.mark_all_persisted();
    }

    fn mark_all_unpersisted(&mut self) {
        self.demographics.mark_all_unpersisted();
        self.reporters.mark_all_unpersisted();
        self.migration.mark_all_unpersisted();
        self.climate.mark_all_unpersisted();
    }
}

/// What a demographics builder produced.
#[derive(Debug, Clone)]
pub enum DemographicsBuild {
    Demographics(Value),
    WithMigration(Value, MigrationBuilder),
}

#[derive(Debug, Clone)]
pub struct SimulationTask {
    settings: TaskConfig,
    platform: Arc<dyn Platform>,
    stage: TaskStage,
    config: ConfigDocument,
    campaign: Option<Campaign>,
    common: FileSets,
    simulation: FileSets,
    executable: AssetCollection,
    scripts: AssetCollection,
    embedded_scripts: bool,
    script_search_paths: Vec<String>,
    common_frozen: bool,
    command_line: Option<CommandLine>,
    custom_reports: Option<Arc<AssetEntry>>,
}

impl SimulationTask {
    /// Task with an empty, schema-less configuration on the local platform.
    #[must_use]
    pub fn new(settings: TaskConfig) -> Self {
        Self::with_config(settings, ConfigDocument::new())
    }

    /// Task whose configuration starts from every schema default.
    #[must_use]
    pub fn from_schema(settings: TaskConfig, schema: Arc<ParameterSchema>) -> Self {
        Self::with_config(settings, ConfigDocument::from_schema(schema))
    }

    #[must_use]
    pub fn with_config(settings: TaskConfig, config: ConfigDocument) -> Self {
        Self {
            common: FileSets::new(&settings),
            simulation: FileSets::new(&settings),
            executable: AssetCollection::new(""),
            scripts: AssetCollection::new(&settings.script_folder),
            settings,
            platform: Arc::new(LocalPlatform::new()),
            stage: TaskStage::Constructed,
            config,
            campaign: None,
            embedded_scripts: false,
            script_search_paths: Vec::new(),
            common_frozen: false,
            command_line: None,
            custom_reports: None,
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    // -- launch metadata ---------------------------------------------------

    /// Set (or replace) the simulation binary, an experiment-wide asset.
    ///
    /// # Errors
    ///
    /// [`TaskError::CommonScopeFrozen`] after the first copy; kernel I/O
    /// errors if the file cannot be read.
    pub fn set_executable(&mut self, path: &Path) -> Result<()> {
        self.ensure_common_writable()?;
        let entry = AssetEntry::from_file(path, "")?;
        debug!(executable = entry.filename(), "executable set");
        self.executable.clear();
        self.executable.add(entry, true)?;
        Ok(())
    }

    #[must_use]
    pub fn executable_name(&self) -> Option<&str> {
        self.executable.iter().next().map(|e| e.filename())
    }

    /// Add a `.py` hook script and turn embedded scripting on.
    ///
    /// # Errors
    ///
    /// [`TaskError::CommonScopeFrozen`] after the first copy; kernel
    /// validation for other extensions; duplicate names.
    pub fn add_embedded_script(&mut self, path: &Path) -> Result<()> {
        self.ensure_common_writable()?;
        require_extension(path, "py")?;
        let entry = AssetEntry::from_file(path, self.scripts.relative_path())?;
        debug!(script = %entry.destination(), "embedded script added");
        self.scripts.add(entry, true)?;
        self.embedded_scripts = true;
        Ok(())
    }

    /// Extra entry for `--python-script-path`, after the script folder.
    pub fn add_script_search_path(&mut self, path: impl Into<String>) {
        self.script_search_paths.push(path.into());
    }

    #[must_use]
    pub fn embedded_scripts_enabled(&self) -> bool {
        self.embedded_scripts
    }

    // -- documents ---------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &ConfigDocument {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigDocument {
        &mut self.config
    }

    /// Schema-checked parameter write.
    ///
    /// # Errors
    ///
    /// See [`ConfigDocument::set_parameter`].
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.config.set_parameter(name, value)?;
        Ok(())
    }

    pub fn set_campaign(&mut self, campaign: Campaign) {
        self.campaign = Some(campaign);
    }

    /// Run `build` and keep the campaign it returns.
    ///
    /// # Errors
    ///
    /// Whatever `build` returns; the current campaign is kept in that case.
    pub fn apply_campaign_builder<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce() -> emodkit_kernel::Result<Campaign>,
    {
        let campaign = build()?;
        debug!(name = campaign.name(), events = campaign.events().len(), "campaign built");
        self.campaign = Some(campaign);
        Ok(())
    }

    #[must_use]
    pub fn campaign(&self) -> Option<&Campaign> {
        self.campaign.as_ref()
    }

    // -- scopes ------------------------------------------------------------

    #[must_use]
    pub fn file_sets(&self, scope: Scope) -> &FileSets {
        match scope {
            Scope::Common => &self.common,
            Scope::Simulation => &self.simulation,
        }
    }

    /// # Errors
    ///
    /// [`TaskError::CommonScopeFrozen`] once a copy has been taken.
    pub fn common_mut(&mut self) -> Result<&mut FileSets> {
        self.ensure_common_writable()?;
        Ok(&mut self.common)
    }

    pub fn simulation_mut(&mut self) -> &mut FileSets {
        &mut self.simulation
    }

    /// # Errors
    ///
    /// As [`SimulationTask::common_mut`] for [`Scope::Common`].
    pub fn file_sets_mut(&mut self, scope: Scope) -> Result<&mut FileSets> {
        match scope {
            Scope::Common => self.common_mut(),
            Scope::Simulation => Ok(self.simulation_mut()),
        }
    }

    #[must_use]
    pub fn is_common_frozen(&self) -> bool {
        self.common_frozen
    }

    /// Run a demographics builder and stage its output into `scope`.
    ///
    /// The document is stored as `demographics_filename`; built migration
    /// files go to the same scope. All or nothing.
    ///
    /// # Errors
    ///
    /// Builder errors, [`TaskError::CommonScopeFrozen`], or kernel errors
    /// from adding the outputs.
    pub fn apply_demographics_builder<F>(&mut self, scope: Scope, build: F) -> Result<()>
    where
        F: FnOnce() -> emodkit_kernel::Result<DemographicsBuild>,
    {
        let filename = self.settings.demographics_filename.clone();
        let mut staged = self.file_sets(scope).clone();
        if scope == Scope::Common {
            self.ensure_common_writable()?;
        }
        match build()? {
            DemographicsBuild::Demographics(document) => {
                staged.demographics.add_document(&filename, &document)?;
            }
            DemographicsBuild::WithMigration(document, migration) => {
                staged.demographics.add_document(&filename, &document)?;
                migration.apply_to(&mut staged.migration)?;
            }
        }
        *self.file_sets_mut(scope)? = staged;
        Ok(())
    }

    // -- lifecycle ---------------------------------------------------------

    #[must_use]
    pub fn stage(&self) -> TaskStage {
        self.stage
    }

    #[must_use]
    pub fn settings(&self) -> &TaskConfig {
        &self.settings
    }

    #[must_use]
    pub fn command_line(&self) -> Option<&CommandLine> {
        self.command_line.as_ref()
    }

    /// Render every file set, reporters and the campaign switch into the
    /// configuration, and build the command line.
    ///
    /// Simulation-scope migration, when anything is set there, is merged
    /// under the common scope (common wins on overlapping keys) into a
    /// scratch set used only for rendering.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`]; kernel `MissingPrerequisite` without
    /// an executable or, for inline reporters, a schema; merge and reporter
    /// conflicts. The task is unchanged on error.
    pub fn pre_creation(&mut self) -> Result<()> {
        self.ensure_transition(TaskStage::PreCreation)?;
        let executable = self
            .executable_name()
            .ok_or_else(|| KernelError::missing("executable (call set_executable first)"))?
            .to_string();

        let mut config = self.config.clone();

        let mut migration = self.common.migration.clone();
        if !self.simulation.migration.is_unset() {
            migration.merge_with(&self.simulation.migration, true)?;
        }
        migration.render(&mut config);

        match (self.common.demographics.is_empty(), self.simulation.demographics.is_empty()) {
            (true, true) => {}
            (false, true) => self.common.demographics.render(&mut config, false),
            (true, false) => self.simulation.demographics.render(&mut config, false),
            (false, false) => {
                self.common.demographics.render(&mut config, false);
                self.simulation.demographics.render(&mut config, true);
            }
        }

        self.common.climate.render(&mut config);
        self.simulation.climate.render(&mut config);

        let reporters = self.common.reporters.merged_with(&self.simulation.reporters)?;
        let custom_reports =
            reporters.render(&mut config, &self.settings.custom_reports_filename)?;

        if self.campaign.is_some() {
            config.insert(CAMPAIGN_FILENAME_KEY, self.settings.campaign_filename.as_str());
            config.insert(ENABLE_INTERVENTIONS_KEY, 1);
        }

        let command = CommandLine::build(
            self.platform.as_ref(),
            &LaunchSpec {
                executable: &executable,
                assets_dir: &self.settings.assets_dir,
                config_filename: &self.settings.config_filename,
                script_paths: self
                    .embedded_scripts
                    .then_some((self.scripts.relative_path(), self.script_search_paths.as_slice())),
            },
        );

        info!(
            command = %command,
            registry = custom_reports.is_some(),
            campaign = self.campaign.is_some(),
            "pre-creation complete"
        );
        self.config = config;
        self.custom_reports = custom_reports.map(Arc::new);
        self.command_line = Some(command);
        self.advance(TaskStage::PreCreation);
        Ok(())
    }

    /// Experiment-wide assets not yet gathered: executable, scripts,
    /// demographics, reporter plugins, migration, climate.
    ///
    /// A second call without new entries returns an empty list.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`]; `DuplicateAsset` when two sets map
    /// different bytes to one destination (nothing is marked gathered then).
    pub fn gather_common_assets(&mut self) -> Result<Vec<Arc<AssetEntry>>> {
        self.ensure_transition(TaskStage::CommonAssetsGathered)?;
        let mut executable = self.executable.clone();
        let mut scripts = self.scripts.clone();
        let mut common = self.common.clone();

        let mut gathered = executable.gather();
        gathered.extend(scripts.gather());
        gathered.extend(common.gather());
        let assets = dedupe_by_destination(gathered)?;

        self.executable = executable;
        self.scripts = scripts;
        self.common = common;
        self.advance(TaskStage::CommonAssetsGathered);
        info!(count = assets.len(), "common assets gathered");
        Ok(assets)
    }

    /// Per-run assets: config, campaign, custom reports and whatever the
    /// simulation scope has not yet gathered. Simulation migration files
    /// that lose the merge to the common scope are not uploaded.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] before `pre_creation`; duplicate
    /// destinations among the transient assets.
    pub fn gather_transient_assets(&mut self) -> Result<Vec<Arc<AssetEntry>>> {
        self.ensure_transition(TaskStage::TransientAssetsGathered)?;
        let mut entries = vec![Arc::new(AssetEntry::from_content(
            &self.settings.config_filename,
            self.config.to_json_bytes()?,
            "",
        )?)];
        if let Some(campaign) = &self.campaign {
            entries.push(Arc::new(AssetEntry::from_content(
                &self.settings.campaign_filename,
                campaign.to_json_bytes()?,
                "",
            )?));
        }
        if let Some(registry) = &self.custom_reports {
            entries.push(Arc::clone(registry));
        }
        let mut simulation = self.simulation.clone();
        entries.extend(simulation.gather_over(&self.common.migration));
        let assets = dedupe_by_destination(entries)?;

        self.simulation = simulation;
        self.advance(TaskStage::TransientAssetsGathered);
        info!(count = assets.len(), "transient assets gathered");
        Ok(assets)
    }

    /// Close the task and return its command line.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] unless transient assets were gathered.
    pub fn finalize(&mut self) -> Result<CommandLine> {
        self.ensure_transition(TaskStage::Finalized)?;
        let command = self.command_line.clone().ok_or_else(|| {
            TaskError::from(KernelError::missing("command line (run pre_creation first)"))
        })?;
        self.advance(TaskStage::Finalized);
        Ok(command)
    }

    /// Deep copy for one run of a sweep.
    ///
    /// Inherited common-scope entries, the executable and scripts are marked
    /// persisted, so the copy's common gather only returns what is added
    /// later. The simulation scope belongs to each run: all of it is marked
    /// unpersisted and comes back from the copy's transient gather.
    /// Freezes this task's common scope; the copy's common scope is frozen too.
    pub fn copy_simulation(&mut self) -> SimulationTask {
        if !self.common_frozen {
            info!("common scope frozen by first copy");
            self.common_frozen = true;
        }
        let mut copy = self.clone();
        copy.stage = TaskStage::Constructed;
        copy.command_line = None;
        copy.custom_reports = None;
        copy.executable.mark_all_persisted();
        copy.scripts.mark_all_persisted();
        copy.common.mark_all_persisted();
        copy.simulation.mark_all_unpersisted();
        copy
    }

    fn ensure_common_writable(&self) -> Result<()> {
        if self.common_frozen {
            Err(TaskError::CommonScopeFrozen)
        } else {
            Ok(())
        }
    }

    fn ensure_transition(&self, to: TaskStage) -> Result<()> {
        if self.stage.permits(to) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                from: self.stage,
                to,
            })
        }
    }

    fn advance(&mut self, to: TaskStage) {
        if self.stage != to {
            debug!(from = %self.stage, to = %to, "stage transition");
            self.stage = to;
        }
    }
}
