//! Parameter sweeps: many runs copied from one base task.
//!
//! The base gathers its common assets once. Each run is a
//! [`SimulationTask::copy_simulation`] of the base, adjusted by its
//! modifier, taken through `pre_creation` and the transient gather, and
//! bundled together with the shared common assets.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use emodkit_kernel::asset::AssetEntry;

use crate::bundle::RunBundle;
use crate::bundle_dir::write_run_dir;
use crate::error::Result;
use crate::task::SimulationTask;

type Modifier = Box<dyn Fn(&mut SimulationTask) -> Result<()> + Send + Sync>;

pub struct Sweep {
    base: SimulationTask,
    modifiers: Vec<(String, Modifier)>,
}

impl fmt::Debug for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sweep")
            .field("base", &self.base)
            .field(
                "runs",
                &self.modifiers.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// One materialized run.
#[derive(Debug)]
pub struct SweepRun {
    pub name: String,
    pub task: SimulationTask,
    pub transient: Vec<Arc<AssetEntry>>,
    pub bundle: RunBundle,
}

#[derive(Debug)]
pub struct SweepPlan {
    pub base: SimulationTask,
    /// Experiment-wide upload list, gathered once from the base.
    pub common: Vec<Arc<AssetEntry>>,
    pub runs: Vec<SweepRun>,
}

impl Sweep {
    #[must_use]
    pub fn new(base: SimulationTask) -> Self {
        Self {
            base,
            modifiers: Vec::new(),
        }
    }

    /// Add a run; `modify` sees a fresh copy of the base.
    #[must_use]
    pub fn with_run<F>(mut self, name: impl Into<String>, modify: F) -> Self
    where
        F: Fn(&mut SimulationTask) -> Result<()> + Send + Sync + 'static,
    {
        self.modifiers.push((name.into(), Box::new(modify)));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Gather the base, then copy, modify, render and bundle every run.
    ///
    /// # Errors
    ///
    /// The first error from the base gather, a modifier, or any run's
    /// lifecycle or bundle step.
    pub fn build(mut self) -> Result<SweepPlan> {
        let common = self.base.gather_common_assets()?;
        info!(runs = self.modifiers.len(), common = common.len(), "sweep started");

        let mut runs = Vec::with_capacity(self.modifiers.len());
        for (name, modify) in &self.modifiers {
            let mut task = self.base.copy_simulation();
            modify(&mut task)?;
            task.pre_creation()?;
            let transient = task.gather_transient_assets()?;
            let command = task.finalize()?;
            let bundle = RunBundle::build(
                &common,
                &transient,
                &command,
                &task.settings().assets_dir,
            )?;
            info!(run = %name, digest = %bundle.digest, "sweep run bundled");
            runs.push(SweepRun {
                name: name.clone(),
                task,
                transient,
                bundle,
            });
        }

        Ok(SweepPlan {
            base: self.base,
            common,
            runs,
        })
    }
}

impl SweepPlan {
    /// Write each run into `<root>/<run name>/`.
    ///
    /// # Errors
    ///
    /// Run directory write failures.
    pub fn write(&self, root: &Path) -> Result<()> {
        for run in &self.runs {
            write_run_dir(&run.bundle, &root.join(&run.name))?;
        }
        Ok(())
    }
}
