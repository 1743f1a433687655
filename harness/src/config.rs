//! Launch layout settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};

/// Folder names and artifact filenames used when laying out a run.
///
/// Every field has a default, so a settings file only lists overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Run-directory folder holding experiment-wide assets.
    pub assets_dir: String,
    pub config_filename: String,
    pub campaign_filename: String,
    pub custom_reports_filename: String,
    /// Name given to documents produced by a demographics builder.
    pub demographics_filename: String,
    /// Relative folder for reporter plugin libraries.
    pub plugin_folder: String,
    /// Relative folder for embedded scripts.
    pub script_folder: String,
    /// Relative folder for climate binaries.
    pub climate_folder: String,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            assets_dir: "Assets".into(),
            config_filename: "config.json".into(),
            campaign_filename: "campaign.json".into(),
            custom_reports_filename: "custom_reports.json".into(),
            demographics_filename: "demographics.json".into(),
            plugin_folder: "reporter_plugins".into(),
            script_folder: "python".into(),
            climate_folder: "climate".into(),
        }
    }
}

impl TaskConfig {
    /// Read settings from a JSON file.
    ///
    /// # Errors
    ///
    /// [`TaskError::Io`] if the file cannot be read, [`TaskError::Kernel`]
    /// wrapping a JSON error for malformed input. Unknown fields are
    /// ignored so newer settings files still load.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| TaskError::io(path, e))?;
        let settings = serde_json::from_slice(&bytes).map_err(emodkit_kernel::KernelError::from)?;
        Ok(settings)
    }
}
