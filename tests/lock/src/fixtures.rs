//! A small but complete simulation definition built in a temp directory.
//!
//! Every input is written fresh, so bundle digests depend only on the bytes
//! below and never on the temp path, cwd or environment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use emodkit_harness::bundle::RunBundle;
use emodkit_harness::campaign::Campaign;
use emodkit_harness::command::LocalPlatform;
use emodkit_harness::config::TaskConfig;
use emodkit_harness::SimulationTask;
use emodkit_kernel::config::{ParameterSchema, SchemaWalker};
use emodkit_kernel::filesets::MigrationType;
use emodkit_kernel::reporters::{catalog, ReportFilter};

pub const EXECUTABLE_BYTES: &[u8] = b"\x7fELF fixture simulation binary";

/// Schema document in the binary's nested `config` layout.
#[must_use]
pub fn schema_document() -> Value {
    json!({
        "config": {
            "Run_Number": {"default": 0, "min": 0, "type": "integer"},
            "Simulation_Duration": {"default": 365, "type": "float"},
            "Demographics": {
                "Demographics_Filenames": {"default": [], "type": "Vector String"},
                "Enable_Demographics_Builtin": {"default": 1, "type": "bool"}
            },
            "Reports": {
                "Report_Event_Recorder": {"default": 0, "type": "bool"},
                "Report_Event_Recorder_Events": {"default": [], "type": "Vector String"},
                "Report_Event_Recorder_Ignore_Events_In_List": {"default": 0, "type": "bool"},
                "Report_Event_Recorder_Individual_Properties": {"default": [], "type": "Vector String"},
                "Report_Event_Recorder_Start_Day": {"default": 0, "type": "float"},
                "Report_Event_Recorder_End_Day": {"default": 3.40282e38, "type": "float"}
            },
            "idmType:NodeSet": {"default": "ignored"}
        }
    })
}

/// # Panics
///
/// If the fixture schema stops declaring parameters.
#[must_use]
pub fn schema() -> Arc<ParameterSchema> {
    Arc::new(
        ParameterSchema::from_document(&schema_document(), &SchemaWalker)
            .expect("fixture schema declares parameters"),
    )
}

/// Write `bytes` to `dir/name` and return the path.
///
/// # Panics
///
/// On any write failure.
pub fn write_input(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture input");
    path
}

/// Posix-layout task with executable, `demo.json` and a LOCAL migration
/// file at multiplier 2.5, all in the common scope.
///
/// # Panics
///
/// If any fixture input is rejected.
#[must_use]
pub fn base_task(dir: &Path) -> SimulationTask {
    let mut task = SimulationTask::from_schema(TaskConfig::default(), schema())
        .with_platform(Arc::new(LocalPlatform::new().with_windows(false)));
    task.set_executable(&write_input(dir, "Eradication", EXECUTABLE_BYTES))
        .expect("executable");

    let demo = write_input(dir, "demo.json", br#"{"Nodes": [{"NodeID": 1}]}"#);
    let local = write_input(dir, "Local_Migration.bin", &[0, 0, 0, 1, 0, 0, 0, 2]);
    write_input(dir, "Local_Migration.bin.json", br#"{"Metadata": {"NodeCount": 2}}"#);

    let common = task.common_mut().expect("common scope open");
    common
        .demographics
        .add_from_file(&demo, None)
        .expect("demographics");
    common
        .migration
        .add_file(MigrationType::Local, &local, 2.5)
        .expect("migration");
    task
}

/// [`base_task`] plus a campaign, an inline event recorder and two registry
/// reporters of the same type.
///
/// # Panics
///
/// If any fixture input is rejected.
#[must_use]
pub fn full_task(dir: &Path) -> SimulationTask {
    let mut task = base_task(dir);
    task.apply_campaign_builder(|| {
        let mut campaign = Campaign::new("fixture outbreak");
        campaign.add_event(json!({
            "class": "CampaignEvent",
            "Start_Day": 10,
            "Event_Coordinator_Config": {"class": "StandardInterventionDistributionEventCoordinator"}
        }))?;
        Ok(campaign)
    })
    .expect("campaign");

    let filter = ReportFilter {
        start_day: Some(0.0),
        end_day: Some(100.0),
        ..ReportFilter::default()
    };
    let reporters = &mut task.common_mut().expect("common scope open").reporters;
    reporters
        .add(catalog::event_recorder(&["NewInfectionEvent"], false, &[], &filter).expect("recorder"))
        .expect("add recorder");
    for events in [["Births"], ["NonDiseaseDeaths"]] {
        reporters
            .add(catalog::event_counter(&events, &ReportFilter::default()).expect("counter"))
            .expect("add counter");
    }
    task.set_parameter("Run_Number", 7).expect("run number");
    task
}

/// Take [`full_task`] through every stage and bundle it.
///
/// # Panics
///
/// If any stage fails.
#[must_use]
pub fn full_bundle(dir: &Path) -> RunBundle {
    let mut task = full_task(dir);
    task.pre_creation().expect("pre_creation");
    let common = task.gather_common_assets().expect("common gather");
    let transient = task.gather_transient_assets().expect("transient gather");
    let command = task.finalize().expect("finalize");
    RunBundle::build(&common, &transient, &command, &task.settings().assets_dir)
        .expect("bundle")
}
