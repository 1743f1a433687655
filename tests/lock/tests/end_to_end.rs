//! Full lifecycle of the fixture task: render, gather, bundle, persist.

use serde_json::{json, Value};

use emodkit_harness::bundle::ArtifactScope;
use emodkit_harness::bundle_dir::{verify_run_dir, write_run_dir};
use emodkit_harness::TaskStage;
use lock_tests::fixtures::{base_task, full_bundle, full_task};

fn config_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn migration_and_demographics_render_into_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.pre_creation().unwrap();

    let config = task.config();
    assert_eq!(config.get("Enable_Local_Migration"), Some(&json!(1)));
    assert_eq!(config.get("x_Local_Migration"), Some(&json!(2.5)));
    assert_eq!(
        config.get("Local_Migration_Filename"),
        Some(&json!("Local_Migration.bin"))
    );
    assert_eq!(config.get("Enable_Air_Migration"), Some(&json!(0)));
    assert_eq!(config.get("Migration_Model"), Some(&json!("FIXED_RATE_MIGRATION")));
    assert_eq!(config.get("Demographics_Filenames"), Some(&json!(["demo.json"])));
    assert_eq!(config.get("Enable_Demographics_Builtin"), Some(&json!(0)));
}

#[test]
fn full_task_renders_reporters_and_campaign() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = full_task(dir.path());
    task.pre_creation().unwrap();

    let config = task.config();
    assert_eq!(config.get("Run_Number"), Some(&json!(7)));
    assert_eq!(config.get("Report_Event_Recorder"), Some(&json!(1)));
    assert_eq!(
        config.get("Report_Event_Recorder_Events"),
        Some(&json!(["NewInfectionEvent"]))
    );
    assert_eq!(config.get("Report_Event_Recorder_End_Day"), Some(&json!(100.0)));
    assert_eq!(
        config.get("Custom_Reports_Filename"),
        Some(&json!("custom_reports.json"))
    );
    assert_eq!(config.get("Campaign_Filename"), Some(&json!("campaign.json")));
    assert_eq!(config.get("Enable_Interventions"), Some(&json!(1)));
    // Schema defaults stay in place for untouched parameters.
    assert_eq!(config.get("Simulation_Duration"), Some(&json!(365)));
}

#[test]
fn bundle_places_common_under_assets() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = full_bundle(dir.path());
    bundle.verify().unwrap();

    let paths: Vec<&str> = bundle.artifacts.keys().map(String::as_str).collect();
    assert_eq!(
        paths,
        [
            "Assets/Eradication",
            "Assets/Local_Migration.bin",
            "Assets/Local_Migration.bin.json",
            "Assets/demo.json",
            "campaign.json",
            "config.json",
            "custom_reports.json",
        ]
    );
    assert_eq!(
        bundle.artifact("Assets/demo.json").unwrap().scope,
        ArtifactScope::Common
    );

    let reports = config_json(&bundle.artifact("custom_reports.json").unwrap().content);
    let classes: Vec<&str> = reports["Reports"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["class"].as_str().unwrap())
        .collect();
    assert_eq!(classes, ["ReportEventCounter", "ReportEventCounter"]);
    assert_eq!(reports["Use_Defaults"], json!(1));

    let campaign = config_json(&bundle.artifact("campaign.json").unwrap().content);
    assert_eq!(campaign["Campaign_Name"], json!("fixture outbreak"));
    assert_eq!(campaign["Events"].as_array().unwrap().len(), 1);
}

#[test]
fn command_line_points_at_assets() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = full_bundle(dir.path());
    assert_eq!(
        bundle.command_line,
        [
            "Assets/Eradication",
            "--config",
            "config.json",
            "--dll-path",
            "./Assets",
            "--input-path",
            "./Assets;.",
        ]
    );
}

#[test]
fn bundle_digest_is_independent_of_input_location() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    assert_eq!(full_bundle(a.path()).digest, full_bundle(b.path()).digest);
}

#[test]
fn run_dir_roundtrip_matches_bundle() {
    let inputs = tempfile::tempdir().unwrap();
    let bundle = full_bundle(inputs.path());
    let out = tempfile::tempdir().unwrap();

    write_run_dir(&bundle, out.path()).unwrap();
    let loaded = verify_run_dir(out.path()).unwrap();
    assert_eq!(loaded.digest, bundle.digest);
    assert_eq!(loaded.manifest, bundle.manifest);
    assert_eq!(loaded.command_line, bundle.command_line);
    assert!(out.path().join("Assets").join("demo.json").is_file());
}

#[test]
fn stages_advance_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = full_task(dir.path());
    assert_eq!(task.stage(), TaskStage::Constructed);
    task.pre_creation().unwrap();
    assert_eq!(task.stage(), TaskStage::PreCreation);
    task.gather_common_assets().unwrap();
    assert_eq!(task.stage(), TaskStage::CommonAssetsGathered);
    task.gather_transient_assets().unwrap();
    assert_eq!(task.stage(), TaskStage::TransientAssetsGathered);
    task.finalize().unwrap();
    assert_eq!(task.stage(), TaskStage::Finalized);
    assert!(task.pre_creation().is_err());
}
