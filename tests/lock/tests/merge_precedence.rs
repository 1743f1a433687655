//! Scope merge precedence and the model/pattern asymmetry.

use serde_json::json;

use emodkit_kernel::filesets::{MigrationModel, MigrationPattern, MigrationType};
use lock_tests::fixtures::base_task;

#[test]
fn common_files_and_multipliers_win() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.simulation_mut()
        .migration
        .add_content(MigrationType::Local, "sim_local.bin", vec![5], None, 9.0)
        .unwrap();
    task.pre_creation().unwrap();

    let config = task.config();
    assert_eq!(
        config.get("Local_Migration_Filename"),
        Some(&json!("Local_Migration.bin"))
    );
    assert_eq!(config.get("x_Local_Migration"), Some(&json!(2.5)));
}

#[test]
fn losing_simulation_file_is_not_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    let sim = &mut task.simulation_mut().migration;
    sim.add_content(
        MigrationType::Local,
        "sim_local.bin",
        vec![5],
        Some(&json!({"Metadata": {}})),
        9.0,
    )
    .unwrap();
    sim.add_content(MigrationType::Regional, "sim_regional.bin", vec![6], None, 0.5)
        .unwrap();
    task.pre_creation().unwrap();
    task.gather_common_assets().unwrap();

    let transient: Vec<String> = task
        .gather_transient_assets()
        .unwrap()
        .iter()
        .map(|e| e.destination())
        .collect();
    assert_eq!(transient, ["config.json", "sim_regional.bin"]);
    assert_eq!(
        task.config().get("Regional_Migration_Filename"),
        Some(&json!("sim_regional.bin"))
    );
}

#[test]
fn model_and_pattern_come_from_simulation_scope() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.common_mut()
        .unwrap()
        .migration
        .update_pattern(
            MigrationPattern::WaypointsHome,
            [("Roundtrip_Waypoints".to_string(), json!(5))],
        );
    let sim = &mut task.simulation_mut().migration;
    sim.set_model(MigrationModel::FixedRate).unwrap();
    sim.update_pattern(
        MigrationPattern::SingleRoundTrips,
        [("Roundtrip_Waypoints".to_string(), json!(1))],
    );
    task.pre_creation().unwrap();

    let config = task.config();
    // Pattern follows the simulation scope even though common set one.
    assert_eq!(config.get("Migration_Pattern"), Some(&json!("SINGLE_ROUND_TRIPS")));
    // Extra parameters follow left precedence like files do.
    assert_eq!(config.get("Roundtrip_Waypoints"), Some(&json!(5)));
}

#[test]
fn untouched_simulation_scope_keeps_common_settings() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.pre_creation().unwrap();
    let config = task.config();
    assert_eq!(config.get("Migration_Model"), Some(&json!("FIXED_RATE_MIGRATION")));
    assert_eq!(config.get("Migration_Pattern"), Some(&json!("RANDOM_WALK_DIFFUSION")));
    assert_eq!(config.get("Enable_Migration_Heterogeneity"), Some(&json!(0)));
}

#[test]
fn touched_simulation_scope_takes_over_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.simulation_mut()
        .migration
        .update_pattern(
            MigrationPattern::SingleRoundTrips,
            Vec::<(String, serde_json::Value)>::new(),
        );
    task.pre_creation().unwrap();
    let config = task.config();
    // Once the simulation scope holds anything, its (unset) model replaces common's.
    assert!(config.get("Migration_Model").is_none());
    assert_eq!(config.get("Migration_Pattern"), Some(&json!("SINGLE_ROUND_TRIPS")));
    assert_eq!(config.get("Local_Migration_Filename"), Some(&json!("Local_Migration.bin")));
}

#[test]
fn simulation_demographics_extend_common() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.simulation_mut()
        .demographics
        .add_document("overlay.json", &json!({"Defaults": {}}))
        .unwrap();
    task.pre_creation().unwrap();
    assert_eq!(
        task.config().get("Demographics_Filenames"),
        Some(&json!(["demo.json", "overlay.json"]))
    );
}
