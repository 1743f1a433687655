//! Sweeps: copies share gathered common assets and only add their own.

use serde_json::json;

use emodkit_harness::sweep::Sweep;
use emodkit_harness::{Scope, TaskError};
use emodkit_kernel::filesets::{ClimateChannel, MigrationType};
use lock_tests::fixtures::full_task;

#[test]
fn copy_gathers_nothing_inherited() {
    let dir = tempfile::tempdir().unwrap();
    let mut base = full_task(dir.path());
    let common = base.gather_common_assets().unwrap();
    assert_eq!(common.len(), 4);

    let mut copy = base.copy_simulation();
    assert!(copy.gather_common_assets().unwrap().is_empty());
    assert!(base.is_common_frozen());
    assert!(copy.is_common_frozen());
    assert!(matches!(
        copy.common_mut().unwrap_err(),
        TaskError::CommonScopeFrozen
    ));
}

#[test]
fn copy_only_emits_what_it_adds() {
    let dir = tempfile::tempdir().unwrap();
    let mut base = full_task(dir.path());
    base.gather_common_assets().unwrap();

    let mut copy = base.copy_simulation();
    copy.simulation_mut()
        .migration
        .add_content(MigrationType::Air, "Air_Migration.bin", vec![9, 9], None, 0.1)
        .unwrap();
    copy.pre_creation().unwrap();
    let transient = copy.gather_transient_assets().unwrap();
    let names: Vec<String> = transient.iter().map(|e| e.destination()).collect();
    assert_eq!(
        names,
        ["config.json", "campaign.json", "custom_reports.json", "Air_Migration.bin"]
    );
    assert!(copy.file_sets(Scope::Common).migration.file(MigrationType::Air).is_none());
    assert_eq!(copy.config().get("x_Air_Migration"), Some(&json!(0.1)));
    assert_eq!(copy.config().get("x_Local_Migration"), Some(&json!(2.5)));
}

#[test]
fn sweep_runs_differ_only_in_their_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let plan = Sweep::new(full_task(dir.path()))
        .with_run("seed_1", |t| t.set_parameter("Run_Number", 1))
        .with_run("seed_2", |t| t.set_parameter("Run_Number", 2))
        .build()
        .unwrap();

    assert_eq!(plan.common.len(), 4);
    let [one, two] = &plan.runs[..] else {
        panic!("expected two runs");
    };
    assert_ne!(one.bundle.digest, two.bundle.digest);
    assert_eq!(
        one.bundle.artifact("Assets/demo.json").unwrap().content_hash,
        two.bundle.artifact("Assets/demo.json").unwrap().content_hash
    );
    assert_ne!(
        one.bundle.artifact("config.json").unwrap().content_hash,
        two.bundle.artifact("config.json").unwrap().content_hash
    );

    let out = tempfile::tempdir().unwrap();
    plan.write(out.path()).unwrap();
    assert!(out.path().join("seed_1").join("run_manifest.json").is_file());
    assert!(out.path().join("seed_2").join("config.json").is_file());
}

#[test]
fn sweep_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let digests = || -> Vec<String> {
        Sweep::new(full_task(dir.path()))
            .with_run("a", |t| t.set_parameter("Run_Number", 3))
            .build()
            .unwrap()
            .runs
            .into_iter()
            .map(|r| r.bundle.digest.to_string())
            .collect()
    };
    assert_eq!(digests(), digests());
}

#[test]
fn every_filename_in_a_sweep_run_config_is_bundled() {
    let dir = tempfile::tempdir().unwrap();
    let mut base = full_task(dir.path());
    base.simulation_mut()
        .climate
        .add_content(ClimateChannel::Rainfall, "rain.bin", vec![1, 2, 3, 4], None)
        .unwrap();
    base.simulation_mut()
        .migration
        .add_content(MigrationType::Air, "Air_Migration.bin", vec![5], None, 0.3)
        .unwrap();

    let plan = Sweep::new(base)
        .with_run("a", |t| t.set_parameter("Run_Number", 1))
        .with_run("b", |t| t.set_parameter("Run_Number", 2))
        .build()
        .unwrap();

    for run in &plan.runs {
        let config = run.task.config();
        assert_eq!(
            config.get("Rainfall_Filename"),
            Some(&json!("climate\\rain.bin")),
            "run {}",
            run.name
        );
        let referenced: Vec<String> = config
            .parameters()
            .iter()
            .filter(|(key, _)| key.ends_with("_Filename"))
            .filter_map(|(_, value)| value.as_str())
            .map(|path| path.replace('\\', "/"))
            .collect();
        assert!(referenced.contains(&"Air_Migration.bin".to_string()));
        for path in referenced {
            assert!(
                run.bundle.artifact(&path).is_some()
                    || run.bundle.artifact(&format!("Assets/{path}")).is_some(),
                "run {} references {path} but does not bundle it",
                run.name
            );
        }
    }
}
