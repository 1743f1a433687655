//! Shared helpers for the emodkit benchmark suites.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use emodkit_harness::command::LocalPlatform;
use emodkit_harness::config::TaskConfig;
use emodkit_harness::sweep::Sweep;
use emodkit_harness::SimulationTask;
use emodkit_kernel::filesets::{ClimateChannel, MigrationType};
use emodkit_kernel::reporters::{catalog, ReportFilter};

/// Base task with `nodes` demographics nodes and a migration file of
/// `migration_bytes` bytes, all in the common scope.
///
/// # Panics
///
/// If any input is rejected. Benchmark setup failures are fatal.
#[must_use]
pub fn base_task(dir: &Path, nodes: usize, migration_bytes: usize) -> SimulationTask {
    let exe = dir.join("Eradication");
    std::fs::write(&exe, b"benchmark binary").expect("write executable");

    let mut task = SimulationTask::new(TaskConfig::default())
        .with_platform(Arc::new(LocalPlatform::new().with_windows(false)));
    task.set_executable(&exe).expect("set_executable");

    let node_list: Vec<_> = (1..=nodes)
        .map(|id| json!({"NodeID": id, "NodeAttributes": {"InitialPopulation": 1000}}))
        .collect();
    let common = task.common_mut().expect("common scope open");
    common
        .demographics
        .add_document("demo.json", &json!({"Nodes": node_list}))
        .expect("demographics");
    common
        .migration
        .add_content(
            MigrationType::Local,
            "Local_Migration.bin",
            vec![0x5a; migration_bytes],
            Some(&json!({"Metadata": {"NodeCount": nodes}})),
            1.5,
        )
        .expect("migration");
    common
        .climate
        .add_content(ClimateChannel::AirTemperature, "air.bin", vec![1; 4096], None)
        .expect("climate");
    common
        .reporters
        .add(catalog::human_migration_tracking(&ReportFilter::default()).expect("reporter"))
        .expect("add reporter");
    task
}

/// Sweep of `runs` runs over [`base_task`], each with its own `Run_Number`.
#[must_use]
pub fn sweep(dir: &Path, runs: usize) -> Sweep {
    (0..runs).fold(Sweep::new(base_task(dir, 50, 64 * 1024)), |sweep, i| {
        sweep.with_run(format!("run_{i:04}"), move |t| {
            t.config_mut().insert("Run_Number", i);
            Ok(())
        })
    })
}
