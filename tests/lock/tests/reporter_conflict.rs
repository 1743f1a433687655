//! Reporter conflicts and validation surface through the task unchanged.

use std::sync::Arc;

use serde_json::json;

use emodkit_harness::command::LocalPlatform;
use emodkit_harness::config::TaskConfig;
use emodkit_harness::{SimulationTask, TaskError, TaskStage};
use emodkit_kernel::reporters::{catalog, ReportFilter};
use emodkit_kernel::KernelError;
use lock_tests::fixtures::{base_task, write_input};

fn recorder() -> emodkit_kernel::reporters::ReporterDescriptor {
    catalog::event_recorder(&["Births"], false, &[], &ReportFilter::default()).unwrap()
}

#[test]
fn second_inline_reporter_in_one_scope_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    let reporters = &mut task.common_mut().unwrap().reporters;
    reporters.add(recorder()).unwrap();
    let err = reporters.add(recorder()).unwrap_err();
    assert!(matches!(
        err,
        KernelError::ConfigurationConflict { ref class } if class == "Report_Event_Recorder"
    ));
    assert_eq!(reporters.inline().len(), 1);
}

#[test]
fn inline_reporter_in_both_scopes_fails_pre_creation() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.common_mut().unwrap().reporters.add(recorder()).unwrap();
    task.simulation_mut().reporters.add(recorder()).unwrap();
    let before = task.config().clone();

    let err = task.pre_creation().unwrap_err();
    assert!(matches!(
        err,
        TaskError::Kernel(KernelError::ConfigurationConflict { .. })
    ));
    assert_eq!(task.stage(), TaskStage::Constructed);
    assert_eq!(task.config().parameters(), before.parameters());
    assert!(task.command_line().is_none());
}

#[test]
fn unsupported_filter_field_names_the_reporter() {
    let filter = ReportFilter {
        min_age_years: Some(5.0),
        ..ReportFilter::default()
    };
    let err = catalog::node_event_recorder(&["Births"], &[], &filter).unwrap_err();
    let KernelError::Validation(message) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert!(message.contains("Report_Node_Event_Recorder"), "{message}");
    assert!(message.contains("Min_Age_Years"), "{message}");
}

#[test]
fn inline_keys_unknown_to_schema_leave_config_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.common_mut()
        .unwrap()
        .reporters
        .add(catalog::node_event_recorder(&["Births"], &[], &ReportFilter::default()).unwrap())
        .unwrap();
    let err = task.pre_creation().unwrap_err();
    assert!(matches!(err, TaskError::Kernel(KernelError::Validation(_))));
    assert_eq!(task.config().get("Enable_Local_Migration"), None);
}

#[test]
fn inline_reporter_without_schema_is_a_missing_prerequisite() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = SimulationTask::new(TaskConfig::default())
        .with_platform(Arc::new(LocalPlatform::new().with_windows(false)));
    task.set_executable(&write_input(dir.path(), "Eradication", b"exe"))
        .unwrap();
    task.common_mut().unwrap().reporters.add(recorder()).unwrap();
    let err = task.pre_creation().unwrap_err();
    assert!(matches!(
        err,
        TaskError::Kernel(KernelError::MissingPrerequisite(_))
    ));
}

#[test]
fn registry_reporters_from_both_scopes_are_concatenated() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = base_task(dir.path());
    task.common_mut()
        .unwrap()
        .reporters
        .add(catalog::node_demographics(&[5.0, 15.0, 125.0], None, true).unwrap())
        .unwrap();
    task.simulation_mut()
        .reporters
        .add(catalog::human_migration_tracking(&ReportFilter::default()).unwrap())
        .unwrap();
    task.pre_creation().unwrap();
    let transient = task.gather_transient_assets().unwrap();
    let registry = transient
        .iter()
        .find(|e| e.filename() == "custom_reports.json")
        .unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&registry.read_bytes().unwrap()).unwrap();
    assert_eq!(doc["Reports"][0]["class"], json!("ReportNodeDemographics"));
    assert_eq!(doc["Reports"][0]["Age_Bins"], json!([5.0, 15.0, 125.0]));
    assert_eq!(doc["Reports"][1]["class"], json!("ReportHumanMigrationTracking"));
}
