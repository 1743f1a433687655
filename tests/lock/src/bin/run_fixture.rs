//! Builds the full fixture run and prints deterministic `key=value` lines
//! for cross-process comparison.
//!
//! Usage: `run_fixture`
//! Output:
//!   `run_digest`=sha256:...
//!   `config_hash`=sha256:...
//!   `artifact_count`=N
//!   `command_line`=...

use emodkit_harness::telemetry::init_tracing;
use lock_tests::fixtures::full_bundle;

fn main() {
    init_tracing();
    let dir = tempfile::tempdir().expect("create temp dir");
    let bundle = full_bundle(dir.path());
    bundle.verify().expect("bundle verifies");

    let config = bundle
        .artifact("config.json")
        .expect("missing config.json");

    println!("run_digest={}", bundle.digest);
    println!("config_hash={}", config.content_hash);
    println!("artifact_count={}", bundle.artifacts.len());
    println!("command_line={}", bundle.command_line.join(" "));
}
