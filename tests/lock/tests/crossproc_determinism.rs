//! Cross-process determinism: the `run_fixture` binary prints identical
//! digests regardless of cwd, locale or unrelated environment variables.

use std::path::Path;
use std::process::Command;

fn binary_path() -> String {
    let mut path = std::env::current_exe()
        .expect("can resolve test binary path")
        .parent()
        .expect("binary dir exists")
        .parent()
        .expect("deps parent exists")
        .to_path_buf();
    path.push("run_fixture");
    path.to_string_lossy().to_string()
}

fn workspace_root() -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("tests/ exists")
        .parent()
        .expect("workspace root exists")
        .to_string_lossy()
        .to_string()
}

fn run_variant(work_dir: &str, env_overrides: &[(&str, &str)]) -> String {
    let bin = binary_path();

    let mut command = Command::new(&bin);
    command
        .current_dir(work_dir)
        .env_remove("LC_ALL")
        .env_remove("LC_COLLATE")
        .env_remove("LANG")
        .env_remove("LANGUAGE")
        .env_remove("RUST_LOG");

    for &(key, val) in env_overrides {
        command.env(key, val);
    }

    let output = command.output().unwrap_or_else(|e| {
        panic!("failed to spawn {bin} (work_dir={work_dir}, overrides={env_overrides:?}): {e}")
    });

    assert!(
        output.status.success(),
        "run_fixture exited with {}: stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8(output.stdout).expect("stdout is valid UTF-8")
}

#[test]
fn crossproc_determinism_four_env_variants() {
    let root = workspace_root();
    let baseline = run_variant(&root, &[]);

    assert!(baseline.contains("run_digest=sha256:"), "{baseline}");
    assert!(baseline.contains("config_hash=sha256:"), "{baseline}");
    assert!(baseline.contains("artifact_count=7"), "{baseline}");

    let alt_cwd = if cfg!(target_os = "windows") {
        "C:\\"
    } else {
        "/tmp"
    };
    assert_eq!(
        baseline,
        run_variant(alt_cwd, &[]),
        "output differs when cwd changes from {root} to {alt_cwd}"
    );

    assert_eq!(
        baseline,
        run_variant(&root, &[("LC_ALL", "C"), ("LANG", "C")]),
        "output differs when LC_ALL=C LANG=C"
    );

    // Logging goes to stderr and must not leak into the digest lines.
    assert_eq!(
        baseline,
        run_variant(
            &root,
            &[
                ("RUST_LOG", "trace"),
                ("TZ", "America/New_York"),
                ("TMPDIR", "/tmp"),
            ],
        ),
        "output differs with spurious env vars"
    );
}
