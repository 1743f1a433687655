//! Run directories fail closed on any drift from their manifest.

use std::path::Path;

use emodkit_harness::bundle::BundleError;
use emodkit_harness::bundle_dir::{read_run_dir, verify_run_dir, write_run_dir, RunDirError};
use lock_tests::fixtures::full_bundle;

fn written() -> (tempfile::TempDir, tempfile::TempDir) {
    let inputs = tempfile::tempdir().unwrap();
    let bundle = full_bundle(inputs.path());
    let out = tempfile::tempdir().unwrap();
    write_run_dir(&bundle, out.path()).unwrap();
    (inputs, out)
}

fn edit(path: &Path, f: impl FnOnce(&mut Vec<u8>)) {
    let mut bytes = std::fs::read(path).unwrap();
    f(&mut bytes);
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn clean_directory_verifies() {
    let (_inputs, out) = written();
    let bundle = verify_run_dir(out.path()).unwrap();
    assert_eq!(bundle.artifacts.len(), 7);
}

#[test]
fn missing_artifact() {
    let (_inputs, out) = written();
    std::fs::remove_file(out.path().join("Assets/demo.json")).unwrap();
    let err = read_run_dir(out.path()).unwrap_err();
    assert!(
        matches!(err, RunDirError::MissingArtifact { ref path } if path == "Assets/demo.json"),
        "{err}"
    );
}

#[test]
fn extra_file_in_nested_folder() {
    let (_inputs, out) = written();
    std::fs::write(out.path().join("Assets/stray.txt"), b"x").unwrap();
    let err = read_run_dir(out.path()).unwrap_err();
    assert!(
        matches!(err, RunDirError::ExtraFile { ref path } if path == "Assets/stray.txt"),
        "{err}"
    );
}

#[test]
fn missing_digest_file() {
    let (_inputs, out) = written();
    std::fs::remove_file(out.path().join("run_digest.txt")).unwrap();
    assert!(matches!(
        read_run_dir(out.path()).unwrap_err(),
        RunDirError::MissingMetadata { .. }
    ));
}

#[test]
fn tampered_artifact_fails_verify_but_reads() {
    let (_inputs, out) = written();
    edit(&out.path().join("config.json"), |b| b.push(b'\n'));
    read_run_dir(out.path()).unwrap();
    let err = verify_run_dir(out.path()).unwrap_err();
    assert!(
        matches!(
            err,
            RunDirError::Bundle(BundleError::ContentHashMismatch { ref path, .. }) if path == "config.json"
        ),
        "{err}"
    );
}

#[test]
fn tampered_digest() {
    let (_inputs, out) = written();
    std::fs::write(
        out.path().join("run_digest.txt"),
        format!("sha256:{}", "0".repeat(64)),
    )
    .unwrap();
    assert!(matches!(
        read_run_dir(out.path()).unwrap_err(),
        RunDirError::DigestMismatch { .. }
    ));
}

#[test]
fn tampered_manifest_breaks_digest() {
    let (_inputs, out) = written();
    edit(&out.path().join("run_manifest.json"), |b| {
        let text = String::from_utf8(b.clone()).unwrap();
        *b = text.replace("--dll-path", "--dll-pathx").into_bytes();
    });
    assert!(matches!(
        read_run_dir(out.path()).unwrap_err(),
        RunDirError::DigestMismatch { .. }
    ));
}

#[test]
fn non_utf8_digest_file_is_a_mismatch() {
    let (_inputs, out) = written();
    std::fs::write(out.path().join("run_digest.txt"), [0xff, 0xfe]).unwrap();
    assert!(matches!(
        read_run_dir(out.path()).unwrap_err(),
        RunDirError::DigestMismatch { .. }
    ));
}
