use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use tracing::info;

/// A `vtrace` command isolated from the user's configuration and environment
fn vtrace(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vtrace").unwrap();
    cmd.env("VTRACE_CONFIG", config_dir.join("vtrace.toml")).env_remove("VTRACE_PYTHON");
    cmd
}

#[test]
fn test_help_command() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    let dir = TempDir::new().unwrap();
    vtrace(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loop-aware execution traces"));
}

#[test]
fn test_version_command() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    vtrace(dir.path()).arg("--version").assert().success().stdout(predicate::str::contains("vtrace"));
}

#[test]
fn test_trace_subcommand_help() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    vtrace(dir.path())
        .arg("trace")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Trace a program against one or more input cases"));
}

#[test]
fn test_missing_subcommand() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    vtrace(dir.path()).assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_loops_from_stdin() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    vtrace(dir.path())
        .arg("loops")
        .write_stdin("for i in range(3):\n    x = i\nprint(x)\n")
        .assert()
        .success()
        .stdout("[1, 2]\n");
}

#[test]
fn test_loops_numbered_json() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("numbered.txt");
    fs::write(&source, "1 n = 3\n2 while n > 0:\n3     n -= 1\n4 print(n)\n").unwrap();

    vtrace(dir.path())
        .arg("loops")
        .arg(&source)
        .arg("--numbered")
        .arg("--json")
        .assert()
        .success()
        .stdout("[[2,3]]\n");
}

#[test]
fn test_validate_from_stdin() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    vtrace(dir.path())
        .arg("validate")
        .write_stdin("[1: {x: 5}]\n[1: ]\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"line":1,"valid":true,"entries":1}"#))
        .stdout(predicate::str::contains(r#""line":2,"valid":false"#));
}

#[test]
fn test_validate_strict_fails_on_rejection() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    vtrace(dir.path()).arg("validate").arg("--strict").write_stdin("[]\n").assert().failure();
}

#[test]
fn test_validate_prunes_records() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    vtrace(dir.path())
        .args(["validate", "--records", "--prune"])
        .write_stdin("x = 5 # @Input = [] @Expected = [] @Trace = [1:  | 2: {x: 5}]\n")
        .assert()
        .success()
        .stdout("x = 5 # @Input = [] @Expected = [] @Trace = [2: {x: 5}]\n");
}

#[test]
fn test_compress_recorded_log() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("subject.py");
    fs::write(&source, "x = 5\ny = x\n").unwrap();

    let log = r#"[
        {"order": 1, "event": "line", "function": "subject", "line": 1, "bindings": {}},
        {"order": 2, "event": "line", "function": "subject", "line": 2, "bindings": {"x": {"json": 5}}}
    ]"#;

    vtrace(dir.path())
        .arg("compress")
        .arg("--source")
        .arg(&source)
        .write_stdin(log)
        .assert()
        .success()
        .stdout("[1: {x: 5}]\n");
}

#[test]
fn test_compress_rejects_bad_log() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("subject.py");
    fs::write(&source, "x = 5\n").unwrap();

    vtrace(dir.path())
        .arg("compress")
        .arg("--source")
        .arg(&source)
        .write_stdin("{not a log")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Trace log is not a JSON array"));
}

#[test]
fn test_trace_with_unknown_interpreter_reports_fault() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("p1_0.py");
    fs::write(&source, "n = int(input())\nprint(n)\n").unwrap();

    vtrace(dir.path())
        .args(["--interpreter", "/nonexistent/vtrace-python", "trace"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""subject":"p1_0""#))
        .stdout(predicate::str::contains(r#""status":"sandbox_fault""#))
        .stdout(predicate::str::contains(r#""trace":"[]""#));
}

#[test]
fn test_trace_with_expected_emits_annotated_record() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("p1_0.py");
    fs::write(&source, "n = int(input())\nprint(n)\n").unwrap();
    let input = dir.path().join("in0.txt");
    fs::write(&input, "3\n").unwrap();
    let expected = dir.path().join("out0.txt");
    fs::write(&expected, "3\n").unwrap();

    vtrace(dir.path())
        .args(["--interpreter", "/nonexistent/vtrace-python", "trace"])
        .arg(&source)
        .arg("--input")
        .arg(&input)
        .arg("--expected")
        .arg(&expected)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#""record":"n = int(input())\nprint(n) # @Input = [3] @Expected = [3] @Trace = []""#,
        ));
}

#[test]
fn test_trace_rejects_unmatched_expected_files() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("p1_0.py");
    fs::write(&source, "x = 1\n").unwrap();
    let expected = dir.path().join("out.txt");
    fs::write(&expected, "1\n").unwrap();

    vtrace(dir.path())
        .args(["--interpreter", "/nonexistent/vtrace-python", "trace"])
        .arg(&source)
        .arg("--expected")
        .arg(&expected)
        .arg("--expected")
        .arg(&expected)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Got 2 expected output files for 1 input cases"));
}

#[test]
fn test_config_init_writes_defaults() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();

    vtrace(dir.path())
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));

    let written = fs::read_to_string(dir.path().join("vtrace.toml")).unwrap();
    assert!(written.contains("step_budget = 3000"));
    assert!(written.contains("timeout_secs = 10"));

    vtrace(dir.path())
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_config_file_feeds_effective_settings() {
    vtrace_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("vtrace.toml"), "[sandbox]\nstep_budget = 42\ntimeout_secs = 0\n")
        .unwrap();

    vtrace(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Step budget: 42"))
        .stdout(predicate::str::contains("Timeout: disabled"));

    vtrace(dir.path())
        .args(["--step-budget", "7", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Step budget: 7"));
}
