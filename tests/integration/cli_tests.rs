use std::fs;
use std::process::{Command, Output};

fn run_heapscope(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_heapscope"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to run heapscope with args {:?}: {e}", args))
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn combined_output(output: &Output) -> String {
    let mut text = String::new();
    text.push_str(&String::from_utf8_lossy(&output.stdout));
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[test]
fn scenario_a_reports_deferred_reclamation() {
    let output = run_heapscope(&["scenario", "a"]);
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(text.contains("[a] alloc: tracked=1 handles=1"), "output:\n{}", text);
    assert!(text.contains("[a] copy: tracked=1 handles=2"), "output:\n{}", text);
    assert!(text.contains("[a] scope end: tracked=1 handles=0"), "output:\n{}", text);
    assert!(text.contains("[a] collect: reclaimed=1 tracked=0"), "output:\n{}", text);
}

#[test]
fn scenario_all_runs_every_scenario() {
    let output = run_heapscope(&["scenario", "all"]);
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(
        text.contains("[b] collect: reclaimed=1 tracked=1 survivor=\"second\""),
        "output:\n{}",
        text
    );
    assert!(
        text.contains("[c] collect: reclaimed=0 tracked=1 handles=1 value=42"),
        "output:\n{}",
        text
    );
}

#[test]
fn eager_flag_frees_at_scope_end() {
    let output = run_heapscope(&["scenario", "a", "--eager"]);
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(text.contains("[a] scope end: tracked=0 handles=-"), "output:\n{}", text);
    assert!(text.contains("[a] collect: reclaimed=0 tracked=0"), "output:\n{}", text);
}

#[test]
fn stress_reclaims_unaliased_half() {
    let output = run_heapscope(&["stress", "10"]);
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(text.contains("[stress] allocated=10 tracked=10"), "output:\n{}", text);
    assert!(text.contains("[stress] collect: reclaimed=5 tracked=5"), "output:\n{}", text);
    assert!(
        text.contains("[stress] release all: reclaimed=5 tracked=0"),
        "output:\n{}",
        text
    );
}

#[test]
fn telemetry_flag_prints_reports() {
    let output = run_heapscope(&["scenario", "b", "--gc-telemetry"]);
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(text.contains("=== GC Allocation Stats ==="), "output:\n{}", text);
    assert!(text.contains("=== GC Cycles ==="), "output:\n{}", text);
    assert!(text.contains("=== Heap Snapshot ==="), "output:\n{}", text);
}

#[test]
fn leak_detector_reports_balanced_handles() {
    let output = run_heapscope(&["scenario", "all", "--leak-detector"]);
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(
        text.contains("[leak] objects allocated=4 reclaimed=4 live=0"),
        "output:\n{}",
        text
    );
    assert!(text.contains("[leak] handles registered="), "output:\n{}", text);
    assert!(text.contains("live=0\n"), "output:\n{}", text);
}

#[test]
fn config_file_selects_policy() {
    let path = std::env::temp_dir().join(format!("heapscope-cli-{}.json", std::process::id()));
    fs::write(&path, r#"{ "reclaim": "eager" }"#).unwrap();
    let output = run_heapscope(&["scenario", "a", "--config", path.to_str().unwrap()]);
    fs::remove_file(&path).ok();
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(text.contains("[a] scope end: tracked=0"), "output:\n{}", text);
}

#[test]
fn missing_config_file_fails() {
    let output = run_heapscope(&["scenario", "a", "--config", "/nonexistent/heapscope.json"]);
    let text = combined_output(&output);

    assert!(!output.status.success(), "expected failure, output:\n{}", text);
    assert!(text.contains("failed to read config"), "output:\n{}", text);
}

#[test]
fn unknown_scenario_fails() {
    let output = run_heapscope(&["scenario", "z"]);
    let text = combined_output(&output);

    assert!(!output.status.success(), "expected failure, output:\n{}", text);
    assert!(text.contains("unknown scenario `z`"), "output:\n{}", text);
}

#[test]
fn no_arguments_prints_help() {
    let output = run_heapscope(&[]);
    let text = stdout_of(&output);

    assert!(output.status.success(), "expected success, output:\n{}", text);
    assert!(text.contains("heapscope scenario <a|b|c|all>"), "output:\n{}", text);
}
