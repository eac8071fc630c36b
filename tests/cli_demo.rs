//! CLI integration tests for delivery runs.

use std::process::Command;

fn haulage(args: &[&str]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_haulage");
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run haulage binary")
}

fn summary_value<'a>(stdout: &'a str, key: &str) -> &'a str {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
        .unwrap_or_else(|| panic!("{key} line missing"))
}

#[test]
fn run_reports_correct_delivery() {
    let output = haulage(&[
        "run",
        "--trucks",
        "4",
        "--capacity",
        "25",
        "--blocks",
        "100",
        "--travel-max-ms",
        "5",
    ]);

    assert!(
        output.status.success(),
        "run exited with non-zero status: {:?}",
        output.status
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DELIVERY SUMMARY"), "summary missing");
    assert_eq!(summary_value(&stdout, "blocks_delivered"), "100");
    assert_eq!(summary_value(&stdout, "conserved"), "true");
    assert_eq!(summary_value(&stdout, "delivery"), "correct");
}

#[test]
fn undersized_fleet_fails_verification() {
    let output = haulage(&[
        "run",
        "--trucks",
        "2",
        "--capacity",
        "10",
        "--blocks",
        "50",
        "--travel-max-ms",
        "5",
    ]);

    // Verification is the pass/fail signal: conserved, but not delivered.
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(summary_value(&stdout, "conserved"), "true");
    assert_eq!(summary_value(&stdout, "blocks_left_at_source"), "30");
    assert!(summary_value(&stdout, "delivery").starts_with("incorrect"));
}

#[test]
fn bench_prints_one_csv_row() {
    let output = haulage(&[
        "bench",
        "--trucks",
        "3",
        "--capacity",
        "10",
        "--blocks",
        "30",
        "--travel-max-ms",
        "2",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("trucks,capacity,blocks"));
    assert!(lines[1].starts_with("3,10,30,1,"));
    assert!(lines[1].ends_with("true,true"));
}

#[test]
fn invalid_config_exits_with_usage_error() {
    let output = haulage(&["run", "--trucks", "0"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("truck count must be > 0"));
}

#[test]
fn oversized_fleet_is_rejected_before_running() {
    // Three pickups of ten for fifteen blocks leaves the third truck empty.
    let output = haulage(&["run", "--trucks", "3", "--capacity", "10", "--blocks", "15"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("15 blocks leave a truck empty"), "{stderr}");
    assert!(output.stdout.is_empty());
}
