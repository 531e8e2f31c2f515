#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

fn addoncomm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_addoncomm"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("addoncomm should run")
}

fn json_stdout(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn unique_temp_file(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "addoncomm-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

#[test]
fn version_prints_package_version() {
    let output = addoncomm(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("addoncomm "));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_json_lists_features() {
    let output = addoncomm(&["--format", "json", "version", "--extended"]);
    assert!(output.status.success());
    let value = json_stdout(&output);
    assert_eq!(value["name"], "addoncomm");
    let features = value["features"].as_array().expect("features should be a list");
    assert!(features.iter().any(|f| f == "cli"));
}

#[test]
fn split_600_bytes_into_three_frames() {
    let data = "x".repeat(600);
    let output = addoncomm(&["--format", "json", "split", "--data", &data]);
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["frame_count"], 3);
    let frames = value["frames"].as_array().expect("frames should be a list");
    let kinds: Vec<&str> = frames
        .iter()
        .map(|f| f["kind"].as_str().expect("kind should be a string"))
        .collect();
    assert_eq!(kinds, vec!["FIRST", "MIDDLE", "LAST"]);
    assert!(frames.iter().all(|f| f["message_id"] == "0001"));
    assert!(frames.iter().all(|f| f["size"].as_u64().unwrap_or(0) <= 255));
}

#[test]
fn split_rejects_tiny_frame_size() {
    let output = addoncomm(&["split", "--data", "hello", "--max-frame-size", "3"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn split_output_parses_back() {
    let output = addoncomm(&["--format", "json", "split", "--data", "hello"]);
    let value = json_stdout(&output);
    let hex = value["frames"][0]["hex"]
        .as_str()
        .expect("hex should be a string")
        .to_string();
    assert_eq!(hex, "0468656c6c6f");

    let output = addoncomm(&["--format", "json", "parse", &hex]);
    assert!(output.status.success());
    let value = json_stdout(&output);
    assert_eq!(value["kind"], "SINGLE");
    assert_eq!(value["chunk"], "hello");
}

#[test]
fn parse_multipart_frame() {
    let output = addoncomm(&["--format", "json", "parse", "01 30 30 61 42 68 69"]);
    assert!(output.status.success());
    let value = json_stdout(&output);
    assert_eq!(value["kind"], "FIRST");
    assert_eq!(value["message_id"], "00AB");
    assert_eq!(value["chunk"], "hi");
}

#[test]
fn parse_malformed_frame_returns_60() {
    let output = addoncomm(&["parse", "09"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown control byte"));

    let output = addoncomm(&["parse", "0g"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn simulate_delivers_every_message() {
    let output = addoncomm(&["--format", "json", "simulate", "--messages", "4", "--size", "600"]);
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["drained"], true);
    assert_eq!(value["messages_delivered"], 4);
    assert_eq!(value["messages_corrupt"], 0);
    assert_eq!(value["frames_transmitted"], 12);
    assert_eq!(value["receiver"]["messages_delivered"], 4);
}

#[test]
fn simulate_throttles_over_several_ticks() {
    let output = addoncomm(&[
        "--format",
        "json",
        "simulate",
        "--messages",
        "10",
        "--size",
        "2000",
        "--rate",
        "1000",
        "--burst",
        "1000",
    ]);
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["messages_delivered"], 10);
    let schedule = value["schedule"].as_array().expect("schedule should be a list");
    assert!(schedule.len() > 1);
    assert!(schedule
        .iter()
        .all(|row| row["frames"].as_u64().unwrap_or(0) >= 1));
}

#[test]
fn simulate_lossy_channel_never_delivers_corrupt_payloads() {
    let output = addoncomm(&[
        "--format",
        "json",
        "simulate",
        "--messages",
        "5",
        "--size",
        "600",
        "--drop-every",
        "3",
    ]);
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["frames_dropped"], 5);
    assert_eq!(value["messages_corrupt"], 0);
    assert_eq!(value["messages_delivered"], 0);
}

#[test]
fn simulate_whisper_without_target_is_usage_error() {
    let output = addoncomm(&["simulate", "--distribution", "whisper"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("requires a target"));
}

#[test]
fn simulate_reports_timeout_when_ticks_run_out() {
    let output = addoncomm(&[
        "--format",
        "json",
        "simulate",
        "--messages",
        "20",
        "--size",
        "2000",
        "--max-ticks",
        "1",
    ]);
    assert_eq!(output.status.code(), Some(124));
    let value = json_stdout(&output);
    assert_eq!(value["drained"], false);
}

#[test]
fn simulate_reads_config_file() {
    let path = unique_temp_file("config");
    std::fs::write(&path, r#"{ "max_frame_size": 64, "rate": 500 }"#)
        .expect("config should be writable");

    let output = addoncomm(&[
        "--format",
        "json",
        "simulate",
        "--messages",
        "1",
        "--size",
        "100",
        "--config",
        path.to_str().expect("temp path should be utf-8"),
    ]);
    let _ = std::fs::remove_file(&path);
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["config"]["max_frame_size"], 64);
    assert_eq!(value["frames_transmitted"], 2);
}

#[test]
fn simulate_rejects_invalid_config_file() {
    let path = unique_temp_file("bad-config");
    std::fs::write(&path, r#"{ "rate": -1 }"#).expect("config should be writable");

    let output = addoncomm(&[
        "simulate",
        "--config",
        path.to_str().expect("temp path should be utf-8"),
    ]);
    let _ = std::fs::remove_file(&path);
    assert_eq!(output.status.code(), Some(64));
}
