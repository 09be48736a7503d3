//! Golden tests for the objfs binary
//!
//! Every case here finishes without reaching a store: usage errors are
//! rejected while parsing, and copying a path onto itself makes no request.

use std::process::{Command, Output};

use tempfile::TempDir;

fn objfs(config_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_objfs"))
        .args(args)
        .args([
            "--access-key",
            "AKIDEXAMPLE",
            "--secret-key",
            "secret",
            "--endpoint",
            "http://127.0.0.1:9",
        ])
        .env("OBJFS_CONFIG_DIR", config_dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute objfs")
}

fn stderr_json(output: &Output) -> serde_json::Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    serde_json::from_str(&stderr).expect("stderr should be valid JSON")
}

#[test]
fn test_wrong_scheme_is_usage_error() {
    let config_dir = TempDir::new().expect("temp dir");
    let output = objfs(&config_dir, &["ls", "gs://host/bucket/dir", "--json"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output);
    let message = error["error"].as_str().expect("error message");
    assert!(message.starts_with("Failed to open filesystem"), "{message}");
}

#[test]
fn test_copy_onto_itself_is_noop() {
    let config_dir = TempDir::new().expect("temp dir");
    let output = objfs(
        &config_dir,
        &["cp", "s3:///bucket/a.txt", "s3:///bucket/a.txt", "--json"],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(
        json,
        serde_json::json!({
            "source": "/bucket/a.txt",
            "target": "/bucket/a.txt",
            "status": "copied"
        })
    );
}

#[test]
fn test_move_onto_itself_is_noop() {
    let config_dir = TempDir::new().expect("temp dir");
    let output = objfs(
        &config_dir,
        &["mv", "s3:///bucket/dir/a.txt", "s3:///bucket/dir/a.txt", "--json"],
    );

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["status"], "moved");
}

#[test]
fn test_missing_subcommand_fails() {
    let config_dir = TempDir::new().expect("temp dir");
    let output = objfs(&config_dir, &[]);
    assert_eq!(output.status.code(), Some(2));
}
