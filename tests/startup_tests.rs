//! Tests for main.rs startup validation (JWT_SECRET handling, CLI parsing).

use std::process::{Command, Output, Stdio};

fn cargo_bin() -> std::path::PathBuf {
    // Get the path to the compiled binary
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps
    path.push("rolegate");
    path
}

fn combined_output(output: &Output) -> String {
    // tracing logs to stdout by default
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{}{}", stdout, stderr)
}

#[test]
fn test_missing_jwt_secret_exits_with_error() {
    let output = Command::new(cargo_bin())
        .env_remove("JWT_SECRET")
        .args(["--database", ":memory:"])
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .output()
        .expect("Failed to run binary");

    assert!(
        !output.status.success(),
        "Should exit with error when JWT_SECRET is missing"
    );

    let combined = combined_output(&output);
    assert!(
        combined.contains("JWT_SECRET") && combined.contains("required"),
        "Should mention JWT_SECRET is required, got: {}",
        combined
    );
}

#[test]
fn test_short_jwt_secret_exits_with_error() {
    let output = Command::new(cargo_bin())
        .env("JWT_SECRET", "too-short")
        .args(["--database", ":memory:"])
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("shorter than 32 characters"),
        "Should reject short secret, got: {}",
        combined
    );
}

#[test]
fn test_missing_secret_file_exits_with_error() {
    let output = Command::new(cargo_bin())
        .env_remove("JWT_SECRET")
        .args([
            "--database",
            ":memory:",
            "--jwt-secret-file",
            "/nonexistent/rolegate-secret",
        ])
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined_output(&output).contains("Failed to read JWT secret file"));
}

#[test]
fn test_invalid_ip_header_is_rejected_by_cli() {
    let output = Command::new(cargo_bin())
        .env("JWT_SECRET", "test-secret-that-is-long-enough!!")
        .args(["--ip-header", "bad header"])
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined_output(&output).contains("Invalid header name"));
}
