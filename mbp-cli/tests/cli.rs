//! End-to-end tests for the mbp binary
//!
//! Each test runs the compiled binary with XDG directories pointed at a
//! temporary directory and the API hosts pointed at a closed local port, so
//! nothing touches the real user session or the network.

use std::path::Path;
use std::process::{Command, Output};

use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use tempfile::TempDir;

const CLOSED_PORT_API: &str = "http://127.0.0.1:9/api";
const CLOSED_PORT_ROOT: &str = "http://127.0.0.1:9";

fn mbp(home: &Path, args: &[&str]) -> Output {
    mbp_command(home, args)
        .output()
        .expect("failed to run mbp")
}

fn mbp_command(home: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_mbp"));
    command
        .args(args)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("MBP_PROJECT_CONFIG_DIR", home.join("project"))
        .env("MBP_API_BASE_URL", CLOSED_PORT_API)
        .env("MBP_API_ROOT_HOST_URL", CLOSED_PORT_ROOT)
        .env("RUST_LOG", "warn");
    command
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn token_for(id: i64) -> String {
    encode(
        &Header::default(),
        &json!({ "id": id, "email": "clerk@example.com" }),
        &EncodingKey::from_secret(b"server-side-secret"),
    )
    .unwrap()
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    let output = mbp(home.path(), &["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["login", "logout", "status", "listen", "config"] {
        assert!(text.contains(command), "missing {command} in help");
    }
}

#[test]
fn config_show_reflects_env_overrides() {
    let home = TempDir::new().unwrap();
    let output = mbp(home.path(), &["config", "show"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(CLOSED_PORT_API));
    assert!(text.contains("app_prefix = \"mbp\""));
}

#[test]
fn config_path_points_at_isolated_dirs() {
    let home = TempDir::new().unwrap();
    let output = mbp(home.path(), &["config", "path"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(&home.path().join("project").display().to_string()));
    assert!(text.contains("mbp_token"));
}

#[test]
fn status_without_login() {
    let home = TempDir::new().unwrap();
    let output = mbp(home.path(), &["status"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Not logged in"));
}

#[test]
fn login_status_logout_cycle() {
    let home = TempDir::new().unwrap();
    let token = token_for(42);
    let token_file = home.path().join("data").join("mbp").join("mbp_token");

    let login = mbp(home.path(), &["login", "--token", &token]);
    assert!(login.status.success(), "login failed: {:?}", login);
    assert!(stdout(&login).contains("Logged in as user 42"));
    assert_eq!(std::fs::read_to_string(&token_file).unwrap().trim(), token);

    let status = mbp(home.path(), &["status"]);
    assert!(status.status.success());
    let text = stdout(&status);
    assert!(text.contains("User id: 42"));
    assert!(text.contains("clerk@example.com"));

    // Server logout fails against the closed port; local logout still happens.
    let logout = mbp(home.path(), &["logout"]);
    assert!(logout.status.success(), "logout failed: {:?}", logout);
    assert!(stdout(&logout).contains("Logged out user 42"));
    assert!(!token_file.exists());

    let status = mbp(home.path(), &["status"]);
    assert!(stdout(&status).contains("Not logged in"));
}

#[test]
fn login_does_not_open_hub_connection() {
    let home = TempDir::new().unwrap();
    let token = token_for(7);
    let output = mbp_command(home.path(), &["login", "--token", &token])
        .env("RUST_LOG", "mbp_core=debug")
        .output()
        .expect("failed to run mbp");

    assert!(output.status.success(), "login failed: {:?}", output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("notification channel"),
        "unexpected channel activity: {stderr}"
    );
}

#[test]
fn login_rejects_malformed_token() {
    let home = TempDir::new().unwrap();
    let output = mbp(home.path(), &["login", "--token", "definitely-not-a-jwt"]);

    assert!(!output.status.success());
    assert!(!home.path().join("data").join("mbp").join("mbp_token").exists());
}

#[test]
fn listen_requires_login() {
    let home = TempDir::new().unwrap();
    let output = mbp(home.path(), &["listen"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not logged in"));
}
