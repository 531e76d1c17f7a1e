//! End-to-end tests for the portal-session binary.
//!
//! Each test runs the binary against a config file and credentials file in a
//! temporary directory.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn setup() -> TempDir {
    let temp = TempDir::new().unwrap();
    let config = format!(
        "store = \"file\"\ndata_dir = {:?}\nlog_level = \"warn\"\n",
        temp.path().join("data")
    );
    std::fs::write(temp.path().join("config.toml"), config).unwrap();
    temp
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_portal-session"))
        .arg("--config")
        .arg(dir.join("config.toml"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_login_whoami_logout() {
    let temp = setup();

    let output = run(
        temp.path(),
        &["login", "client", "client-token", "--profile", r#"{"name": "Dana", "role": "client"}"#],
    );
    assert!(output.status.success(), "{:?}", output);

    let output = run(temp.path(), &["whoami"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Slot: client"));
    assert!(text.contains("User: Dana"));

    // admin outranks client
    run(temp.path(), &["login", "admin", "admin-token"]);
    let output = run(temp.path(), &["whoami", "--format", "json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["slot"], "admin");
    assert!(json["identity"].is_null());

    let output = run(temp.path(), &["logout"]);
    assert!(output.status.success());

    let output = run(temp.path(), &["whoami", "--format", "json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(json["slot"].is_null());

    let stored = std::fs::read_to_string(temp.path().join("data/credentials.json")).unwrap();
    assert!(!stored.contains("admin-token"));
    assert!(!stored.contains("client-token"));
}

#[test]
fn test_unknown_slot_fails() {
    let temp = setup();

    let output = run(temp.path(), &["login", "superuser", "token"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("superuser"));
}

#[test]
fn test_request_to_unreachable_backend() {
    let temp = setup();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = format!(
        "store = \"memory\"\n[session]\nbase_url = \"http://127.0.0.1:{}/api\"\n",
        port
    );
    std::fs::write(temp.path().join("config.toml"), config).unwrap();

    let output = run(temp.path(), &["request", "get", "/projects", "--page", "/client/projects"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unable to reach the server"));
    assert!(!stderr.contains("Redirected"));
}
