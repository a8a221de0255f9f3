//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("blog2pod");
    for key in ["AZURE_ENDPOINT", "AZUREOPENAI_API_KEY", "TTS_DEPLOYMENT", "CHAT_DEPLOYMENT", "CHROMIUM_PATH"] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_cli_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--completed-dir"))
        .stdout(predicate::str::contains("--print-text"));
}

#[test]
fn test_cli_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_missing_url() {
    cmd().assert().failure().stderr(predicate::str::contains("URL"));
}

#[test]
fn test_cli_rejects_non_http_url() {
    let temp = TempDir::new().unwrap();
    let completed = temp.path().join("completed");

    cmd()
        .current_dir(temp.path())
        .args(["ftp://x", "--completed-dir"])
        .arg(&completed)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid URL format. Please provide a valid URL."));

    assert!(!completed.exists());
}

#[test]
fn test_cli_accepts_hyphenated_flags() {
    let temp = TempDir::new().unwrap();

    cmd()
        .current_dir(temp.path())
        .args(["ftp://x", "--no-render", "--no-clean", "--no-pagination", "--chunk-size", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid URL format. Please provide a valid URL."))
        .stderr(predicate::str::contains("unexpected argument").not());
}

#[test]
fn test_cli_rejects_bare_domain() {
    cmd()
        .arg("example.com/post")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid URL"));
}

#[test]
fn test_cli_zero_chunk_size() {
    cmd()
        .args(["https://example.com/post", "--chunk-size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chunk-size"));
}

#[test]
fn test_cli_missing_configuration() {
    let temp = TempDir::new().unwrap();

    cmd()
        .current_dir(temp.path())
        .arg("https://example.com/post")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AZURE_ENDPOINT"));
}
