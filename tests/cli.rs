use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn codesim(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("codesim").unwrap();
    cmd.current_dir(temp.path())
        .arg("--config")
        .arg(temp.path().join("missing.toml"))
        .env_remove("CODESIM_OLLAMA_HOST")
        .env_remove("CODESIM_EMBEDDING_MODEL");
    cmd
}

#[test]
fn test_config_show_prints_defaults() {
    let temp = TempDir::new().unwrap();
    codesim(&temp)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold = 0.85"))
        .stdout(predicate::str::contains("mode = \"hybrid\""));
}

#[test]
fn test_search_without_index_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("lib.rs"), "fn a() {}\n").unwrap();
    codesim(&temp)
        .args(["search", "lib.rs", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No index found"));
}

#[test]
fn test_index_clear_without_index() {
    let temp = TempDir::new().unwrap();
    codesim(&temp)
        .args(["index", "--clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No index to clear"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "[duplicates]\nthreshold = 2.0\n").unwrap();

    Command::cargo_bin("codesim")
        .unwrap()
        .current_dir(temp.path())
        .arg("--config")
        .arg(&path)
        .args(["config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_config_init_ignores_invalid_existing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "[duplicates]\nthreshold = 2.0\n").unwrap();

    Command::cargo_bin("codesim")
        .unwrap()
        .current_dir(temp.path())
        .arg("--config")
        .arg(&path)
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_config_init_writes_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested/config.toml");

    Command::cargo_bin("codesim")
        .unwrap()
        .current_dir(temp.path())
        .arg("--config")
        .arg(&path)
        .args(["config", "--init"])
        .assert()
        .success();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("threshold = 0.85"));
}
