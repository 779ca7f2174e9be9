//! Exit codes of the `minidfs-volume` process

use minidfs::common::error::exit_code;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_volume(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_minidfs-volume"))
        .args(args)
        .current_dir(dir.path())
        .env("MINIDFS_CONFIG", dir.path().join("absent.toml"))
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_missing_port() {
    let dir = TempDir::new().unwrap();
    let output = run_volume(&dir, &[]);
    assert_eq!(output.status.code(), Some(exit_code::MISSING_PORT));
}

#[test]
fn test_non_numeric_port() {
    let dir = TempDir::new().unwrap();
    let output = run_volume(&dir, &["abc"]);
    assert_eq!(output.status.code(), Some(exit_code::INVALID_ARGS));
}

#[test]
fn test_unknown_flag() {
    let dir = TempDir::new().unwrap();
    let output = run_volume(&dir, &["65530", "--frobnicate"]);
    assert_eq!(output.status.code(), Some(exit_code::INVALID_ARGS));
}

#[test]
fn test_port_in_use() {
    let dir = TempDir::new().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    let root = dir.path().to_string_lossy().into_owned();
    let output = run_volume(&dir, &[&port, "--data-root", &root]);
    assert_eq!(output.status.code(), Some(exit_code::BIND));
    drop(taken);
}

#[test]
fn test_data_dir_cannot_be_created() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"").unwrap();

    let port = free_port().to_string();
    let root = file.to_string_lossy().into_owned();
    let output = run_volume(&dir, &[&port, "--data-root", &root]);
    assert_eq!(output.status.code(), Some(exit_code::DATA_DIR));
}

#[test]
fn test_help_exits_cleanly() {
    let dir = TempDir::new().unwrap();
    let output = run_volume(&dir, &["--help"]);
    assert!(output.status.success());
}
