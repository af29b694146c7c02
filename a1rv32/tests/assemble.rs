//! End-to-end CLI smoke tests: spawn the built `a1rv32` binary against a
//! small fixture program and check exit codes and produced artifacts.

use std::path::PathBuf;
use std::process::Command;

fn fixture(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("a1rv32_integration_tests");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn assembles_a_straight_line_program_to_hex() {
    let src = fixture("straight_line.asm", ".CODE\nLI T0, 5\nLI T1, 2\nADD T0, T0, T1\nRET\n");
    let hex_path = src.with_extension("ihx");
    let _ = std::fs::remove_file(&hex_path);

    let status = Command::new(env!("CARGO_BIN_EXE_a1rv32")).arg(&src).status().unwrap();
    assert!(status.success());
    assert!(hex_path.exists());
}

#[test]
fn missing_input_file_is_a_bad_arguments_error() {
    let status = Command::new(env!("CARGO_BIN_EXE_a1rv32")).status().unwrap();
    assert_eq!(status.code(), Some(1));
}
