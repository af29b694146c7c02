//! End-to-end CLI smoke tests: spawn the built `b1c` binary against small
//! fixture programs and check exit codes and produced artifacts.

use std::path::PathBuf;
use std::process::Command;

fn fixture(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("b1c_integration_tests");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn compile_only_emits_an_ir_file() {
    let src = fixture("straight_line.bas", "10 LET A = 1\n20 LET B = A + 2\n30 PRINT B\n");
    let ir_path = src.with_extension("ir");
    let _ = std::fs::remove_file(&ir_path);

    let status = Command::new(env!("CARGO_BIN_EXE_b1c")).arg("-nc").arg(&src).status().unwrap();
    assert!(status.success());
    assert!(ir_path.exists());
}

#[test]
fn syntax_error_exits_nonzero() {
    let src = fixture("broken.bas", "10 LET = 1\n");
    let status = Command::new(env!("CARGO_BIN_EXE_b1c")).arg("-nc").arg(&src).status().unwrap();
    assert!(!status.success());
}

#[test]
fn missing_input_file_is_a_bad_arguments_error() {
    let status = Command::new(env!("CARGO_BIN_EXE_b1c")).status().unwrap();
    assert_eq!(status.code(), Some(1));
}
