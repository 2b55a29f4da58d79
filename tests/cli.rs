//! Exit codes and artifacts of the `tapeir` binary

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn tapeir(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tapeir").unwrap();
    cmd.current_dir(dir.path()).arg("--quiet");
    cmd
}

fn source_file(dir: &TempDir, name: &str, contents: &[u8]) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path.display().to_string()
}

#[test]
fn writes_the_default_artifact() {
    let dir = TempDir::new().unwrap();
    let file = source_file(&dir, "add.bf", b"+++.");

    tapeir(&dir).arg(&file).assert().success();

    let ir = fs::read_to_string(dir.path().join("bf.ll")).unwrap();
    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("@tape = private global [60000 x i8] zeroinitializer"));
}

#[test]
fn out_flag_picks_the_artifact_path() {
    let dir = TempDir::new().unwrap();
    let file = source_file(&dir, "loop.bf", b"+[-]");

    tapeir(&dir).arg(&file).arg("-o").arg("custom.ll").assert().success();
    tapeir(&dir)
        .arg(&file)
        .arg("--out")
        .arg("long.ll")
        .assert()
        .success();

    assert!(dir.path().join("custom.ll").exists());
    assert!(dir.path().join("long.ll").exists());
    assert!(!dir.path().join("bf.ll").exists());
}

#[test]
fn parse_failure_exits_1_without_an_artifact() {
    let dir = TempDir::new().unwrap();
    let file = source_file(&dir, "stray.bf", b"+\n+]");

    tapeir(&dir)
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("2:2"))
        .stderr(predicate::str::contains("unexpected closing bracket"));

    let file = source_file(&dir, "open.bf", b"[+");
    tapeir(&dir)
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unterminated loop"));

    assert!(!dir.path().join("bf.ll").exists());
}

#[test]
fn missing_file_exits_2() {
    let dir = TempDir::new().unwrap();
    tapeir(&dir).arg("nonexistent.bf").assert().code(2);
    assert!(!dir.path().join("bf.ll").exists());
}

#[test]
fn unwritable_artifact_exits_2() {
    let dir = TempDir::new().unwrap();
    let file = source_file(&dir, "ok.bf", b"+");
    tapeir(&dir)
        .arg(&file)
        .arg("-o")
        .arg("no-such-dir/out.ll")
        .assert()
        .code(2);
}

#[test]
fn unrecognised_arguments_print_usage_and_exit_0() {
    let dir = TempDir::new().unwrap();
    tapeir(&dir)
        .arg("--bogus")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Usage"));

    tapeir(&dir)
        .args(["a.bf", "b.bf"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn help_exits_0() {
    let dir = TempDir::new().unwrap();
    tapeir(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--out"));
}

#[test]
fn reads_the_program_from_stdin() {
    let dir = TempDir::new().unwrap();
    tapeir(&dir).write_stdin("++.").assert().success();
    assert!(dir.path().join("bf.ll").exists());
}

#[test]
fn invalid_utf8_is_commentary() {
    let dir = TempDir::new().unwrap();
    let file = source_file(&dir, "latin1.bf", b"+\xe9+.");

    tapeir(&dir)
        .arg(&file)
        .arg("--run")
        .assert()
        .success()
        .stdout(&b"\x02"[..]);
}

#[test]
fn run_executes_the_ir() {
    let dir = TempDir::new().unwrap();
    let file = source_file(&dir, "echo.bf", b",[.,]");

    tapeir(&dir)
        .arg(&file)
        .arg("--run")
        .write_stdin(&b"hi\0"[..])
        .assert()
        .success()
        .stdout("hi");
    assert!(!dir.path().join("bf.ll").exists());
}

#[test]
fn emit_prints_the_requested_views() {
    let dir = TempDir::new().unwrap();
    let file = source_file(&dir, "views.bf", b"x+[-]");

    tapeir(&dir)
        .arg(&file)
        .args(["-e", "tokens", "-e", "ast", "-e", "ir"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+[-]"))
        .stdout(predicate::str::contains("while (*ptr != 0) {"))
        .stdout(predicate::str::contains("loop_body:"));
}

#[test]
fn deeply_nested_programs_compile() {
    let dir = TempDir::new().unwrap();
    let depth = 100_000;
    let source = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
    let file = source_file(&dir, "deep.bf", source.as_bytes());

    tapeir(&dir).arg(&file).assert().success();
    assert!(dir.path().join("bf.ll").exists());
}
