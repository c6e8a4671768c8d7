//! Tests for error handling, suggestions and exit codes.

use std::{fs, path::Path};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn p2(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("p2");
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_malformed_env_line_is_reported_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.j2"), "{{ A }}").unwrap();
    fs::write(dir.path().join("bad.env"), "A=1\nthis line has no separator\n").unwrap();

    p2(dir.path())
        .args(["-t", "t.j2", "-i", "bad.env"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("this line has no separator"))
        .stderr(predicate::str::contains("Could not find an equals value to split on"));
}

#[test]
fn test_env_arrays_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.j2"), "{{ A }}").unwrap();

    p2(dir.path())
        .args(["-t", "t.j2", "-f", "env"])
        .write_stdin("A=one two\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("p2 does not parse arrays"));
}

#[test]
fn test_failed_render_keeps_partial_output_and_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.j2"), "first line\n{{ 1 | to_toml }}\n").unwrap();
    fs::write(dir.path().join("data.json"), "{}").unwrap();

    p2(dir.path())
        .args(["-t", "t.j2", "-i", "data.json", "-o", "out.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("t.j2"))
        .stderr(predicate::str::contains("out.txt"));

    assert_eq!(
        fs::read_to_string(dir.path().join("out.txt")).unwrap(),
        "first line\n"
    );
}

#[test]
fn test_one_bad_template_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::create_dir_all(dir.path().join("out")).unwrap();
    fs::write(templates.join("a.txt"), "a={{ name }}").unwrap();
    fs::write(templates.join("b.txt"), "{{ name | from_base64 }}").unwrap();
    fs::write(templates.join("c.txt"), "c={{ name }}").unwrap();
    fs::write(dir.path().join("data.json"), r#"{"name": "not base64!"}"#).unwrap();

    p2(dir.path())
        .args(["-t", "templates", "-i", "data.json", "--directory-mode", "-o", "out"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1 of 3 templates failed"));

    assert_eq!(fs::read_to_string(dir.path().join("out/a.txt")).unwrap(), "a=not base64!");
    assert_eq!(fs::read_to_string(dir.path().join("out/c.txt")).unwrap(), "c=not base64!");
}

#[test]
fn test_unknown_scripting_filter_is_rejected_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.j2"), "x").unwrap();

    p2(dir.path())
        .args(["-t", "t.j2", "-f", "env", "--enable-filters", "exec"])
        .write_stdin("")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("exec"))
        .stderr(predicate::str::contains("write_file"));
}

#[test]
fn test_scripting_filters_are_off_by_default() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.j2"), "{{ \"x\" | write_file(\"side.txt\") }}").unwrap();

    p2(dir.path())
        .args(["-t", "t.j2", "-f", "env"])
        .write_stdin("")
        .assert()
        .failure();
    assert!(!dir.path().join("side.txt").exists());
}

#[test]
fn test_missing_template_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    p2(dir.path())
        .args(["-t", "nope.j2", "-f", "env"])
        .write_stdin("")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Suggestions:"));
}

#[test]
fn test_unknown_input_extension_is_a_user_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.j2"), "x").unwrap();
    fs::write(dir.path().join("data.ini"), "a=1").unwrap();

    p2(dir.path())
        .args(["-t", "t.j2", "-i", "data.ini"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ini"));
}

#[test]
fn test_missing_config_file_exits_four() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.j2"), "x").unwrap();

    p2(dir.path())
        .args(["-c", "absent.toml", "-t", "t.j2"])
        .assert()
        .code(4);
}

#[test]
fn test_bad_arguments_exit_two() {
    cargo_bin_cmd!("p2")
        .args(["--template"])
        .assert()
        .code(2);
}
