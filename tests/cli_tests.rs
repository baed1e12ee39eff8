// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Command-line behaviour of the stagegen binary

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn stagegen_cmd() -> Command {
    let mut cmd = Command::cargo_bin("stagegen").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "Blueprints", "modules: []\n");
    write(root, "out/.modules.list", "tool/build.yaml\n");
    write(
        root,
        "tool/build.yaml",
        "modules:\n  - type: bootstrap_primary_binary\n    name: tool\n    srcs: [\"*.rs\"]\n",
    );
    write(root, "tool/main.rs", "");
    temp
}

#[test]
fn test_help_lists_regeneration_flags() {
    stagegen_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--empty-ninja-file"))
        .stdout(predicate::str::contains("--delve_listen"))
        .stdout(predicate::str::contains("--globListDir"))
        .stdout(predicate::str::contains("--stop-before").not());
}

#[test]
fn test_missing_module_list_is_fatal() {
    let temp = project();

    stagegen_cmd()
        .current_dir(temp.path())
        .args(["-o", "out/build.ninja", "Blueprints"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "-l <moduleListFile> is required and must be nonempty",
        ));

    assert!(!temp.path().join("out/build.ninja").exists());
}

#[test]
fn test_generates_ninja_and_depfile() {
    let temp = project();

    stagegen_cmd()
        .current_dir(temp.path())
        .args([
            "-b",
            "out",
            "-d",
            "out/build.ninja.d",
            "-l",
            "out/.modules.list",
            "-o",
            "out/build.ninja",
            "Blueprints",
        ])
        .assert()
        .success();

    let ninja = fs::read_to_string(temp.path().join("out/build.ninja")).unwrap();
    assert!(ninja.contains("build $buildDir/bin/tool: g.bootstrap.cp"));

    let depfile = fs::read_to_string(temp.path().join("out/build.ninja.d")).unwrap();
    assert!(depfile.starts_with("out/build.ninja: \\\n out/.modules.list \\\n tool/build.yaml"));
}

#[test]
fn test_directory_flag() {
    let temp = project();

    stagegen_cmd()
        .args(["-C"])
        .arg(temp.path())
        .args(["-b", "out", "-l", "out/.modules.list", "-o", "out/build.ninja"])
        .arg("--empty-ninja-file")
        .arg("Blueprints")
        .assert()
        .success();

    let meta = fs::metadata(temp.path().join("out/build.ninja")).unwrap();
    assert_eq!(meta.len(), 0);
}

#[test]
fn test_graph_errors_reported_together() {
    let temp = project();
    write(
        temp.path(),
        "tool/build.yaml",
        "modules:\n  - type: cc_binary\n    name: a\n  - type: bootstrap_binary\n    srcs: [main.rs]\n",
    );

    stagegen_cmd()
        .current_dir(temp.path())
        .args(["-b", "out", "-l", "out/.modules.list", "-o", "out/build.ninja", "Blueprints"])
        .env("NO_COLOR", "1")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: tool/build.yaml: unrecognized module type \"cc_binary\"",
        ))
        .stderr(predicate::str::contains("has no \"name\""));
}

#[test]
fn test_stop_before_write_ninja() {
    let temp = project();

    stagegen_cmd()
        .current_dir(temp.path())
        .args([
            "-b",
            "out",
            "-l",
            "out/.modules.list",
            "-o",
            "out/build.ninja",
            "--stop-before",
            "write-ninja",
            "Blueprints",
        ])
        .assert()
        .success();

    assert!(!temp.path().join("out/build.ninja").exists());
}

#[test]
fn test_invalid_invocations_file() {
    let temp = project();
    write(temp.path(), "invocations.json", "{not json");

    stagegen_cmd()
        .current_dir(temp.path())
        .args([
            "-l",
            "out/.modules.list",
            "--invocations",
            "invocations.json",
            "Blueprints",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid invocation list"));
}
