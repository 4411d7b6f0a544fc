//! CLI subprocess integration tests.
//!
//! These tests invoke the `labforge` binary as a subprocess with the mock
//! runtime and verify exit codes, stdout content, and JSON output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const MALWARE_LAB: &str = r#"name: malware-lab
description: Isolated malware analysis lab
settings:
  lab_password: changeme
services:
  - name: victim
    image: ubuntu:22.04
    ip_offset: 10
    ports:
      - "2222:22"
    environment:
      ROOT_PASSWORD: "${lab_password}"
    access:
      - label: SSH
        url: ssh://localhost:2222
        credentials:
          username: root
          password: "${lab_password}"
"#;

struct Sandbox {
    root: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let templates = root.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("malware-lab.yml"), MALWARE_LAB).unwrap();
        Self { root }
    }

    fn labs(&self) -> PathBuf {
        self.root.path().join("labs")
    }

    fn templates(&self) -> PathBuf {
        self.root.path().join("templates")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_labforge"));
        cmd.env("HOME", self.root.path())
            .env_remove("LABFORGE_LABS_DIR")
            .env_remove("LABFORGE_TEMPLATES_DIR")
            .env_remove("LABFORGE_RUNTIME")
            .env_remove("LABFORGE_LOG")
            .arg("--labs-dir")
            .arg(self.labs())
            .arg("--templates-dir")
            .arg(self.templates())
            .args(["--runtime", "mock"]);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().unwrap()
    }

    fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let out = self.cmd().arg("--json").args(args).output().unwrap();
        assert!(
            out.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        serde_json::from_slice(&out.stdout).unwrap()
    }

    fn build(&self) -> String {
        let report = self.run_json(&["build", "-t", "malware-lab"]);
        report["record"]["lab_id"].as_str().unwrap().to_owned()
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_labforge"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("labforge"));
}

#[test]
fn cli_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_labforge"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    for cmd in ["build", "destroy", "start", "stop", "list", "logs", "shell", "init"] {
        assert!(text.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn cli_build_json_reports_running_lab() {
    let sb = Sandbox::new();
    let report = sb.run_json(&["build", "-t", "malware-lab", "--override", "lab_password=s3cret"]);
    assert_eq!(report["record"]["status"], "running");
    assert_eq!(report["record"]["template"], "malware-lab");
    let lab_id = report["record"]["lab_id"].as_str().unwrap();
    assert!(lab_id.starts_with("mal-"));

    let manifest = std::fs::read_to_string(sb.labs().join(lab_id).join("docker-compose.yml")).unwrap();
    assert!(manifest.contains("s3cret"));
    assert!(sb.labs().join(lab_id).join("state.yml").is_file());
}

#[test]
fn cli_build_human_output_shows_access() {
    let sb = Sandbox::new();
    let out = sb.run(&["build", "-t", "malware-lab", "-n", "triage"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("lab id:  tri-"));
    assert!(text.contains("SSH: ssh://localhost:2222 (root:changeme)"));
    assert!(text.contains("2222:22"));
}

#[test]
fn cli_malformed_override_exits_one() {
    let sb = Sandbox::new();
    let out = sb.run(&["build", "-t", "malware-lab", "--override", "novalue"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("invalid override 'novalue'"));
    assert!(!sb.labs().join("state.yml").exists());
}

#[test]
fn cli_unknown_template_exits_one() {
    let sb = Sandbox::new();
    let out = sb.run(&["build", "-t", "nope"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.starts_with("error: "));
    assert!(err.contains("template 'nope' not found"));
}

#[test]
fn cli_list_empty_and_populated() {
    let sb = Sandbox::new();
    let out = sb.run(&["list"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("No labs found"));

    let lab_id = sb.build();
    let out = sb.run(&["list"]);
    let text = stdout(&out);
    assert!(text.contains(&lab_id));
    assert!(text.contains("running"));
    assert!(text.contains("172.30."));

    let listed = sb.run_json(&["list"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[test]
fn cli_stop_start_and_noops() {
    let sb = Sandbox::new();
    let lab_id = sb.build();

    let out = sb.run(&["start", &lab_id]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("is running, cannot start."));

    let out = sb.run(&["stop", &lab_id]);
    assert!(out.status.success());
    assert!(stdout(&out).contains(&format!("Lab {lab_id} stopped.")));

    let status = sb.run_json(&["status", &lab_id]);
    assert_eq!(status["record"]["status"], "stopped");
    assert!(status["live"].is_null());

    let out = sb.run(&["start", &lab_id[..6]]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("started."));
}

#[test]
fn cli_status_and_info() {
    let sb = Sandbox::new();
    let lab_id = sb.build();

    let out = sb.run(&["status", &lab_id]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Template: malware-lab"));
    assert!(text.contains("(mock)"));

    let info = sb.run_json(&["info", &lab_id]);
    let victim = &info["services"][0];
    assert_eq!(victim["name"], "victim");
    assert!(victim["address"].as_str().unwrap().ends_with(".10"));
}

#[test]
fn cli_destroy_then_noop_then_force() {
    let sb = Sandbox::new();
    let lab_id = sb.build();

    let out = sb.run(&["destroy", &lab_id, "--volumes"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(!sb.labs().join(&lab_id).exists());

    let out = sb.run(&["destroy", &lab_id]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("No lab found matching"));

    let leftover = sb.labs().join("old-deadbeef");
    std::fs::create_dir_all(&leftover).unwrap();
    let outcome = sb.run_json(&["destroy", "old-deadbeef", "--force"]);
    assert_eq!(outcome["outcome"], "removed_leftovers");
    assert!(!leftover.exists());
}

#[test]
fn cli_missing_lab_is_an_error_for_start() {
    let sb = Sandbox::new();
    let out = sb.run(&["start", "zzz"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("No lab found matching 'zzz'"));
}

#[test]
fn cli_logs_and_shell_with_mock() {
    let sb = Sandbox::new();
    let lab_id = sb.build();

    let out = sb.run(&["logs", &lab_id, "-s", "victim"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("mock logs for labforge-"));

    let out = sb.run(&["shell", &lab_id, "-s", "victim"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
}

#[test]
fn cli_templates_lists_directory() {
    let sb = Sandbox::new();
    let out = sb.run(&["templates"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("malware-lab"));
    assert!(text.contains("Isolated malware analysis lab"));
}

#[test]
fn cli_fresh_home_uses_bundled_templates() {
    let home = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_labforge"))
            .env("HOME", home.path())
            .env_remove("LABFORGE_LABS_DIR")
            .env_remove("LABFORGE_TEMPLATES_DIR")
            .env_remove("LABFORGE_RUNTIME")
            .env_remove("LABFORGE_LOG")
            .args(["--runtime", "mock"])
            .args(args)
            .output()
            .unwrap()
    };

    let out = run(&["templates"]);
    assert!(out.status.success());
    let text = stdout(&out);
    for name in ["malware-lab", "web-pentest", "windows-ad"] {
        assert!(text.contains(name), "templates must list '{name}'");
    }
    assert!(text.contains("(built-in)"));

    let out = run(&["build", "-t", "malware-lab"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(has_lab(&home.path().join(".local/share/labforge/labs")));
}

#[test]
fn cli_init_scaffolds_buildable_template() {
    let sb = Sandbox::new();
    let path = sb.root.path().join("custom/my-lab.yml");
    let path_str = path.to_string_lossy().into_owned();

    let out = sb.run(&["init", &path_str]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("name: my-lab"));

    let again = sb.run(&["init", &path_str]);
    assert_eq!(again.status.code(), Some(1));

    let report = sb.run_json(&["build", "-t", &path_str]);
    assert_eq!(report["record"]["name"], "my-lab");
}

#[test]
fn cli_config_file_sets_dirs() {
    let root = tempfile::tempdir().unwrap();
    let templates = root.path().join("tpl");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("malware-lab.yml"), MALWARE_LAB).unwrap();
    let config = root.path().join("labforge.toml");
    std::fs::write(
        &config,
        format!(
            "labs_dir = \"{}\"\ntemplates_dir = \"{}\"\nruntime = \"mock\"\n",
            root.path().join("labs-from-config").display(),
            templates.display()
        ),
    )
    .unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_labforge"))
        .env("HOME", root.path())
        .env_remove("LABFORGE_LABS_DIR")
        .env_remove("LABFORGE_TEMPLATES_DIR")
        .env_remove("LABFORGE_RUNTIME")
        .arg("--config")
        .arg(&config)
        .args(["build", "-t", "malware-lab"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(has_lab(&root.path().join("labs-from-config")));
}

#[test]
fn cli_missing_config_file_is_an_error() {
    let sb = Sandbox::new();
    let out = sb.run(&["--config", "/nonexistent/labforge.toml", "list"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("configuration error"));
}

#[test]
fn cli_completions_and_man_pages() {
    let out = Command::new(env!("CARGO_BIN_EXE_labforge"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(stdout(&out).contains("labforge"));

    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_labforge"))
        .arg("man-pages")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(dir.path().join("labforge.1").is_file());
    assert!(dir.path().join("labforge-build.1").is_file());
}

fn has_lab(labs: &Path) -> bool {
    std::fs::read_dir(labs)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.path().join("state.yml").is_file())
        })
        .unwrap_or(false)
}
