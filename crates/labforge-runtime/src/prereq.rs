use std::fmt;
use std::process::{Command, Stdio};

/// Message shown when the docker binary cannot be found.
pub const DOCKER_INSTALL_HINT: &str =
    "Docker is not installed or not in PATH. Install Docker: https://docs.docker.com/get-docker/";

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn compose_responds(compose_command: &[String]) -> bool {
    let Some((program, args)) = compose_command.split_first() else {
        return false;
    };
    Command::new(program)
        .args(args)
        .arg("version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check that the compose command can run. An empty result means every
/// prerequisite is met.
pub fn check_compose_prereqs(compose_command: &[String]) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    let Some(program) = compose_command.first() else {
        missing.push(MissingPrereq {
            name: "compose command".to_owned(),
            purpose: "running lab manifests",
            install_hint: "set compose_command in the labforge config file",
        });
        return missing;
    };

    if !command_exists(program) {
        missing.push(MissingPrereq {
            name: program.clone(),
            purpose: "container runtime",
            install_hint: "https://docs.docker.com/get-docker/",
        });
    } else if !compose_responds(compose_command) {
        missing.push(MissingPrereq {
            name: compose_command.join(" "),
            purpose: "multi-container manifests",
            install_hint: "https://docs.docker.com/compose/install/",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nlabforge needs a container runtime with compose support to run labs.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "docker".to_owned(),
            purpose: "container runtime",
            install_hint: "https://docs.docker.com/get-docker/",
        };
        let s = format!("{m}");
        assert!(s.contains("docker"));
        assert!(s.contains("container runtime"));
        assert!(s.contains("get-docker"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![MissingPrereq {
            name: "docker compose".to_owned(),
            purpose: "multi-container manifests",
            install_hint: "https://docs.docker.com/compose/install/",
        }];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("docker compose"));
    }

    #[test]
    fn nonexistent_program_is_reported() {
        let missing = check_compose_prereqs(&["labforge-no-such-binary".to_owned()]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "labforge-no-such-binary");
    }

    #[test]
    fn empty_command_is_reported() {
        assert_eq!(check_compose_prereqs(&[]).len(), 1);
    }
}
