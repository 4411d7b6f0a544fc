use crate::gateway::{GatewayOptions, RuntimeGateway};
use crate::prereq::{check_compose_prereqs, format_missing, DOCKER_INSTALL_HINT};
use crate::RuntimeError;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Gateway that shells out to `docker compose -f <manifest> -p <project>`.
pub struct ComposeGateway {
    program: String,
    base_args: Vec<String>,
    pull_images: bool,
}

impl ComposeGateway {
    pub fn new(options: &GatewayOptions) -> Result<Self, RuntimeError> {
        let Some((program, base_args)) = options.compose_command.split_first() else {
            return Err(RuntimeError::RuntimeUnavailable(
                "compose_command is empty".to_owned(),
            ));
        };
        Ok(Self {
            program: program.clone(),
            base_args: base_args.to_vec(),
            pull_images: options.pull_images,
        })
    }

    fn compose(&self, manifest: &Path, project: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .arg("-f")
            .arg(manifest)
            .arg("-p")
            .arg(project);
        cmd
    }

    fn ensure_available(&self) -> Result<(), RuntimeError> {
        let mut full = vec![self.program.clone()];
        full.extend(self.base_args.iter().cloned());
        let missing = check_compose_prereqs(&full);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::RuntimeUnavailable(format_missing(&missing)))
        }
    }
}

/// Run to completion with captured output; returns stdout.
fn run_captured(mut cmd: Command) -> Result<String, RuntimeError> {
    let rendered = render(&cmd);
    debug!("running: {rendered}");
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(spawn_error)?;
    if !output.status.success() {
        return Err(RuntimeError::RuntimeCommandFailed {
            command: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run attached to the caller's terminal.
fn run_attached(mut cmd: Command) -> Result<(), RuntimeError> {
    let rendered = render(&cmd);
    debug!("running (attached): {rendered}");
    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(spawn_error)?;
    if status.success() {
        Ok(())
    } else {
        Err(RuntimeError::RuntimeCommandFailed {
            command: rendered,
            stderr: format!("exited with {status}"),
        })
    }
}

fn spawn_error(e: std::io::Error) -> RuntimeError {
    if e.kind() == ErrorKind::NotFound {
        RuntimeError::RuntimeUnavailable(DOCKER_INSTALL_HINT.to_owned())
    } else {
        RuntimeError::Io(e)
    }
}

fn render(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn up_args(pull_images: bool) -> Vec<&'static str> {
    let mut args = vec!["up", "-d"];
    if pull_images {
        args.push("--pull=always");
    }
    args
}

fn down_args(remove_volumes: bool) -> Vec<&'static str> {
    let mut args = vec!["down"];
    if remove_volumes {
        args.push("-v");
    }
    args
}

fn logs_args(follow: bool, service: Option<&str>) -> Vec<String> {
    let mut args = vec!["logs".to_owned()];
    if follow {
        args.push("-f".to_owned());
    }
    if let Some(service) = service {
        args.push(service.to_owned());
    }
    args
}

fn exec_args(service: &str, command: &[String], interactive: bool) -> Vec<String> {
    let mut args = vec!["exec".to_owned()];
    if !interactive {
        args.push("-T".to_owned());
    }
    args.push(service.to_owned());
    args.extend(command.iter().cloned());
    args
}

impl RuntimeGateway for ComposeGateway {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn apply(&self, manifest: &Path, project: &str) -> Result<(), RuntimeError> {
        self.ensure_available()?;
        let mut cmd = self.compose(manifest, project);
        cmd.args(up_args(self.pull_images));
        run_captured(cmd).map(|_| ())
    }

    fn teardown(
        &self,
        manifest: &Path,
        project: &str,
        remove_volumes: bool,
    ) -> Result<(), RuntimeError> {
        let mut cmd = self.compose(manifest, project);
        cmd.args(down_args(remove_volumes));
        run_captured(cmd).map(|_| ())
    }

    fn pause(&self, manifest: &Path, project: &str) -> Result<(), RuntimeError> {
        let mut cmd = self.compose(manifest, project);
        cmd.arg("stop");
        run_captured(cmd).map(|_| ())
    }

    fn resume(&self, manifest: &Path, project: &str) -> Result<(), RuntimeError> {
        let mut cmd = self.compose(manifest, project);
        cmd.arg("start");
        run_captured(cmd).map(|_| ())
    }

    fn process_list(&self, manifest: &Path, project: &str) -> Result<String, RuntimeError> {
        let mut cmd = self.compose(manifest, project);
        cmd.args(["ps", "--format", "table"]);
        run_captured(cmd)
    }

    fn stream_logs(
        &self,
        manifest: &Path,
        project: &str,
        follow: bool,
        service: Option<&str>,
    ) -> Result<(), RuntimeError> {
        let mut cmd = self.compose(manifest, project);
        cmd.args(logs_args(follow, service));
        run_attached(cmd)
    }

    fn exec_in_service(
        &self,
        manifest: &Path,
        project: &str,
        service: &str,
        command: &[String],
        interactive: bool,
    ) -> Result<(), RuntimeError> {
        let mut cmd = self.compose(manifest, project);
        cmd.args(exec_args(service, command, interactive));
        if interactive {
            run_attached(cmd)
        } else {
            run_captured(cmd).map(|_| ())
        }
    }
}
