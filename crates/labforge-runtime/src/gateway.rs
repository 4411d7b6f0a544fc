use crate::RuntimeError;
use std::path::Path;

/// Options shared by subprocess-backed gateways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Program and leading arguments, e.g. `["docker", "compose"]`.
    pub compose_command: Vec<String>,
    /// Pass `--pull=always` to `up`.
    pub pull_images: bool,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            compose_command: vec!["docker".to_owned(), "compose".to_owned()],
            pull_images: true,
        }
    }
}

/// Operations labforge needs from a container runtime.
///
/// Every call names the lab's manifest file and its project name; the
/// gateway keeps no per-lab state of its own.
pub trait RuntimeGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Create and start every service in the manifest, detached.
    fn apply(&self, manifest: &Path, project: &str) -> Result<(), RuntimeError>;

    /// Stop and remove the project's containers and network, optionally its
    /// named volumes.
    fn teardown(
        &self,
        manifest: &Path,
        project: &str,
        remove_volumes: bool,
    ) -> Result<(), RuntimeError>;

    /// Stop containers without removing them.
    fn pause(&self, manifest: &Path, project: &str) -> Result<(), RuntimeError>;

    /// Start previously stopped containers.
    fn resume(&self, manifest: &Path, project: &str) -> Result<(), RuntimeError>;

    /// Human-readable table of the project's containers.
    fn process_list(&self, manifest: &Path, project: &str) -> Result<String, RuntimeError>;

    /// Write service logs to the terminal. With `follow`, blocks until the
    /// stream ends or the user interrupts it.
    fn stream_logs(
        &self,
        manifest: &Path,
        project: &str,
        follow: bool,
        service: Option<&str>,
    ) -> Result<(), RuntimeError>;

    /// Run `command` inside `service`. Interactive calls attach the
    /// terminal; non-interactive calls capture output.
    fn exec_in_service(
        &self,
        manifest: &Path,
        project: &str,
        service: &str,
        command: &[String],
        interactive: bool,
    ) -> Result<(), RuntimeError>;
}

pub fn select_gateway(
    name: &str,
    options: &GatewayOptions,
) -> Result<Box<dyn RuntimeGateway>, RuntimeError> {
    match name {
        "docker" => Ok(Box::new(crate::compose::ComposeGateway::new(options)?)),
        "mock" => Ok(Box::new(crate::mock::MockGateway::new())),
        other => Err(RuntimeError::UnknownRuntime(other.to_owned())),
    }
}
