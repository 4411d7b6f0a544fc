use crate::gateway::RuntimeGateway;
use crate::RuntimeError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// One recorded gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Apply {
        manifest: PathBuf,
        project: String,
    },
    Teardown {
        project: String,
        remove_volumes: bool,
    },
    Pause {
        project: String,
    },
    Resume {
        project: String,
    },
    ProcessList {
        project: String,
    },
    StreamLogs {
        project: String,
        follow: bool,
        service: Option<String>,
    },
    Exec {
        project: String,
        service: String,
        command: Vec<String>,
        interactive: bool,
    },
}

impl GatewayCall {
    fn operation(&self) -> &'static str {
        match self {
            GatewayCall::Apply { .. } => "apply",
            GatewayCall::Teardown { .. } => "teardown",
            GatewayCall::Pause { .. } => "pause",
            GatewayCall::Resume { .. } => "resume",
            GatewayCall::ProcessList { .. } => "process_list",
            GatewayCall::StreamLogs { .. } => "stream_logs",
            GatewayCall::Exec { .. } => "exec",
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<GatewayCall>,
    /// project -> containers running
    projects: HashMap<String, bool>,
    failing: HashSet<&'static str>,
    failing_commands: HashSet<String>,
}

/// In-memory gateway for tests. Records every call and can be told to fail
/// specific operations.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state.lock().map_err(|e| RuntimeError::RuntimeCommandFailed {
            command: "mock".to_owned(),
            stderr: format!("mutex poisoned: {e}"),
        })
    }

    /// Make every later call of `operation` fail. Operation names are
    /// `apply`, `teardown`, `pause`, `resume`, `process_list`,
    /// `stream_logs` and `exec`.
    pub fn fail_on(&self, operation: &'static str) {
        if let Ok(mut state) = self.lock() {
            state.failing.insert(operation);
        }
    }

    /// Make `exec` fail only when the joined command equals `command`.
    pub fn fail_exec_of(&self, command: &str) {
        if let Ok(mut state) = self.lock() {
            state.failing_commands.insert(command.to_owned());
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn is_running(&self, project: &str) -> bool {
        self.lock()
            .map(|s| s.projects.get(project).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    fn record(&self, call: GatewayCall) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        let mut state = self.lock()?;
        let op = call.operation();
        let rejected = state.failing.contains(op)
            || matches!(&call, GatewayCall::Exec { command, .. }
                if state.failing_commands.contains(&command.join(" ")));
        state.calls.push(call);
        if rejected {
            return Err(RuntimeError::RuntimeCommandFailed {
                command: format!("mock {op}"),
                stderr: "injected failure".to_owned(),
            });
        }
        Ok(state)
    }
}

impl RuntimeGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn apply(&self, manifest: &Path, project: &str) -> Result<(), RuntimeError> {
        let mut state = self.record(GatewayCall::Apply {
            manifest: manifest.to_path_buf(),
            project: project.to_owned(),
        })?;
        state.projects.insert(project.to_owned(), true);
        Ok(())
    }

    fn teardown(
        &self,
        _manifest: &Path,
        project: &str,
        remove_volumes: bool,
    ) -> Result<(), RuntimeError> {
        let mut state = self.record(GatewayCall::Teardown {
            project: project.to_owned(),
            remove_volumes,
        })?;
        state.projects.remove(project);
        Ok(())
    }

    fn pause(&self, _manifest: &Path, project: &str) -> Result<(), RuntimeError> {
        let mut state = self.record(GatewayCall::Pause {
            project: project.to_owned(),
        })?;
        state.projects.insert(project.to_owned(), false);
        Ok(())
    }

    fn resume(&self, _manifest: &Path, project: &str) -> Result<(), RuntimeError> {
        let mut state = self.record(GatewayCall::Resume {
            project: project.to_owned(),
        })?;
        state.projects.insert(project.to_owned(), true);
        Ok(())
    }

    fn process_list(&self, _manifest: &Path, project: &str) -> Result<String, RuntimeError> {
        let state = self.record(GatewayCall::ProcessList {
            project: project.to_owned(),
        })?;
        let status = match state.projects.get(project) {
            Some(true) => "running",
            Some(false) => "exited",
            None => "absent",
        };
        Ok(format!("NAME\tSTATUS\n{project}\t{status} (mock)\n"))
    }

    fn stream_logs(
        &self,
        _manifest: &Path,
        project: &str,
        follow: bool,
        service: Option<&str>,
    ) -> Result<(), RuntimeError> {
        drop(self.record(GatewayCall::StreamLogs {
            project: project.to_owned(),
            follow,
            service: service.map(str::to_owned),
        })?);
        println!("mock logs for {project}");
        Ok(())
    }

    fn exec_in_service(
        &self,
        _manifest: &Path,
        project: &str,
        service: &str,
        command: &[String],
        interactive: bool,
    ) -> Result<(), RuntimeError> {
        drop(self.record(GatewayCall::Exec {
            project: project.to_owned(),
            service: service.to_owned(),
            command: command.to_vec(),
            interactive,
        })?);
        Ok(())
    }
}
