use crate::interrupt::shutdown_requested;
use crate::config::EngineConfig;
use crate::id::generate_lab_id;
use crate::lifecycle::validate_transition;
use crate::network::{allocate, allocate_with_hint, compute_address};
use crate::{manifest, CoreError};
use labforge_runtime::RuntimeGateway;
use labforge_schema::{
    list_templates, resolve_template, AccessEntry, LabId, LabTemplate, TemplateSummary,
};
use labforge_store::{LabRecord, LabRepository, LabStatus, StoreError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Central orchestration engine for the lab lifecycle.
///
/// Sequences template resolution, subnet allocation, manifest generation,
/// the state store and the runtime gateway into build, start, stop,
/// destroy and inspection operations. Every operation taking a lab id
/// accepts a unique prefix.
pub struct Engine {
    config: EngineConfig,
    repository: Box<dyn LabRepository>,
    gateway: Arc<dyn RuntimeGateway>,
    env_lookup: EnvLookup,
}

#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Template name (looked up in the templates directory) or file path.
    pub template: String,
    /// Lab name; defaults to the template's `name`.
    pub name: Option<String>,
    /// Merged into the template's `settings` before interpolation.
    pub overrides: BTreeMap<String, String>,
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub record: LabRecord,
    pub manifest_path: PathBuf,
    /// Failed `post_start` commands. They never fail the build.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyOptions {
    pub volumes: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DestroyOutcome {
    Destroyed { lab_id: LabId, warnings: Vec<String> },
    /// Nothing to do; `reason` says why.
    AlreadyGone { lab_id: String, reason: String },
    /// Forced destroy of a lab without a readable record.
    RemovedLeftovers { lab_id: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Changed { record: LabRecord },
    Unchanged { record: LabRecord, reason: String },
}

impl TransitionOutcome {
    pub fn record(&self) -> &LabRecord {
        match self {
            TransitionOutcome::Changed { record } | TransitionOutcome::Unchanged { record, .. } => {
                record
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceAddress {
    pub name: String,
    pub image: String,
    pub platform: String,
    /// `None` when the offset does not fit the lab's subnet.
    pub address: Option<String>,
    pub ports: Vec<String>,
    pub access: Vec<AccessEntry>,
}

/// Everything `status` and `info` show about one lab.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LabReport {
    pub record: LabRecord,
    pub services: Vec<ServiceAddress>,
    /// Live container listing; only queried for running labs.
    pub live: Option<String>,
    pub warnings: Vec<String>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        repository: Box<dyn LabRepository>,
        gateway: Arc<dyn RuntimeGateway>,
    ) -> Self {
        Self {
            config,
            repository,
            gateway,
            env_lookup: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the environment used to resolve `${VAR}` placeholders that
    /// are not template settings.
    #[must_use]
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.env_lookup = Box::new(lookup);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport, CoreError> {
        let template = self.load_template(request)?;
        let lab_name = request.name.clone().unwrap_or_else(|| template.name.clone());
        let lab_id = generate_lab_id(&lab_name);

        let used = self.repository.used_subnets()?;
        let subnet = match template.network.explicit_subnet() {
            Some(hint) => allocate_with_hint(hint, &used)?,
            None => allocate(&used)?,
        };
        info!("building lab {lab_id} ({lab_name}) on {subnet}");

        let mut named = template.clone();
        named.name = lab_name;
        let record = self
            .repository
            .create(&lab_id, &request.template, &named, subnet)?;

        let manifest_path = match self.provision(&template, &record) {
            Ok(path) => path,
            Err(e) => {
                warn!("build of lab {lab_id} failed: {e}");
                if let Err(mark) = self.transition(&record, LabStatus::Error) {
                    warn!("could not mark lab {lab_id} as error: {mark}");
                }
                return Err(e);
            }
        };

        let record = self.transition(&record, LabStatus::Running)?;
        info!("lab {lab_id} is running");
        let warnings = self.run_post_start(&template, &lab_id, &manifest_path);

        Ok(BuildReport {
            record,
            manifest_path,
            warnings,
        })
    }

    fn load_template(&self, request: &BuildRequest) -> Result<LabTemplate, CoreError> {
        let source = resolve_template(&request.template, &self.config.templates_dir)?;
        debug!("template '{}' resolved to {source}", request.template);
        let mut document = source.load()?;
        document.apply_overrides(&request.overrides);
        document.validate()?;
        let template = document
            .interpolate(|key| (self.env_lookup)(key))
            .into_template()?;
        Ok(template)
    }

    /// Generate and write the manifest, then bring the project up.
    fn provision(&self, template: &LabTemplate, record: &LabRecord) -> Result<PathBuf, CoreError> {
        let compose = manifest::generate(template, record.subnet, &record.lab_id)?;
        let path = manifest::write(&compose, &self.repository.lab_dir(&record.lab_id))?;
        debug!("wrote manifest {}", path.display());
        self.gateway.apply(&path, &record.lab_id.project_name())?;
        Ok(path)
    }

    fn run_post_start(&self, template: &LabTemplate, lab_id: &LabId, manifest: &Path) -> Vec<String> {
        let project = lab_id.project_name();
        let mut warnings = Vec::new();
        for service in &template.services {
            for cmd in &service.post_start {
                debug!("post_start on {}: {cmd}", service.name);
                let argv = ["sh".to_owned(), "-c".to_owned(), cmd.clone()];
                if let Err(e) =
                    self.gateway
                        .exec_in_service(manifest, &project, &service.name, &argv, false)
                {
                    warn!("post_start command failed on {}: {e}", service.name);
                    warnings.push(format!(
                        "post_start command '{cmd}' failed on {}: {e}",
                        service.name
                    ));
                }
            }
        }
        warnings
    }

    fn transition(&self, record: &LabRecord, to: LabStatus) -> Result<LabRecord, CoreError> {
        validate_transition(record.status, to)?;
        Ok(self.repository.update_status(&record.lab_id, to)?)
    }

    fn load(&self, id: &str) -> Result<LabRecord, CoreError> {
        let lab_id = self.repository.resolve_id(id)?;
        Ok(self.repository.load(&lab_id)?)
    }

    pub fn destroy(&self, id: &str, options: DestroyOptions) -> Result<DestroyOutcome, CoreError> {
        let lab_id = match self.repository.resolve_id(id) {
            Ok(lab_id) => lab_id,
            Err(StoreError::LabNotFound(_)) if options.force => {
                return self.remove_leftovers(&LabId::new(id));
            }
            Err(e @ StoreError::LabNotFound(_)) => {
                return Ok(DestroyOutcome::AlreadyGone {
                    lab_id: id.to_owned(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let record = match self.repository.load(&lab_id) {
            Ok(record) => record,
            Err(StoreError::CorruptRecord { .. }) if options.force => {
                self.teardown_leftover(&lab_id, options.volumes);
                return self.remove_leftovers(&lab_id);
            }
            Err(e) => return Err(e.into()),
        };

        if record.status == LabStatus::Destroyed && !options.force {
            return Ok(DestroyOutcome::AlreadyGone {
                lab_id: lab_id.into_inner(),
                reason: format!(
                    "Lab {} is already destroyed. Use --force to clean up files.",
                    record.lab_id
                ),
            });
        }

        info!("destroying lab {lab_id}");
        let mut warnings = Vec::new();
        let manifest = self.repository.manifest_path(&lab_id);
        if manifest.is_file() {
            if let Err(e) =
                self.gateway
                    .teardown(&manifest, &lab_id.project_name(), options.volumes)
            {
                if !options.force {
                    return Err(e.into());
                }
                warn!("teardown of lab {lab_id} failed, continuing: {e}");
                warnings.push(format!("teardown failed: {e}"));
            }
        }

        if record.status != LabStatus::Destroyed {
            self.transition(&record, LabStatus::Destroyed)?;
        }
        self.repository.delete(&lab_id)?;
        info!("lab {lab_id} destroyed");
        Ok(DestroyOutcome::Destroyed { lab_id, warnings })
    }

    fn teardown_leftover(&self, lab_id: &LabId, volumes: bool) {
        let manifest = self.repository.manifest_path(lab_id);
        if manifest.is_file() {
            if let Err(e) = self
                .gateway
                .teardown(&manifest, &lab_id.project_name(), volumes)
            {
                warn!("teardown of unreadable lab {lab_id} failed: {e}");
            }
        }
    }

    fn remove_leftovers(&self, lab_id: &LabId) -> Result<DestroyOutcome, CoreError> {
        let dir = self.repository.lab_dir(lab_id);
        if !dir.exists() {
            return Ok(DestroyOutcome::AlreadyGone {
                lab_id: lab_id.to_string(),
                reason: format!("No lab found matching '{lab_id}'"),
            });
        }
        self.repository.delete(lab_id)?;
        info!("removed leftover files of lab {lab_id}");
        Ok(DestroyOutcome::RemovedLeftovers {
            lab_id: lab_id.to_string(),
        })
    }

    pub fn start(&self, id: &str) -> Result<TransitionOutcome, CoreError> {
        let record = self.load(id)?;
        if !matches!(record.status, LabStatus::Stopped | LabStatus::Error) {
            let reason = format!("Lab {} is {}, cannot start.", record.lab_id, record.status);
            return Ok(TransitionOutcome::Unchanged { record, reason });
        }
        let manifest = self.repository.manifest_path(&record.lab_id);
        self.gateway
            .resume(&manifest, &record.lab_id.project_name())?;
        let record = self.transition(&record, LabStatus::Running)?;
        info!("lab {} started", record.lab_id);
        Ok(TransitionOutcome::Changed { record })
    }

    pub fn stop(&self, id: &str) -> Result<TransitionOutcome, CoreError> {
        let record = self.load(id)?;
        if record.status != LabStatus::Running {
            let reason = format!("Lab {} is {}, cannot stop.", record.lab_id, record.status);
            return Ok(TransitionOutcome::Unchanged { record, reason });
        }
        let manifest = self.repository.manifest_path(&record.lab_id);
        self.gateway
            .pause(&manifest, &record.lab_id.project_name())?;
        let record = self.transition(&record, LabStatus::Stopped)?;
        info!("lab {} stopped", record.lab_id);
        Ok(TransitionOutcome::Changed { record })
    }

    /// Persisted record plus, for running labs, the live container listing.
    /// A failed live query is reported as a warning.
    pub fn status(&self, id: &str) -> Result<LabReport, CoreError> {
        let record = self.load(id)?;
        let mut warnings = Vec::new();
        let live = if record.status == LabStatus::Running {
            let manifest = self.repository.manifest_path(&record.lab_id);
            match self
                .gateway
                .process_list(&manifest, &record.lab_id.project_name())
            {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!("could not query containers of lab {}: {e}", record.lab_id);
                    warnings.push(format!("Could not retrieve container status: {e}"));
                    None
                }
            }
        } else {
            None
        };
        Ok(LabReport {
            services: service_addresses(&record),
            record,
            live,
            warnings,
        })
    }

    /// Access details for every service. Reads only the persisted record.
    pub fn info(&self, id: &str) -> Result<LabReport, CoreError> {
        let record = self.load(id)?;
        Ok(LabReport {
            services: service_addresses(&record),
            record,
            live: None,
            warnings: Vec::new(),
        })
    }

    pub fn list(&self) -> Result<Vec<LabRecord>, CoreError> {
        Ok(self.repository.list_all()?)
    }

    /// Stream logs. Interrupting a followed stream is a normal exit.
    pub fn logs(&self, id: &str, follow: bool, service: Option<&str>) -> Result<(), CoreError> {
        let record = self.load(id)?;
        let manifest = self.repository.manifest_path(&record.lab_id);
        match self.gateway.stream_logs(
            &manifest,
            &record.lab_id.project_name(),
            follow,
            service,
        ) {
            Ok(()) => Ok(()),
            Err(e) if follow && shutdown_requested() => {
                debug!("log stream interrupted: {e}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Attach an interactive `command` inside `service`.
    pub fn shell(&self, id: &str, service: &str, command: &str) -> Result<(), CoreError> {
        let record = self.load(id)?;
        let manifest = self.repository.manifest_path(&record.lab_id);
        self.gateway.exec_in_service(
            &manifest,
            &record.lab_id.project_name(),
            service,
            &[command.to_owned()],
            true,
        )?;
        Ok(())
    }

    pub fn templates(&self) -> Vec<TemplateSummary> {
        list_templates(&self.config.templates_dir)
    }
}

fn service_addresses(record: &LabRecord) -> Vec<ServiceAddress> {
    record
        .services
        .iter()
        .map(|svc| ServiceAddress {
            name: svc.name.clone(),
            image: svc.image.clone(),
            platform: svc.platform.clone(),
            address: compute_address(record.subnet, svc.ip_offset)
                .ok()
                .map(|ip| ip.to_string()),
            ports: svc.ports.clone(),
            access: svc.access.clone(),
        })
        .collect()
}
