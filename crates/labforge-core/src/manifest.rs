//! Translation of a typed lab template into a docker-compose document.

use crate::network::{compute_address, gateway_address, NetworkError};
use crate::CoreError;
use labforge_schema::{LabId, LabTemplate, ResourceLimits, ServiceSpec, Subnet};
use labforge_store::MANIFEST_FILE;
use serde::{Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const COMPOSE_VERSION: &str = "3.8";
const KVM_DEVICE: &str = "/dev/kvm";
const VIRTUALIZED_CAPABILITY: &str = "NET_ADMIN";
const VIRTUALIZED_STOP_GRACE: &str = "120s";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComposeManifest {
    pub version: String,
    #[serde(serialize_with = "ordered_map")]
    pub services: Vec<(String, ComposeService)>,
    pub networks: BTreeMap<String, ComposeNetwork>,
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub volumes: Mapping,
}

impl ComposeManifest {
    pub fn service(&self, name: &str) -> Option<&ComposeService> {
        self.services
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, svc)| svc)
    }

    pub fn to_yaml(&self) -> Result<String, CoreError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ComposeService {
    pub image: String,
    pub container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networks: Option<BTreeMap<String, NetworkAttachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_grace_period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployConfig>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NetworkAttachment {
    pub ipv4_address: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComposeNetwork {
    pub driver: String,
    pub ipam: IpamConfig,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IpamConfig {
    pub config: Vec<IpamPool>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IpamPool {
    pub subnet: String,
    pub gateway: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeployConfig {
    pub resources: DeployResources,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeployResources {
    pub limits: ResourceLimits,
}

fn ordered_map<S>(entries: &[(String, ComposeService)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
}

fn compose_service(
    spec: &ServiceSpec,
    subnet: Subnet,
    lab_id: &LabId,
) -> Result<ComposeService, NetworkError> {
    let network_name = lab_id.network_name();
    let mut svc = ComposeService {
        image: spec.image.clone(),
        container_name: format!("{lab_id}-{}", spec.name),
        hostname: spec.hostname.clone(),
        ports: spec.ports.clone(),
        environment: spec.environment.clone(),
        volumes: spec.volumes.clone(),
        healthcheck: spec.healthcheck.clone(),
        depends_on: spec.depends_on.clone(),
        command: spec.command.clone(),
        restart: spec.restart.clone(),
        privileged: spec.privileged,
        ..ComposeService::default()
    };

    if let Some(mode) = &spec.network_mode {
        svc.network_mode = Some(mode.clone());
    } else {
        let address = compute_address(subnet, spec.ip_offset)?;
        svc.networks = Some(BTreeMap::from([(
            network_name,
            NetworkAttachment {
                ipv4_address: address.to_string(),
            },
        )]));
    }

    if spec.is_virtualized() {
        svc.devices = vec![KVM_DEVICE.to_owned()];
        svc.cap_add = vec![VIRTUALIZED_CAPABILITY.to_owned()];
        svc.stop_grace_period = Some(VIRTUALIZED_STOP_GRACE.to_owned());
    } else {
        svc.cap_add.clone_from(&spec.cap_add);
    }

    if let Some(limits) = &spec.resources {
        svc.deploy = Some(DeployConfig {
            resources: DeployResources {
                limits: limits.clone(),
            },
        });
    }

    Ok(svc)
}

/// Build the compose document for a lab. Services keep template order.
pub fn generate(
    template: &LabTemplate,
    subnet: Subnet,
    lab_id: &LabId,
) -> Result<ComposeManifest, NetworkError> {
    let services = template
        .services
        .iter()
        .map(|spec| compose_service(spec, subnet, lab_id).map(|svc| (spec.name.clone(), svc)))
        .collect::<Result<Vec<_>, NetworkError>>()?;

    let networks = BTreeMap::from([(
        lab_id.network_name(),
        ComposeNetwork {
            driver: "bridge".to_owned(),
            ipam: IpamConfig {
                config: vec![IpamPool {
                    subnet: subnet.to_string(),
                    gateway: gateway_address(subnet).to_string(),
                }],
            },
        },
    )]);

    Ok(ComposeManifest {
        version: COMPOSE_VERSION.to_owned(),
        services,
        networks,
        volumes: template.volumes.clone(),
    })
}

/// Atomically write `docker-compose.yml` into `dir`, creating `dir` if
/// needed. Returns the manifest path.
pub fn write(manifest: &ComposeManifest, dir: &Path) -> Result<PathBuf, CoreError> {
    fs::create_dir_all(dir)?;
    let dest = dir.join(MANIFEST_FILE);
    let content = manifest.to_yaml()?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(&dest).map_err(|e| CoreError::Io(e.error))?;
    Ok(dest)
}
