use labforge_schema::{AccessEntry, LabId, LabTemplate, ServiceSpec, Subnet, DEFAULT_PLATFORM};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LabStatus {
    Building,
    Running,
    Stopped,
    Error,
    Destroyed,
}

impl std::fmt::Display for LabStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabStatus::Building => write!(f, "building"),
            LabStatus::Running => write!(f, "running"),
            LabStatus::Stopped => write!(f, "stopped"),
            LabStatus::Error => write!(f, "error"),
            LabStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// The per-service slice of a template kept in the lab record, enough to
/// render addresses and access info without re-reading the template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSummary {
    pub name: String,
    pub image: String,
    pub ip_offset: u32,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub access: Vec<AccessEntry>,
}

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_owned()
}

impl From<&ServiceSpec> for ServiceSummary {
    fn from(spec: &ServiceSpec) -> Self {
        Self {
            name: spec.name.clone(),
            image: spec.image.clone(),
            ip_offset: spec.ip_offset,
            platform: spec.platform().to_owned(),
            ports: spec.ports.clone(),
            access: spec.access.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabRecord {
    pub lab_id: LabId,
    /// Template identifier as given on the command line.
    pub template: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: LabStatus,
    pub subnet: Subnet,
    #[serde(default)]
    pub services: Vec<ServiceSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl LabRecord {
    /// A fresh record in `building`, timestamped now.
    pub fn new(lab_id: LabId, template_ident: &str, template: &LabTemplate, subnet: Subnet) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            lab_id,
            template: template_ident.to_owned(),
            name: template.name.clone(),
            description: template.description.clone(),
            status: LabStatus::Building,
            subnet,
            services: template.services.iter().map(ServiceSummary::from).collect(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
