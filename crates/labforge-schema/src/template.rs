use crate::interpolate::{interpolate_value, scalar_to_string};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Platform recorded for services that do not declare one.
pub const DEFAULT_PLATFORM: &str = "linux";

/// Platforms that run a guest OS under nested virtualization (KVM inside the
/// container). They get a device grant, `NET_ADMIN` and a long stop grace period.
pub const VIRTUALIZED_PLATFORMS: &[&str] = &["windows-docker", "macos-docker"];

/// `network.subnet` value that asks for automatic allocation.
pub const AUTO_SUBNET: &str = "auto";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse template: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("template '{0}' not found. Run 'labforge templates' to see available templates.")]
    TemplateNotFound(String),
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
    #[error("invalid override '{0}' (expected KEY=VAL)")]
    InvalidOverride(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
}

/// A template as read from disk, before typing.
///
/// Overrides, validation and interpolation all operate on this raw form so
/// that every string in the document (including pass-through blocks such as
/// `healthcheck`) is reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDocument {
    root: Mapping,
}

impl TemplateDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        parse_template_file(path)
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    /// Merge `KEY=VAL` style overrides into the `settings` block.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) {
        if overrides.is_empty() {
            return;
        }
        let key = Value::String("settings".to_owned());
        if !matches!(self.root.get(&key), Some(Value::Mapping(_))) {
            self.root.insert(key.clone(), Value::Mapping(Mapping::new()));
        }
        if let Some(Value::Mapping(settings)) = self.root.get_mut(&key) {
            for (k, v) in overrides {
                settings.insert(Value::String(k.clone()), Value::String(v.clone()));
            }
        }
    }

    /// Structural validation: required keys only. Duplicate service names and
    /// offsets are accepted.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if !self.root.contains_key("name") {
            return Err(TemplateError::InvalidTemplate(
                "config missing required field: 'name'".to_owned(),
            ));
        }

        let services = match self.root.get("services") {
            None | Some(Value::Null) => None,
            Some(Value::Sequence(seq)) if seq.is_empty() => None,
            Some(Value::Sequence(seq)) => Some(seq),
            Some(_) => {
                return Err(TemplateError::InvalidTemplate(
                    "'services' must be a list".to_owned(),
                ))
            }
        };
        let Some(services) = services else {
            return Err(TemplateError::InvalidTemplate(
                "config must define at least one service".to_owned(),
            ));
        };

        for (i, svc) in services.iter().enumerate() {
            let Value::Mapping(svc) = svc else {
                return Err(TemplateError::InvalidTemplate(format!(
                    "service {i} must be a mapping"
                )));
            };
            let Some(name) = svc.get("name") else {
                return Err(TemplateError::InvalidTemplate(format!(
                    "service {i} missing required field: 'name'"
                )));
            };
            let label = scalar_to_string(name).unwrap_or_else(|| i.to_string());
            for field in ["image", "ip_offset"] {
                if !svc.contains_key(field) {
                    return Err(TemplateError::InvalidTemplate(format!(
                        "service '{label}' missing required field: '{field}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Scalar view of the `settings` block.
    pub fn settings(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(Value::Mapping(settings)) = self.root.get("settings") {
            for (k, v) in settings {
                if let (Some(k), Some(v)) = (scalar_to_string(k), scalar_to_string(v)) {
                    out.insert(k, v);
                }
            }
        }
        out
    }

    /// Substitute `${name}` placeholders: `settings` first, then `env`.
    pub fn interpolate<F>(&self, env: F) -> TemplateDocument
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = self.settings();
        let lookup = |key: &str| settings.get(key).cloned().or_else(|| env(key));
        match interpolate_value(Value::Mapping(self.root.clone()), &lookup) {
            Value::Mapping(root) => TemplateDocument { root },
            _ => self.clone(),
        }
    }

    /// Interpolate against the process environment.
    pub fn interpolate_from_env(&self) -> TemplateDocument {
        self.interpolate(|key| std::env::var(key).ok())
    }

    /// Convert into the typed schema. Call after [`validate`](Self::validate).
    pub fn into_template(self) -> Result<LabTemplate, TemplateError> {
        serde_yaml::from_value(Value::Mapping(self.root))
            .map_err(|e| TemplateError::InvalidTemplate(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LabTemplate {
    #[serde(deserialize_with = "required_scalar")]
    pub name: String,
    #[serde(default, deserialize_with = "scalar_or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "scalar_map")]
    pub settings: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub network: NetworkSection,
    pub services: Vec<ServiceSpec>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volumes: Mapping,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    #[serde(default = "default_subnet_hint")]
    pub subnet: String,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            subnet: default_subnet_hint(),
        }
    }
}

impl NetworkSection {
    /// `None` for automatic allocation, otherwise the requested CIDR text.
    pub fn explicit_subnet(&self) -> Option<&str> {
        let hint = self.subnet.trim();
        if hint.is_empty() || hint.eq_ignore_ascii_case(AUTO_SUBNET) {
            None
        } else {
            Some(hint)
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceSpec {
    #[serde(deserialize_with = "required_scalar")]
    pub name: String,
    #[serde(deserialize_with = "required_scalar")]
    pub image: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub hostname: Option<String>,
    pub ip_offset: u32,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "scalar_list")]
    pub ports: Vec<String>,
    #[serde(default)]
    pub environment: Option<Value>,
    #[serde(default)]
    pub volumes: Option<Value>,
    #[serde(default)]
    pub healthcheck: Option<Value>,
    #[serde(default)]
    pub depends_on: Option<Value>,
    #[serde(default)]
    pub command: Option<Value>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub restart: Option<String>,
    #[serde(default)]
    pub privileged: Option<bool>,
    #[serde(default, deserialize_with = "scalar_list")]
    pub cap_add: Vec<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub resources: Option<ResourceLimits>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub access: Vec<AccessEntry>,
    #[serde(default, deserialize_with = "scalar_list")]
    pub post_start: Vec<String>,
}

impl ServiceSpec {
    pub fn platform(&self) -> &str {
        self.platform.as_deref().unwrap_or(DEFAULT_PLATFORM)
    }

    pub fn is_virtualized(&self) -> bool {
        VIRTUALIZED_PLATFORMS.contains(&self.platform())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResourceLimits {
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub memory: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub cpus: Option<String>,
}

/// Descriptive connection info shown by `info`. Never enforced.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccessEntry {
    #[serde(default, deserialize_with = "scalar_or_default")]
    pub label: String,
    #[serde(default, deserialize_with = "scalar_or_default")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<String>,
}

fn default_subnet_hint() -> String {
    AUTO_SUBNET.to_owned()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_to_string(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a scalar value")),
    }
}

fn required_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional_scalar(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("expected a non-null scalar value"))
}

fn scalar_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_scalar(deserializer)?.unwrap_or_default())
}

fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    items
        .iter()
        .map(|v| {
            scalar_to_string(v).ok_or_else(|| serde::de::Error::custom("expected a list of scalars"))
        })
        .collect()
}

fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = Option::<Mapping>::deserialize(deserializer)?.unwrap_or_default();
    let mut out = BTreeMap::new();
    for (k, v) in &map {
        let key =
            scalar_to_string(k).ok_or_else(|| serde::de::Error::custom("setting keys must be scalars"))?;
        out.insert(key, scalar_to_string(v).unwrap_or_default());
    }
    Ok(out)
}

pub fn parse_template_str(input: &str) -> Result<TemplateDocument, TemplateError> {
    match serde_yaml::from_str::<Value>(input)? {
        Value::Mapping(root) => Ok(TemplateDocument { root }),
        _ => Err(TemplateError::InvalidTemplate(
            "template document must be a mapping".to_owned(),
        )),
    }
}

pub fn parse_template_file(path: impl AsRef<Path>) -> Result<TemplateDocument, TemplateError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_template_str(&content).map_err(|e| match e {
        TemplateError::InvalidTemplate(msg) => {
            TemplateError::InvalidTemplate(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name: malware-lab
description: Detonation sandbox
version: 1.0
author: labforge
settings:
  lab_password: "hunter2"
  port: 8080
network:
  subnet: auto
services:
  - name: victim
    image: ubuntu:22.04
    hostname: victim
    ip_offset: 10
    ports: ["${port}:80", 2222]
    environment:
      PASSWORD: ${lab_password}
    healthcheck:
      test: ["CMD", "true"]
      interval: 10s
    access:
      - label: SSH
        url: ssh://victim
        credentials:
          username: root
          password: ${lab_password}
    post_start:
      - echo ready
  - name: win
    image: dockurr/windows
    ip_offset: 20
    platform: windows-docker
    cap_add: [SYS_ADMIN]
    resources:
      memory: 4G
      cpus: 2
volumes:
  shared:
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parses_validates_and_types_full_template() {
        let doc = parse_template_str(FULL).unwrap();
        doc.validate().unwrap();
        let tmpl = doc.interpolate(no_env).into_template().unwrap();

        assert_eq!(tmpl.name, "malware-lab");
        assert_eq!(tmpl.version.as_deref(), Some("1.0"));
        assert_eq!(tmpl.settings.get("port").map(String::as_str), Some("8080"));
        assert!(tmpl.network.explicit_subnet().is_none());
        assert_eq!(tmpl.services.len(), 2);

        let victim = &tmpl.services[0];
        assert_eq!(victim.ip_offset, 10);
        assert_eq!(victim.ports, vec!["8080:80".to_owned(), "2222".to_owned()]);
        assert_eq!(victim.platform(), DEFAULT_PLATFORM);
        assert!(!victim.is_virtualized());
        assert_eq!(
            victim.environment.as_ref().unwrap()["PASSWORD"],
            Value::String("hunter2".to_owned())
        );
        let creds = victim.access[0].credentials.as_ref().unwrap();
        assert_eq!(creds.password.as_deref(), Some("hunter2"));
        assert_eq!(victim.post_start, vec!["echo ready".to_owned()]);

        let win = &tmpl.services[1];
        assert!(win.is_virtualized());
        assert_eq!(win.cap_add, vec!["SYS_ADMIN".to_owned()]);
        let res = win.resources.as_ref().unwrap();
        assert_eq!(res.memory.as_deref(), Some("4G"));
        assert_eq!(res.cpus.as_deref(), Some("2"));

        assert!(tmpl.volumes.contains_key("shared"));
    }

    #[test]
    fn rejects_non_mapping_document() {
        assert!(matches!(
            parse_template_str("- just\n- a list\n"),
            Err(TemplateError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn validate_requires_name() {
        let doc = parse_template_str("services:\n  - {name: a, image: b, ip_offset: 1}\n").unwrap();
        let err = doc.validate().unwrap_err();
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn validate_requires_services() {
        for input in ["name: x\n", "name: x\nservices: []\n", "name: x\nservices:\n"] {
            let doc = parse_template_str(input).unwrap();
            let err = doc.validate().unwrap_err();
            assert!(
                err.to_string().contains("at least one service"),
                "unexpected error for {input:?}: {err}"
            );
        }
    }

    #[test]
    fn validate_requires_service_fields() {
        let doc = parse_template_str("name: x\nservices:\n  - image: b\n    ip_offset: 1\n").unwrap();
        assert!(doc
            .validate()
            .unwrap_err()
            .to_string()
            .contains("service 0 missing required field: 'name'"));

        let doc = parse_template_str("name: x\nservices:\n  - name: web\n    ip_offset: 1\n").unwrap();
        assert!(doc
            .validate()
            .unwrap_err()
            .to_string()
            .contains("service 'web' missing required field: 'image'"));

        let doc = parse_template_str("name: x\nservices:\n  - name: web\n    image: nginx\n").unwrap();
        assert!(doc
            .validate()
            .unwrap_err()
            .to_string()
            .contains("service 'web' missing required field: 'ip_offset'"));
    }

    #[test]
    fn validate_accepts_duplicate_names_and_offsets() {
        let doc = parse_template_str(
            "name: x\nservices:\n  - {name: a, image: b, ip_offset: 1}\n  - {name: a, image: c, ip_offset: 1}\n",
        )
        .unwrap();
        doc.validate().unwrap();
    }

    #[test]
    fn interpolation_prefers_settings_then_env() {
        let doc = parse_template_str(
            "name: x\nsettings:\n  password: x1\nservices:\n  - name: a\n    image: ${password}\n    hostname: ${HOST_FROM_ENV}\n    restart: ${nothing}\n    ip_offset: 1\n",
        )
        .unwrap();
        let env = |key: &str| (key == "HOST_FROM_ENV").then(|| "envhost".to_owned());
        let tmpl = doc.interpolate(env).into_template().unwrap();
        assert_eq!(tmpl.services[0].image, "x1");
        assert_eq!(tmpl.services[0].hostname.as_deref(), Some("envhost"));
        assert_eq!(tmpl.services[0].restart.as_deref(), Some("${nothing}"));
    }

    #[test]
    fn overrides_replace_and_create_settings() {
        let mut doc = parse_template_str(
            "name: x\nsettings:\n  password: old\nservices:\n  - {name: a, image: '${password}', ip_offset: 1}\n",
        )
        .unwrap();
        let overrides = BTreeMap::from([("password".to_owned(), "new".to_owned())]);
        doc.apply_overrides(&overrides);
        let tmpl = doc.interpolate(no_env).into_template().unwrap();
        assert_eq!(tmpl.services[0].image, "new");

        let mut bare =
            parse_template_str("name: x\nservices:\n  - {name: a, image: b, ip_offset: 1}\n").unwrap();
        bare.apply_overrides(&overrides);
        assert_eq!(bare.settings().get("password").map(String::as_str), Some("new"));
    }

    #[test]
    fn negative_offset_is_rejected_when_typing() {
        let doc = parse_template_str("name: x\nservices:\n  - {name: a, image: b, ip_offset: -1}\n").unwrap();
        doc.validate().unwrap();
        assert!(matches!(
            doc.into_template(),
            Err(TemplateError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn explicit_subnet_hint() {
        let doc = parse_template_str(
            "name: x\nnetwork:\n  subnet: 172.30.7.0/24\nservices:\n  - {name: a, image: b, ip_offset: 1}\n",
        )
        .unwrap();
        let tmpl = doc.into_template().unwrap();
        assert_eq!(tmpl.network.explicit_subnet(), Some("172.30.7.0/24"));
    }

    #[test]
    fn parse_file_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            parse_template_file(dir.path().join("missing.yml")),
            Err(TemplateError::Io(_))
        ));
    }
}
