use crate::template::TemplateError;
use std::fs;
use std::path::Path;

/// Starter template text for `labforge init`.
pub fn scaffold_template(name: &str) -> String {
    format!(
        r#"name: {name}
description: Custom lab - edit this description
version: "1.0"
author: labforge
settings:
  lab_password: labforge123!
network:
  subnet: auto
services:
  - name: example-service
    image: ubuntu:latest
    hostname: example
    ip_offset: 10
    platform: linux
    ports:
      - "8080:80"
    environment:
      EXAMPLE_VAR: value
    access:
      - label: Web UI
        url: http://localhost:8080
volumes: {{}}
"#
    )
}

/// Write a starter template to `path`, refusing to overwrite. Returns the
/// lab name used in the scaffold (the file stem).
pub fn write_scaffold(path: &Path) -> Result<String, TemplateError> {
    if path.exists() {
        return Err(TemplateError::AlreadyExists(path.display().to_string()));
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "custom-lab".to_owned());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, scaffold_template(&name))?;
    Ok(name)
}
