//! Engine configuration: defaults, an optional TOML file, environment
//! variables and command-line overrides, applied in that order.

use crate::CoreError;
use labforge_runtime::GatewayOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_LABS_DIR: &str = "LABFORGE_LABS_DIR";
pub const ENV_TEMPLATES_DIR: &str = "LABFORGE_TEMPLATES_DIR";
pub const ENV_RUNTIME: &str = "LABFORGE_RUNTIME";

const DEFAULT_RUNTIME: &str = "docker";
const CONFIG_RELATIVE_PATH: &str = ".config/labforge/config.toml";
const DATA_RELATIVE_PATH: &str = ".local/share/labforge";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EngineConfig {
    pub labs_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub runtime: String,
    pub pull_images: bool,
    pub compose_command: Vec<String>,
}

impl EngineConfig {
    /// Built-in defaults rooted at `home` (or `./.labforge` without one).
    pub fn defaults(home: Option<&Path>) -> Self {
        let data_root = home.map_or_else(
            || PathBuf::from(".labforge"),
            |h| h.join(DATA_RELATIVE_PATH),
        );
        let gateway = GatewayOptions::default();
        Self {
            labs_dir: data_root.join("labs"),
            templates_dir: data_root.join("templates"),
            runtime: DEFAULT_RUNTIME.to_owned(),
            pull_images: gateway.pull_images,
            compose_command: gateway.compose_command,
        }
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            compose_command: self.compose_command.clone(),
            pull_images: self.pull_images,
        }
    }

    fn merge_file(&mut self, file: ConfigFile, home: Option<&Path>) {
        if let Some(dir) = file.labs_dir {
            self.labs_dir = expand_tilde(&dir, home);
        }
        if let Some(dir) = file.templates_dir {
            self.templates_dir = expand_tilde(&dir, home);
        }
        if let Some(runtime) = file.runtime {
            self.runtime = runtime;
        }
        if let Some(pull) = file.pull_images {
            self.pull_images = pull;
        }
        if let Some(command) = file.compose_command {
            self.compose_command = command;
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub labs_dir: Option<String>,
    pub templates_dir: Option<String>,
    pub runtime: Option<String>,
    pub pull_images: Option<bool>,
    pub compose_command: Option<Vec<String>>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config file. Unlike the default location it must exist.
    pub config_path: Option<PathBuf>,
    pub labs_dir: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
    pub runtime: Option<String>,
}

/// Resolve the effective configuration. `env` stands in for the process
/// environment.
pub fn load_config(
    overrides: &ConfigOverrides,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<EngineConfig, CoreError> {
    let home = env("HOME").filter(|h| !h.is_empty()).map(PathBuf::from);
    let home = home.as_deref();
    let mut config = EngineConfig::defaults(home);

    match &overrides.config_path {
        Some(path) => config.merge_file(ConfigFile::load(path)?, home),
        None => {
            if let Some(path) = home.map(|h| h.join(CONFIG_RELATIVE_PATH)) {
                if path.is_file() {
                    config.merge_file(ConfigFile::load(&path)?, home);
                }
            }
        }
    }

    if let Some(dir) = env(ENV_LABS_DIR).filter(|v| !v.is_empty()) {
        config.labs_dir = expand_tilde(&dir, home);
    }
    if let Some(dir) = env(ENV_TEMPLATES_DIR).filter(|v| !v.is_empty()) {
        config.templates_dir = expand_tilde(&dir, home);
    }
    if let Some(runtime) = env(ENV_RUNTIME).filter(|v| !v.is_empty()) {
        config.runtime = runtime;
    }

    if let Some(dir) = &overrides.labs_dir {
        config.labs_dir = expand_tilde(&dir.to_string_lossy(), home);
    }
    if let Some(dir) = &overrides.templates_dir {
        config.templates_dir = expand_tilde(&dir.to_string_lossy(), home);
    }
    if let Some(runtime) = &overrides.runtime {
        config.runtime.clone_from(runtime);
    }

    Ok(config)
}

pub fn expand_tilde(path: &str, home: Option<&Path>) -> PathBuf {
    if let (Some(stripped), Some(home)) = (path.strip_prefix("~/"), home) {
        return home.join(stripped);
    }
    PathBuf::from(path)
}
