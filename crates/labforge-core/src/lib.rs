//! Lab orchestration engine for labforge.
//!
//! This crate ties together template parsing, subnet allocation, compose
//! manifest generation, the lab state store and a runtime gateway into the
//! `Engine`, the central API for building, starting, stopping, destroying
//! and inspecting labs. It also provides the lifecycle state machine, the
//! layered engine configuration and Ctrl-C handling.

pub mod config;
pub mod engine;
pub mod id;
pub mod interrupt;
pub mod lifecycle;
pub mod manifest;
pub mod network;

pub use config::{load_config, ConfigFile, ConfigOverrides, EngineConfig};
pub use engine::{
    BuildReport, BuildRequest, DestroyOptions, DestroyOutcome, Engine, LabReport,
    ServiceAddress, TransitionOutcome,
};
pub use id::generate_lab_id;
pub use interrupt::{install_signal_handler, shutdown_requested};
pub use lifecycle::validate_transition;
pub use manifest::{generate as generate_manifest, ComposeManifest, ComposeService};
pub use network::{allocate, allocate_with_hint, compute_address, NetworkError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Template(#[from] labforge_schema::TemplateError),
    #[error(transparent)]
    Store(#[from] labforge_store::StoreError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Runtime(#[from] labforge_runtime::RuntimeError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// Coarse error taxonomy shown to users and used for scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    State,
    NetworkAllocation,
    Runtime,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::State => write!(f, "state"),
            ErrorKind::NetworkAllocation => write!(f, "network allocation"),
            ErrorKind::Runtime => write!(f, "runtime"),
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Template(_) | CoreError::Config(_) => ErrorKind::Configuration,
            CoreError::Store(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::Io(_)
            | CoreError::Serialization(_) => ErrorKind::State,
            CoreError::Network(_) => ErrorKind::NetworkAllocation,
            CoreError::Runtime(_) => ErrorKind::Runtime,
        }
    }
}
