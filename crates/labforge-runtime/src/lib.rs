//! Container runtime gateways for labforge labs.
//!
//! This crate implements the execution layer behind the `RuntimeGateway`
//! trait: `ComposeGateway` drives one `docker compose` subprocess per
//! operation against a lab's generated manifest, and `MockGateway` records
//! calls in memory for tests. Prerequisite checks report a missing runtime
//! with install hints.

pub mod compose;
pub mod gateway;
pub mod mock;
pub mod prereq;

pub use compose::ComposeGateway;
pub use gateway::{select_gateway, GatewayOptions, RuntimeGateway};
pub use mock::{GatewayCall, MockGateway};
pub use prereq::{check_compose_prereqs, format_missing, MissingPrereq, DOCKER_INSTALL_HINT};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    RuntimeUnavailable(String),
    #[error("runtime '{0}' is not supported (expected 'docker' or 'mock')")]
    UnknownRuntime(String),
    #[error("command failed: {command}: {stderr}")]
    RuntimeCommandFailed { command: String, stderr: String },
}
