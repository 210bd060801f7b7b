use crate::domain::model::InstallStep;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which part of the container runtime could not be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCapability {
    /// The runtime executable itself (`docker --version`).
    Runtime,
    /// The compose-style orchestration subcommand (`docker compose version`).
    Orchestrator,
}

impl fmt::Display for RuntimeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeCapability::Runtime => write!(f, "container runtime"),
            RuntimeCapability::Orchestrator => write!(f, "compose orchestration subcommand"),
        }
    }
}

/// Underlying cause of a failed artifact download.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("artifact source returned status {status}")]
    Status { status: u16 },

    #[error("artifact is {size} bytes, over the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("archive has {count} entries, over the {limit} entry limit")]
    TooManyEntries { count: usize, limit: usize },

    #[error("archive expands past the {limit} byte limit")]
    ExtractedTooLarge { limit: u64 },

    #[error("Zip operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Configuration error: {message}")]
    ConfigInvalid { message: String },

    #[error("{capability} is not installed or not accessible: {detail}")]
    RuntimeUnavailable {
        capability: RuntimeCapability,
        detail: String,
    },

    #[error("Failed to download artifact from {locator}: {source}")]
    FetchFailed {
        locator: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to start project {project}: {diagnostics}")]
    LaunchFailed { project: String, diagnostics: String },

    #[error("Service {service} failed to become healthy within {timeout_secs}s")]
    HealthCheckTimedOut { service: String, timeout_secs: u64 },

    #[error("Service {service} failed health check after {attempts} attempts")]
    HealthCheckFailed { service: String, attempts: u32 },

    #[error("Failed to query container runtime: {message}")]
    RuntimeQueryFailed { message: String },

    #[error("Failed to load workload descriptor {}: {reason}", .path.display())]
    DescriptorInvalid { path: PathBuf, reason: String },

    #[error("URI template '{template}' references unresolved parameter '{parameter}'")]
    TemplateResolutionFailed { template: String, parameter: String },

    #[error("Installation cancelled")]
    Cancelled,
}

impl InstallError {
    pub fn config(message: impl Into<String>) -> Self {
        InstallError::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn fetch(locator: impl Into<String>, source: impl Into<FetchError>) -> Self {
        InstallError::FetchFailed {
            locator: locator.into(),
            source: source.into(),
        }
    }

    /// The installation step this error terminates.
    pub fn step(&self) -> Option<InstallStep> {
        match self {
            InstallError::ConfigInvalid { .. } => Some(InstallStep::Validating),
            InstallError::RuntimeUnavailable { .. } => Some(InstallStep::CheckingRuntime),
            InstallError::FetchFailed { .. } => Some(InstallStep::Fetching),
            InstallError::LaunchFailed { .. } => Some(InstallStep::Launching),
            InstallError::HealthCheckTimedOut { .. } | InstallError::HealthCheckFailed { .. } => {
                Some(InstallStep::AwaitingHealth)
            }
            InstallError::RuntimeQueryFailed { .. } | InstallError::DescriptorInvalid { .. } => {
                Some(InstallStep::QueryingRuntimeState)
            }
            InstallError::TemplateResolutionFailed { .. } => Some(InstallStep::ResolvingEndpoint),
            InstallError::Cancelled => None,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            InstallError::ConfigInvalid { .. } => {
                "Check the service name and the services configuration file"
            }
            InstallError::RuntimeUnavailable {
                capability: RuntimeCapability::Runtime,
                ..
            } => "Install Docker and ensure it's in your PATH",
            InstallError::RuntimeUnavailable {
                capability: RuntimeCapability::Orchestrator,
                ..
            } => "Install Docker Compose V2",
            InstallError::FetchFailed { .. } => {
                "Check network connectivity and the repository URL"
            }
            InstallError::LaunchFailed { .. } => {
                "Inspect the compose file and the docker daemon logs"
            }
            InstallError::HealthCheckTimedOut { .. } => "Increase wait_timeout or check the container logs",
            InstallError::HealthCheckFailed { .. } => {
                "Check the container logs or raise health_check.retries"
            }
            InstallError::RuntimeQueryFailed { .. } => "Make sure the docker daemon is running",
            InstallError::DescriptorInvalid { .. } => "Check the compose file in the repository",
            InstallError::TemplateResolutionFailed { .. } => {
                "Add the missing parameter to env_vars or defaults"
            }
            InstallError::Cancelled => "Re-run the installation",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            InstallError::ConfigInvalid { .. } => 2,
            InstallError::RuntimeUnavailable { .. } => 3,
            InstallError::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
