pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::config::{AppConfig, HealthCheckSpec, ServiceDefinition};
pub use crate::core::{
    fetcher::ArchiveFetcher, health::HealthMonitor, installer::Installer, runtime::DockerRuntime,
};
pub use crate::domain::model::{EndpointDescriptor, InstallEvent, InstallStep};
pub use crate::utils::error::{InstallError, Result};
