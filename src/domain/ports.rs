use crate::domain::model::{DeclaredConfig, InstallEvent};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Source of a service's deployment artifact.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Replace `destination` with the flattened source tree behind `locator`.
    async fn fetch(
        &self,
        locator: &str,
        branch: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Command/query interface of the container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn check_available(&self) -> Result<()>;

    async fn launch(&self, descriptor_path: &Path, project_id: &str) -> Result<()>;

    /// Host side of the published port matching `port_key`, or
    /// `0.0.0.0:<port_key>` when nothing matches.
    async fn query_port_binding(
        &self,
        project_id: &str,
        service_id: &str,
        port_key: &str,
    ) -> Result<String>;

    async fn read_declared_config(&self, descriptor_path: &Path) -> Result<DeclaredConfig>;

    /// Never fails: any invocation error counts as an unhealthy probe.
    async fn exec_probe(&self, container_name: &str, command: &str) -> bool;
}

/// Receives progress of an installation.
pub trait InstallObserver: Send + Sync {
    fn on_step(&self, event: &InstallEvent<'_>);
}
