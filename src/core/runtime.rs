use crate::domain::model::{ContainerNaming, DeclaredConfig};
use crate::domain::ports::ContainerRuntime;
use crate::utils::error::{InstallError, Result, RuntimeCapability};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

pub const DEFAULT_BINARY: &str = "docker";

/// [`ContainerRuntime`] backed by the `docker` CLI and its `compose` plugin.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
    naming: ContainerNaming,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new(ContainerNaming::default())
    }
}

impl DockerRuntime {
    pub fn new(naming: ContainerNaming) -> Self {
        Self::with_binary(DEFAULT_BINARY, naming)
    }

    pub fn with_binary(binary: impl Into<String>, naming: ContainerNaming) -> Self {
        Self {
            binary: binary.into(),
            naming,
        }
    }

    async fn run<I, S>(&self, args: I) -> io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(&self.binary).args(args).output().await
    }

    async fn require(&self, args: &[&str], capability: RuntimeCapability) -> Result<()> {
        let detail = match self.run(args).await {
            Ok(output) if output.status.success() => {
                tracing::info!("{} check passed", capability);
                return Ok(());
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                tracing::error!(
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    stderr = %stderr,
                    "{} check failed",
                    capability
                );
                if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "{} check failed", capability);
                e.to_string()
            }
        };

        Err(InstallError::RuntimeUnavailable { capability, detail })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn check_available(&self) -> Result<()> {
        self.require(&["--version"], RuntimeCapability::Runtime).await?;
        self.require(&["compose", "version"], RuntimeCapability::Orchestrator)
            .await
    }

    async fn launch(&self, descriptor_path: &Path, project_id: &str) -> Result<()> {
        tracing::info!(project = project_id, "Starting service with docker compose");

        let output = Command::new(&self.binary)
            .arg("compose")
            .arg("-f")
            .arg(descriptor_path)
            .args(["-p", project_id, "up", "-d"])
            .output()
            .await
            .map_err(|e| InstallError::LaunchFailed {
                project: project_id.to_string(),
                diagnostics: e.to_string(),
            })?;

        if !output.status.success() {
            let diagnostics = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::error!(project = project_id, stderr = %diagnostics, "Failed to run docker compose");
            return Err(InstallError::LaunchFailed {
                project: project_id.to_string(),
                diagnostics,
            });
        }

        tracing::info!(project = project_id, "Docker compose started successfully");
        Ok(())
    }

    async fn query_port_binding(
        &self,
        project_id: &str,
        service_id: &str,
        port_key: &str,
    ) -> Result<String> {
        let filter = format!("name={}", self.naming.filter(project_id, service_id));
        let output = self
            .run(["ps", "--filter", filter.as_str(), "--format", "{{.Ports}}"])
            .await
            .map_err(|e| InstallError::RuntimeQueryFailed {
                message: format!("failed to get ports: {}", e),
            })?;

        if !output.status.success() {
            return Err(InstallError::RuntimeQueryFailed {
                message: format!(
                    "failed to get ports: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let ports = String::from_utf8_lossy(&output.stdout);
        let binding = select_port_binding(&ports, port_key);
        tracing::debug!(ports = %ports.trim(), binding = %binding, "Resolved port binding");
        Ok(binding)
    }

    async fn read_declared_config(&self, descriptor_path: &Path) -> Result<DeclaredConfig> {
        let invalid = |reason: String| InstallError::DescriptorInvalid {
            path: descriptor_path.to_path_buf(),
            reason,
        };

        let content = tokio::fs::read_to_string(descriptor_path)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))
    }

    async fn exec_probe(&self, container_name: &str, command: &str) -> bool {
        match self.run(["exec", container_name, "sh", "-c", command]).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::debug!(container = container_name, error = %e, "Probe invocation failed");
                false
            }
        }
    }
}

/// Host side of the first `docker ps` port mapping that mentions `port_key`,
/// or `0.0.0.0:<port_key>` when none does.
pub fn select_port_binding(ports: &str, port_key: &str) -> String {
    ports
        .split([',', '\n'])
        .map(str::trim)
        .find(|mapping| mapping.contains(port_key))
        .and_then(|mapping| mapping.split("->").next())
        .map(|host| host.trim().to_string())
        .unwrap_or_else(|| format!("0.0.0.0:{}", port_key))
}
