use crate::domain::model::{ContainerNaming, HealthCheckPolicy, InstallEvent};
use crate::domain::ports::{ContainerRuntime, InstallObserver};
use crate::utils::error::{InstallError, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Polls a readiness probe inside the launched workload.
pub struct HealthMonitor<'a> {
    runtime: &'a dyn ContainerRuntime,
    observer: &'a dyn InstallObserver,
    naming: ContainerNaming,
}

impl<'a> HealthMonitor<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        observer: &'a dyn InstallObserver,
        naming: ContainerNaming,
    ) -> Self {
        Self {
            runtime,
            observer,
            naming,
        }
    }

    /// Probe until healthy. Polling stops at whichever comes first:
    /// `policy.max_attempts` failed probes or `policy.timeout` elapsed.
    pub async fn await_healthy(
        &self,
        project_id: &str,
        service_id: &str,
        policy: &HealthCheckPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let container = self.naming.container_name(project_id, service_id);
        let start = Instant::now();
        let mut attempt = 0;

        tracing::info!(service = service_id, container = %container, "Waiting for service to be healthy");

        while attempt < policy.max_attempts {
            if start.elapsed() >= policy.timeout {
                tracing::error!(service = service_id, "Health check timed out");
                return Err(InstallError::HealthCheckTimedOut {
                    service: service_id.to_string(),
                    timeout_secs: policy.timeout.as_secs(),
                });
            }

            if self.runtime.exec_probe(&container, &policy.command).await {
                tracing::info!(service = service_id, "Service is healthy");
                self.observer.on_step(&InstallEvent::Healthy {
                    service: service_id,
                });
                return Ok(());
            }

            attempt += 1;
            tracing::debug!(service = service_id, attempt, "Health check attempt failed");
            self.observer.on_step(&InstallEvent::ProbeFailed {
                service: service_id,
                attempt,
                max_attempts: policy.max_attempts,
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(InstallError::Cancelled),
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }

        tracing::error!(service = service_id, "Health check failed after max retries");
        Err(InstallError::HealthCheckFailed {
            service: service_id.to_string(),
            attempts: policy.max_attempts,
        })
    }
}
