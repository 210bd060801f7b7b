use crate::config::AppConfig;
use crate::core::endpoint;
use crate::core::health::HealthMonitor;
use crate::domain::model::{EndpointDescriptor, InstallEvent, InstallStep, InstallationSession};
use crate::domain::ports::{ArtifactSource, ContainerRuntime, InstallObserver};
use crate::utils::error::{InstallError, Result, RuntimeCapability};
use crate::utils::observer::TracingObserver;
use crate::utils::validation::Validate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs the installation pipeline for services of one [`AppConfig`].
///
/// Installs of the same service are not serialized here: two concurrent
/// calls race on the destination directory and the compose project.
pub struct Installer<A: ArtifactSource, R: ContainerRuntime> {
    config: AppConfig,
    fetcher: A,
    runtime: R,
    observer: Arc<dyn InstallObserver>,
}

impl<A: ArtifactSource, R: ContainerRuntime> Installer<A, R> {
    pub fn new(config: AppConfig, fetcher: A, runtime: R) -> Self {
        Self {
            config,
            fetcher,
            runtime,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn InstallObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub async fn install(&self, service: &str) -> Result<EndpointDescriptor> {
        self.install_with_cancel(service, &CancellationToken::new())
            .await
    }

    /// Same as [`install`](Self::install), aborting the download or the
    /// health wait once `cancel` fires.
    pub async fn install_with_cancel(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<EndpointDescriptor> {
        self.observer.on_step(&InstallEvent::Started { service });

        match self.run(service, cancel).await {
            Ok(endpoint) => {
                self.observer.on_step(&InstallEvent::Completed {
                    service,
                    endpoint: &endpoint,
                });
                Ok(endpoint)
            }
            Err(error) => {
                match error.step() {
                    Some(step) => {
                        tracing::error!(service, step = %step, error = %error, "Installation failed");
                        self.observer
                            .on_step(&InstallEvent::StepFailed { step, error: &error });
                    }
                    None => tracing::error!(service, error = %error, "Installation failed"),
                }
                Err(error)
            }
        }
    }

    fn enter(&self, step: InstallStep, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        self.observer.on_step(&InstallEvent::StepStarted(step));
        Ok(())
    }

    async fn run(&self, service: &str, cancel: &CancellationToken) -> Result<EndpointDescriptor> {
        self.enter(InstallStep::Validating, cancel)?;
        let definition = self.config.service(service)?;
        definition.validate()?;
        let session =
            InstallationSession::new(service, &self.config.base_dir, &definition.compose_file);
        tracing::debug!(
            project = %session.project_id,
            destination = %session.destination.display(),
            "Installation session created"
        );

        self.enter(InstallStep::CheckingRuntime, cancel)?;
        self.runtime.check_available().await?;
        self.observer
            .on_step(&InstallEvent::RuntimeAvailable(RuntimeCapability::Runtime));
        self.observer
            .on_step(&InstallEvent::RuntimeAvailable(RuntimeCapability::Orchestrator));

        self.enter(InstallStep::Fetching, cancel)?;
        self.fetcher
            .fetch(
                &definition.repo_url,
                &definition.branch,
                &session.destination,
                cancel,
            )
            .await?;

        self.enter(InstallStep::Launching, cancel)?;
        self.runtime
            .launch(&session.descriptor_path, &session.project_id)
            .await?;

        match definition.health_policy(self.config.wait_timeout) {
            Some(policy) => {
                self.enter(InstallStep::AwaitingHealth, cancel)?;
                HealthMonitor::new(
                    &self.runtime,
                    self.observer.as_ref(),
                    self.config.container_naming(),
                )
                .await_healthy(&session.project_id, &definition.service_name, &policy, cancel)
                .await?;
            }
            None => tracing::debug!(service, "No health check configured, assuming healthy"),
        }

        self.enter(InstallStep::QueryingRuntimeState, cancel)?;
        let binding = self
            .runtime
            .query_port_binding(
                &session.project_id,
                &definition.service_name,
                &definition.port_key,
            )
            .await?;
        let declared = self
            .runtime
            .read_declared_config(&session.descriptor_path)
            .await?;

        self.enter(InstallStep::ResolvingEndpoint, cancel)?;
        let endpoint = endpoint::resolve(definition, &binding, &declared)?;

        tracing::info!(
            service,
            uri_host = %endpoint.host,
            port = %endpoint.port,
            elapsed_ms = session.elapsed().num_milliseconds(),
            "Endpoint resolved"
        );
        Ok(endpoint)
    }
}
