use crate::domain::model::InstallEvent;
use crate::domain::ports::InstallObserver;
use crate::utils::error::RuntimeCapability;
use chrono::Local;

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl InstallObserver for NoopObserver {
    fn on_step(&self, _event: &InstallEvent<'_>) {}
}

/// Records every event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl InstallObserver for TracingObserver {
    fn on_step(&self, event: &InstallEvent<'_>) {
        match event {
            InstallEvent::Started { service } => {
                tracing::info!(service = %service, "Starting service installation")
            }
            InstallEvent::StepStarted(step) => tracing::info!(step = %step, "Entering step"),
            InstallEvent::RuntimeAvailable(capability) => {
                tracing::info!(capability = %capability, "Capability available")
            }
            InstallEvent::ProbeFailed {
                service,
                attempt,
                max_attempts,
            } => tracing::debug!(service = %service, attempt, max_attempts, "Probe failed"),
            InstallEvent::Healthy { service } => tracing::info!(service = %service, "Service is healthy"),
            // 錯誤本身由 Installer 記錄
            InstallEvent::StepFailed { step, .. } => tracing::debug!(step = %step, "Step failed"),
            InstallEvent::Completed { service, endpoint } => {
                tracing::info!(service = %service, host = %endpoint.host, port = %endpoint.port, "Service installation completed")
            }
        }
    }
}

/// Human-readable progress on stderr, so stdout carries only the result.
#[derive(Debug, Clone)]
pub struct ConsoleObserver {
    banner_width: usize,
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self { banner_width: 50 }
    }
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn banner(&self, service: &str) -> String {
        let rule = "═".repeat(self.banner_width);
        let width = self.banner_width;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S %Z");
        [
            rule.clone(),
            format!("{:^width$}", "SIN CLI"),
            rule.clone(),
            format!("{:^width$}", format!("Installing Service: {}", service.to_uppercase())),
            format!("{:^width$}", format!("Version: {}", env!("CARGO_PKG_VERSION"))),
            format!("{:^width$}", format!("Timestamp: {}", timestamp)),
            rule,
        ]
        .join("\n")
    }
}

impl InstallObserver for ConsoleObserver {
    fn on_step(&self, event: &InstallEvent<'_>) {
        match event {
            InstallEvent::Started { service } => eprintln!("{}\n", self.banner(service)),
            InstallEvent::StepStarted(step) => eprintln!("… {}", step),
            InstallEvent::RuntimeAvailable(RuntimeCapability::Runtime) => {
                eprintln!("✓ Docker is installed")
            }
            InstallEvent::RuntimeAvailable(RuntimeCapability::Orchestrator) => {
                eprintln!("✓ Docker Compose is installed")
            }
            InstallEvent::ProbeFailed {
                service,
                attempt,
                max_attempts,
            } => eprintln!(
                "⏳ Waiting for {} to be healthy... ({}/{})",
                service, attempt, max_attempts
            ),
            InstallEvent::Healthy { service } => eprintln!("✓ Service {} is healthy", service),
            InstallEvent::StepFailed { step, error } => eprintln!("❗ {} failed: {}", step, error),
            InstallEvent::Completed { service, .. } => {
                eprintln!("\n✅ {} Service Installed Successfully!", capitalize(service))
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_contains_service_and_version() {
        let banner = ConsoleObserver::new().banner("redis");
        let lines: Vec<&str> = banner.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0].chars().count(), 50);
        assert!(lines[3].contains("Installing Service: REDIS"));
        assert!(lines[4].contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("postgres"), "Postgres");
        assert_eq!(capitalize(""), "");
    }
}
