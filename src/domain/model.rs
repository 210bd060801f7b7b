use crate::utils::error::{InstallError, RuntimeCapability};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every compose project created by an installation.
pub const PROJECT_PREFIX: &str = "sin";

/// Loopback host reported in every endpoint.
pub const LOCAL_HOST: &str = "localhost";

/// Forward-only stages of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstallStep {
    Validating,
    CheckingRuntime,
    Fetching,
    Launching,
    AwaitingHealth,
    QueryingRuntimeState,
    ResolvingEndpoint,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallStep::Validating => "validating",
            InstallStep::CheckingRuntime => "checking runtime",
            InstallStep::Fetching => "fetching artifact",
            InstallStep::Launching => "launching",
            InstallStep::AwaitingHealth => "awaiting health",
            InstallStep::QueryingRuntimeState => "querying runtime state",
            InstallStep::ResolvingEndpoint => "resolving endpoint",
        };
        f.write_str(name)
    }
}

/// Events emitted to an [`InstallObserver`](crate::domain::ports::InstallObserver).
#[derive(Debug)]
pub enum InstallEvent<'a> {
    Started { service: &'a str },
    StepStarted(InstallStep),
    RuntimeAvailable(RuntimeCapability),
    ProbeFailed {
        service: &'a str,
        attempt: u32,
        max_attempts: u32,
    },
    Healthy { service: &'a str },
    StepFailed {
        step: InstallStep,
        error: &'a InstallError,
    },
    Completed {
        service: &'a str,
        endpoint: &'a EndpointDescriptor,
    },
}

/// State of a single `install` call.
#[derive(Debug, Clone)]
pub struct InstallationSession {
    pub service: String,
    pub project_id: String,
    pub destination: PathBuf,
    pub descriptor_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl InstallationSession {
    pub fn new(service: &str, base_dir: &Path, descriptor: &str) -> Self {
        let destination = base_dir.join(service);
        let descriptor_path = destination.join(descriptor);
        Self {
            service: service.to_string(),
            project_id: project_id(service),
            destination,
            descriptor_path,
            started_at: Utc::now(),
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Compose project names must be lowercase.
pub fn project_id(service: &str) -> String {
    format!("{}_{}", PROJECT_PREFIX, service.to_lowercase())
}

/// How the runtime names containers of a compose project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerNaming {
    pub separator: String,
    pub replica: u32,
}

impl Default for ContainerNaming {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            replica: 1,
        }
    }
}

impl ContainerNaming {
    /// Name pattern matching every replica of `service` in `project`.
    pub fn filter(&self, project: &str, service: &str) -> String {
        format!("{}{}{}", project, self.separator, service)
    }

    /// Name of the single replica that readiness probes run in.
    pub fn container_name(&self, project: &str, service: &str) -> String {
        format!(
            "{}{}{}",
            self.filter(project, service),
            self.separator,
            self.replica
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckPolicy {
    pub command: String,
    pub interval: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl HealthCheckPolicy {
    pub const DEFAULT_INTERVAL_SECS: u64 = 5;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(command: impl Into<String>, interval: Duration, max_attempts: u32, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            interval,
            max_attempts,
            timeout,
        }
    }
}

/// Workload descriptor as declared on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclaredConfig {
    #[serde(default)]
    pub services: BTreeMap<String, DeclaredService>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclaredService {
    #[serde(default, deserialize_with = "deserialize_environment")]
    pub environment: BTreeMap<String, String>,
}

impl DeclaredConfig {
    pub fn environment(&self, service: &str) -> Option<&BTreeMap<String, String>> {
        self.services.get(service).map(|s| &s.environment)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
    List(Vec<String>),
}

// compose 允許 map 或 `KEY=VALUE` 列表兩種寫法
fn deserialize_environment<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawEnvironment>::deserialize(deserializer)?;
    let mut env = BTreeMap::new();

    match raw {
        Some(RawEnvironment::Map(map)) => {
            for (key, value) in map {
                let value = match value {
                    Some(serde_yaml::Value::String(s)) => s,
                    Some(serde_yaml::Value::Number(n)) => n.to_string(),
                    Some(serde_yaml::Value::Bool(b)) => b.to_string(),
                    _ => continue,
                };
                env.insert(key, value);
            }
        }
        Some(RawEnvironment::List(items)) => {
            for item in items {
                // A bare `KEY` is passed through from the host, nothing is declared.
                if let Some((key, value)) = item.split_once('=') {
                    env.insert(key.to_string(), value.to_string());
                }
            }
        }
        None => {}
    }

    Ok(env)
}

/// Connection information for an installed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub host: String,
    pub port: String,
    pub params: BTreeMap<String, String>,
    pub uri: String,
    /// `uri` rendered with the password replaced by [`Self::REDACTED`].
    #[serde(skip)]
    pub masked_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub user: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl EndpointDescriptor {
    pub const REDACTED: &'static str = "****";

    /// `None` when neither a user nor a password was resolved.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        let user = self.params.get("user").map(String::as_str);
        let password = self.params.get("password").map(String::as_str);
        if user.is_none() && password.is_none() {
            return None;
        }
        Some(Credentials { user, password })
    }

    /// Copy with the password masked in both the parameters and the URI.
    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        if let Some(password) = redacted.params.get_mut("password") {
            *password = Self::REDACTED.to_string();
        }
        if let Some(masked) = redacted.masked_uri.take() {
            redacted.uri = masked;
        }
        redacted
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "URI: {}", self.uri)?;
        if let Some(creds) = self.credentials() {
            writeln!(
                f,
                "Credentials: user={}, password={}",
                creds.user.unwrap_or("N/A"),
                creds.password.unwrap_or("N/A")
            )?;
        }
        write!(f, "Host: {}:{}", self.host, self.port)
    }
}
