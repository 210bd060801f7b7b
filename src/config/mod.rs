#[cfg(feature = "cli")]
pub mod cli;

use crate::domain::model::{ContainerNaming, HealthCheckPolicy};
use crate::utils::error::{InstallError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Environment variable pointing at the services configuration file.
pub const CONFIG_ENV_VAR: &str = "SIN_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "services.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub services: BTreeMap<String, ServiceDefinition>,
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,
    #[serde(default = "default_container_separator")]
    pub container_separator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub compose_file: String,
    pub service_name: String,
    pub port_key: String,
    pub uri_format: String,
    /// Logical parameter name -> environment variable inside the workload.
    /// An empty variable name means "use the default".
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    pub health_check: Option<HealthCheckSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub command: String,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sin")
}

fn default_wait_timeout() -> u64 {
    HealthCheckPolicy::DEFAULT_TIMEOUT_SECS
}

fn default_container_separator() -> String {
    ContainerNaming::default().separator
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_interval() -> u64 {
    HealthCheckPolicy::DEFAULT_INTERVAL_SECS
}

fn default_retries() -> u32 {
    HealthCheckPolicy::DEFAULT_MAX_ATTEMPTS
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            InstallError::config(format!(
                "Configuration file not found: {} ({})",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        toml::from_str(&processed)
            .map_err(|e| InstallError::config(format!("TOML parsing error: {}", e)))
    }

    /// Explicit path, then `$SIN_CONFIG`, then `services.toml` in the working directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn service(&self, name: &str) -> Result<&ServiceDefinition> {
        self.services.get(name).ok_or_else(|| {
            let available: Vec<&str> = self.services.keys().map(String::as_str).collect();
            InstallError::config(format!(
                "Service '{}' is not supported. Available: {}",
                name,
                available.join(", ")
            ))
        })
    }

    pub fn container_naming(&self) -> ContainerNaming {
        ContainerNaming {
            separator: self.container_separator.clone(),
            ..ContainerNaming::default()
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("base_dir", &self.base_dir.to_string_lossy())?;
        for (name, service) in &self.services {
            service.validate().map_err(|e| match e {
                InstallError::ConfigInvalid { message } => {
                    InstallError::config(format!("services.{}: {}", name, message))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl ServiceDefinition {
    /// Placeholder names referenced by `uri_format`.
    pub fn template_parameters(&self) -> BTreeSet<String> {
        template_placeholders(&self.uri_format)
    }

    pub fn health_policy(&self, wait_timeout: u64) -> Option<HealthCheckPolicy> {
        self.health_check.as_ref().map(|check| {
            HealthCheckPolicy::new(
                check.command.clone(),
                Duration::from_secs(check.interval),
                check.retries,
                Duration::from_secs(wait_timeout),
            )
        })
    }
}

impl Validate for ServiceDefinition {
    fn validate(&self) -> Result<()> {
        validation::validate_url("repo_url", &self.repo_url)?;
        validation::validate_non_empty_string("branch", &self.branch)?;
        validation::validate_path("compose_file", &self.compose_file)?;
        validation::validate_non_empty_string("service_name", &self.service_name)?;
        validation::validate_non_empty_string("port_key", &self.port_key)?;
        validation::validate_non_empty_string("uri_format", &self.uri_format)?;

        for param in self.template_parameters() {
            let resolvable = param == "host"
                || param == "port"
                || self.env_vars.contains_key(&param)
                || self.defaults.contains_key(&param);
            if !resolvable {
                return Err(InstallError::config(format!(
                    "uri_format references '{}' which is neither in env_vars nor defaults",
                    param
                )));
            }
        }

        if let Some(check) = &self.health_check {
            validation::validate_non_empty_string("health_check.command", &check.command)?;
            validation::validate_positive_number("health_check.retries", check.retries as usize, 1)?;
        }

        Ok(())
    }
}

/// `{name}` placeholders of a URI template.
pub(crate) static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

fn template_placeholders(template: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// 替換環境變數 (例如 ${API_KEY})，未設定的保持原樣
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
wait_timeout = 45

[services.redis]
repo_url = "https://github.com/example/redis-compose"
compose_file = "docker-compose.yml"
service_name = "redis"
port_key = "6379"
uri_format = "redis://{host}:{port}"

[services.postgres]
repo_url = "https://github.com/example/postgres-compose"
branch = "stable"
compose_file = "docker-compose.yml"
service_name = "db"
port_key = "5432"
uri_format = "postgresql://{user}:{password}@{host}:{port}/{database}"

[services.postgres.env_vars]
user = "POSTGRES_USER"
password = "POSTGRES_PASSWORD"
database = "POSTGRES_DB"

[services.postgres.defaults]
user = "postgres"
port = "5432"

[services.postgres.health_check]
command = "pg_isready -U postgres"
retries = 10
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.wait_timeout, 45);
        assert_eq!(config.container_separator, "_");
        assert!(config.base_dir.ends_with(".sin"));

        let redis = config.service("redis").unwrap();
        assert_eq!(redis.branch, "main");
        assert!(redis.health_check.is_none());
        assert!(redis.health_policy(config.wait_timeout).is_none());

        let postgres = config.service("postgres").unwrap();
        assert_eq!(postgres.branch, "stable");
        let policy = postgres.health_policy(config.wait_timeout).unwrap();
        assert_eq!(policy.command, "pg_isready -U postgres");
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.timeout, Duration::from_secs(45));

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_service_lists_available() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        let err = config.service("mysql").unwrap_err();
        assert!(matches!(err, InstallError::ConfigInvalid { .. }));
        assert!(err.to_string().contains("Available: postgres, redis"));
    }

    #[test]
    fn test_template_must_reference_known_parameters() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        let redis = config.services.get_mut("redis").unwrap();
        redis.uri_format = "redis://{user}@{host}:{port}".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("services.redis"));
        assert!(err.to_string().contains("'user'"));
    }

    #[test]
    fn test_empty_locator_is_rejected() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.services.get_mut("redis").unwrap().repo_url = String::new();
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.services.get_mut("redis").unwrap().compose_file = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SIN_TEST_REPO_HOST", "git.example.org");
        let content = r#"
[services.redis]
repo_url = "https://${SIN_TEST_REPO_HOST}/redis"
compose_file = "docker-compose.yml"
service_name = "redis"
port_key = "6379"
uri_format = "redis://{host}:{port}"
[services.redis.defaults]
password = "${SIN_TEST_UNSET_VARIABLE}"
"#;
        let config = AppConfig::from_toml_str(content).unwrap();
        let redis = config.service("redis").unwrap();
        assert_eq!(redis.repo_url, "https://git.example.org/redis");
        assert_eq!(redis.defaults["password"], "${SIN_TEST_UNSET_VARIABLE}");
    }

    #[test]
    fn test_bundled_catalogue_is_valid() {
        let config = AppConfig::from_toml_str(include_str!("../../services.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.service("postgres").unwrap().health_check.is_some());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml_str("services = 3").unwrap_err();
        assert!(matches!(err, InstallError::ConfigInvalid { .. }));
    }
}
