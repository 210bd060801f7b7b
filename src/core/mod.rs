pub mod endpoint;
pub mod fetcher;
pub mod health;
pub mod installer;
pub mod runtime;

pub use crate::domain::model::{DeclaredConfig, EndpointDescriptor, HealthCheckPolicy};
pub use crate::domain::ports::{ArtifactSource, ContainerRuntime, InstallObserver};
pub use crate::utils::error::Result;
