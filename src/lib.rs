//! drcluster
//!
//! Generic create/read/update/delete over disaster-recovery target clusters
//! held by an external Ivory cluster service.
//!
//! - [`resource`] - resource registry, resources and requests
//! - [`predicate`] - predicate tree and fluent builder
//! - [`service`] - cluster service contract, REST client and in-memory double
//! - [`provider`] - the target-cluster resource provider
//! - [`config`] - persisted CLI configuration

pub mod config;
pub mod error;
pub mod predicate;
pub mod provider;
pub mod resource;
pub mod service;

pub use error::{ProviderError, ResourceFailure};
pub use provider::{ProviderOptions, ResourceProvider, TargetClusterResourceProvider};

/// Version injected at compile time via DRCLUSTER_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("DRCLUSTER_VERSION") {
    Some(v) => v,
    None => "dev",
};
