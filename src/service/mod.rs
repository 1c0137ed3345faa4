//! Cluster service interaction module
//!
//! The external Ivory cluster-management service owns every DR target
//! cluster. The bridge only talks to it through [`ClusterService`].
//!
//! # Module Structure
//!
//! - [`cluster`] - The `Cluster` domain entity
//! - [`client`] - REST implementation of `ClusterService`
//! - [`http`] - HTTP utilities for REST API calls
//! - [`in_memory`] - In-process implementation, for demos and tests
//!
//! # Example
//!
//! ```ignore
//! use drcluster::service::{client::IvoryClient, ClusterService};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = IvoryClient::new("http://localhost:15000", None, Duration::from_secs(30))?;
//!     let names = client.get_cluster_names().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod cluster;
pub mod http;
pub mod in_memory;

pub use cluster::Cluster;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("cluster `{0}` not found")]
    NotFound(String),
    #[error("cluster `{0}` already exists")]
    Conflict(String),
    #[error("cluster service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid response from cluster service: {0}")]
    InvalidResponse(String),
}

/// Operations the bridge consumes from the cluster service.
///
/// Every call may fail. Retries, caching and connection management belong to
/// the implementation, never to callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Identifiers of every cluster, in service order
    async fn get_cluster_names(&self) -> Result<Vec<String>, ServiceError>;

    /// Fails with [`ServiceError::NotFound`] if absent
    async fn get_cluster(&self, name: &str) -> Result<Cluster, ServiceError>;

    /// Fails with [`ServiceError::Conflict`] if the name is taken
    async fn submit_cluster(&self, cluster: &Cluster) -> Result<(), ServiceError>;

    /// Whole-entity replace; fails with [`ServiceError::NotFound`] if absent
    async fn update_cluster(&self, cluster: &Cluster) -> Result<(), ServiceError>;

    /// Fails with [`ServiceError::NotFound`] if absent
    async fn delete_cluster(&self, name: &str) -> Result<(), ServiceError>;
}
