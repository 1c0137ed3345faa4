//! Resource providers
//!
//! A provider exposes generic CRUD over one resource type while delegating
//! storage to an external service. Callers speak `Request`s, `Predicate`s and
//! `Resource`s; the provider translates them into service calls.
//!
//! - [`target_cluster`] - DR target clusters backed by the Ivory service
//! - [`convert`] - property map <-> `Cluster` translation
//! - [`fetcher`] - list-then-fetch candidate enumeration

pub mod convert;
pub mod fetcher;
pub mod target_cluster;

pub use convert::{
    CLUSTER_COLO_PROPERTY_ID, CLUSTER_INTERFACES_PROPERTY_ID, CLUSTER_LOCATIONS_PROPERTY_ID,
    CLUSTER_NAME_PROPERTY_ID, CLUSTER_PROPERTIES_PROPERTY_ID,
};
pub use target_cluster::TargetClusterResourceProvider;

use crate::error::ProviderError;
use crate::predicate::Predicate;
use crate::resource::{Request, Resource, ResourceType};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Tuning knobs of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Candidate fetches allowed in flight at once (0 is treated as 1)
    pub fetch_concurrency: usize,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            fetch_concurrency: 1,
        }
    }
}

/// Generic CRUD contract over one resource type.
///
/// Every operation is a single enumerate -> fetch-and-filter -> act sequence;
/// providers hold no state across calls. A `None` predicate selects every
/// resource.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    /// Create one resource per property map; returns the created keys
    async fn create_resources(&self, request: &Request) -> Result<Vec<String>, ProviderError>;

    async fn get_resources(
        &self,
        request: &Request,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Resource>, ProviderError>;

    /// Merge the request properties onto every selected resource; returns the updated keys
    async fn update_resources(
        &self,
        request: &Request,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<String>, ProviderError>;

    /// Delete every selected resource; returns the deleted keys
    async fn delete_resources(
        &self,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<String>, ProviderError>;

    /// Property ids registered for this resource type
    fn property_ids(&self) -> &HashSet<String>;

    /// Key property id map supplied at construction
    fn key_property_ids(&self) -> &HashMap<ResourceType, String>;

    /// Registered ids whose values are mappings, addressable per entry
    fn mapping_property_ids(&self) -> &[&'static str] {
        &[]
    }

    /// Ids of `property_ids` this provider does not support.
    ///
    /// An id is supported when registered, when it names a category of
    /// registered ids (`Cluster`), or when it addresses one entry of a
    /// mapping id (`Cluster/properties/P1`).
    fn check_property_ids(&self, property_ids: &HashSet<String>) -> HashSet<String> {
        let supported = self.property_ids();
        let mappings = self.mapping_property_ids();
        property_ids
            .iter()
            .filter(|id| {
                let known = supported
                    .iter()
                    .any(|registered| registered == *id || is_path_prefix(id, registered));
                let entry = mappings.iter().any(|mapping| is_entry_of(mapping, id));
                !known && !entry
            })
            .cloned()
            .collect()
    }
}

/// `prefix` is `path` up to one of its `/` separators
fn is_path_prefix(prefix: &str, path: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// `id` is `mapping/<key>` with a single, non-empty key segment
fn is_entry_of(mapping: &str, id: &str) -> bool {
    id.strip_prefix(mapping)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|key| !key.is_empty() && !key.contains('/'))
}
