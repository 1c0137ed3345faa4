//! Target Cluster Resource Provider
//!
//! Bridges the generic resource contract onto the Ivory cluster service.
//! Reads, updates and deletes all select their targets the same way: list
//! every name, fetch each cluster, convert it to a resource and keep it when
//! the predicate holds.

use super::convert::{
    merge_properties, to_cluster, to_resource, CLUSTER_NAME_PROPERTY_ID,
    CLUSTER_PROPERTIES_PROPERTY_ID,
};
use super::fetcher::fetch_candidates;
use super::{ProviderOptions, ResourceProvider};
use crate::error::{into_outcome, ProviderError, ResourceFailure};
use crate::predicate::{evaluate, Predicate};
use crate::resource::{PropertyMap, Request, Resource, ResourceType};
use crate::service::{Cluster, ClusterService};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub struct TargetClusterResourceProvider<S> {
    service: S,
    property_ids: HashSet<String>,
    key_property_ids: HashMap<ResourceType, String>,
    options: ProviderOptions,
}

impl<S> TargetClusterResourceProvider<S>
where
    S: ClusterService,
{
    /// Build a provider from the service client and the registry metadata of
    /// [`ResourceType::DrTargetCluster`]
    pub fn new(
        service: S,
        property_ids: HashSet<String>,
        key_property_ids: HashMap<ResourceType, String>,
    ) -> Self {
        Self {
            service,
            property_ids,
            key_property_ids,
            options: ProviderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn key_property_id(&self) -> &str {
        self.key_property_ids
            .get(&ResourceType::DrTargetCluster)
            .map(String::as_str)
            .unwrap_or(CLUSTER_NAME_PROPERTY_ID)
    }

    /// Clusters whose resource form satisfies `predicate`, with that resource
    async fn select(
        &self,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<(Cluster, Resource)>, ProviderError> {
        let key_value = predicate.and_then(|p| p.key_value(self.key_property_id()));
        let candidates =
            fetch_candidates(&self.service, key_value, self.options.fetch_concurrency).await?;
        let fetched = candidates.len();

        let selected: Vec<(Cluster, Resource)> = candidates
            .into_iter()
            .map(|cluster| {
                let resource = to_resource(&cluster);
                (cluster, resource)
            })
            .filter(|(_, resource)| evaluate(predicate, resource.properties()))
            .collect();

        tracing::debug!("{} of {} fetched cluster(s) selected", selected.len(), fetched);
        Ok(selected)
    }

    /// Merged cluster for one update target; renames are rejected
    fn updated_cluster(
        &self,
        current: &Resource,
        name: &str,
        delta: &PropertyMap,
    ) -> Result<Cluster, ProviderError> {
        if let Some(requested) = delta.get(CLUSTER_NAME_PROPERTY_ID).filter(|v| !v.is_null()) {
            if requested.as_str() != Some(name) {
                return Err(ProviderError::Validation(format!(
                    "cannot rename cluster `{}` to {}",
                    name, requested
                )));
            }
        }
        let merged = merge_properties(current.properties(), delta);
        to_cluster(&merged, &self.property_ids)
    }
}

/// Key of a raw property map, for failure reports
fn map_name(properties: &PropertyMap) -> Option<String> {
    properties
        .get(CLUSTER_NAME_PROPERTY_ID)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn describe(predicate: Option<&Predicate>) -> String {
    predicate.map_or_else(|| "ALL".to_string(), ToString::to_string)
}

#[async_trait]
impl<S> ResourceProvider for TargetClusterResourceProvider<S>
where
    S: ClusterService,
{
    fn resource_type(&self) -> ResourceType {
        ResourceType::DrTargetCluster
    }

    #[tracing::instrument(skip_all, fields(request_id = request.request_id().unwrap_or("-")))]
    async fn create_resources(&self, request: &Request) -> Result<Vec<String>, ProviderError> {
        let mut failures = Vec::new();

        // Convert everything first so no service call happens for an invalid map
        let mut clusters = Vec::with_capacity(request.properties().len());
        for properties in request.properties() {
            match to_cluster(properties, &self.property_ids) {
                Ok(cluster) => clusters.push(cluster),
                Err(error) => {
                    tracing::warn!("rejected cluster definition: {}", error);
                    failures.push(ResourceFailure {
                        name: map_name(properties),
                        error,
                    });
                }
            }
        }

        let mut created = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            match self.service.submit_cluster(&cluster).await {
                Ok(()) => {
                    tracing::info!("submitted cluster `{}`", cluster.name);
                    created.push(cluster.name);
                }
                Err(e) => {
                    tracing::warn!("failed to submit cluster `{}`: {}", cluster.name, e);
                    failures.push(ResourceFailure {
                        name: Some(cluster.name),
                        error: e.into(),
                    });
                }
            }
        }

        into_outcome("create", created, request.properties().len(), failures)
    }

    #[tracing::instrument(
        skip_all,
        fields(request_id = request.request_id().unwrap_or("-"), predicate = %describe(predicate))
    )]
    async fn get_resources(
        &self,
        request: &Request,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Resource>, ProviderError> {
        let resources = self
            .select(predicate)
            .await?
            .into_iter()
            .map(|(_, mut resource)| {
                resource.retain_properties(request.property_ids());
                resource
            })
            .collect();

        Ok(resources)
    }

    #[tracing::instrument(
        skip_all,
        fields(request_id = request.request_id().unwrap_or("-"), predicate = %describe(predicate))
    )]
    async fn update_resources(
        &self,
        request: &Request,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<String>, ProviderError> {
        let delta = request
            .properties()
            .iter()
            .fold(PropertyMap::new(), |acc, map| merge_properties(&acc, map));

        let targets = self.select(predicate).await?;
        if targets.is_empty() {
            tracing::debug!("no cluster matched, nothing to update");
            return Ok(Vec::new());
        }

        let mut failures = Vec::new();

        // Merge and convert every target before the first write
        let mut clusters = Vec::with_capacity(targets.len());
        for (current, resource) in &targets {
            match self.updated_cluster(resource, &current.name, &delta) {
                Ok(cluster) => clusters.push(cluster),
                Err(error) => {
                    tracing::warn!("rejected update of cluster `{}`: {}", current.name, error);
                    failures.push(ResourceFailure {
                        name: Some(current.name.clone()),
                        error,
                    });
                }
            }
        }

        let mut updated = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            match self.service.update_cluster(&cluster).await {
                Ok(()) => {
                    tracing::info!("updated cluster `{}`", cluster.name);
                    updated.push(cluster.name);
                }
                Err(e) => {
                    tracing::warn!("failed to update cluster `{}`: {}", cluster.name, e);
                    failures.push(ResourceFailure {
                        name: Some(cluster.name),
                        error: e.into(),
                    });
                }
            }
        }

        into_outcome("update", updated, targets.len(), failures)
    }

    #[tracing::instrument(skip_all, fields(predicate = %describe(predicate)))]
    async fn delete_resources(
        &self,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<String>, ProviderError> {
        let targets = self.select(predicate).await?;
        if targets.is_empty() {
            tracing::debug!("no cluster matched, nothing to delete");
            return Ok(Vec::new());
        }

        let mut deleted = Vec::with_capacity(targets.len());
        let mut failures = Vec::new();
        for (cluster, _) in &targets {
            match self.service.delete_cluster(&cluster.name).await {
                Ok(()) => {
                    tracing::info!("deleted cluster `{}`", cluster.name);
                    deleted.push(cluster.name.clone());
                }
                Err(e) => {
                    tracing::warn!("failed to delete cluster `{}`: {}", cluster.name, e);
                    failures.push(ResourceFailure {
                        name: Some(cluster.name.clone()),
                        error: e.into(),
                    });
                }
            }
        }

        into_outcome("delete", deleted, targets.len(), failures)
    }

    fn property_ids(&self) -> &HashSet<String> {
        &self.property_ids
    }

    fn key_property_ids(&self) -> &HashMap<ResourceType, String> {
        &self.key_property_ids
    }

    fn mapping_property_ids(&self) -> &[&'static str] {
        &[CLUSTER_PROPERTIES_PROPERTY_ID]
    }
}
