//! In-memory cluster service
//!
//! Keeps clusters in a process-local map while honoring the same
//! NotFound/Conflict contract as the REST service.

use super::{Cluster, ClusterService, ServiceError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct InMemoryClusterService {
    clusters: Mutex<BTreeMap<String, Cluster>>,
}

impl InMemoryClusterService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clusters(clusters: impl IntoIterator<Item = Cluster>) -> Self {
        let clusters = clusters
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();
        Self {
            clusters: Mutex::new(clusters),
        }
    }

    /// Copy of every stored cluster, ordered by name
    pub fn snapshot(&self) -> Result<Vec<Cluster>, ServiceError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Cluster>>, ServiceError> {
        self.clusters
            .lock()
            .map_err(|_| ServiceError::Unavailable("cluster store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ClusterService for InMemoryClusterService {
    async fn get_cluster_names(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn get_cluster(&self, name: &str) -> Result<Cluster, ServiceError> {
        self.lock()?
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }

    async fn submit_cluster(&self, cluster: &Cluster) -> Result<(), ServiceError> {
        let mut clusters = self.lock()?;
        if clusters.contains_key(&cluster.name) {
            return Err(ServiceError::Conflict(cluster.name.clone()));
        }
        clusters.insert(cluster.name.clone(), cluster.clone());
        Ok(())
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<(), ServiceError> {
        let mut clusters = self.lock()?;
        match clusters.get_mut(&cluster.name) {
            Some(existing) => {
                *existing = cluster.clone();
                Ok(())
            }
            None => Err(ServiceError::NotFound(cluster.name.clone())),
        }
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), ServiceError> {
        self.lock()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_then_list_and_get() {
        let service = InMemoryClusterService::new();
        service
            .submit_cluster(&Cluster::new("b").with_colo("Colo"))
            .await
            .unwrap();
        service.submit_cluster(&Cluster::new("a")).await.unwrap();

        assert_eq!(service.get_cluster_names().await.unwrap(), vec!["a", "b"]);
        assert_eq!(service.get_cluster("b").await.unwrap().colo, "Colo");
    }

    #[tokio::test]
    async fn test_submit_conflict() {
        let service = InMemoryClusterService::with_clusters([Cluster::new("a")]);
        assert_eq!(
            service.submit_cluster(&Cluster::new("a")).await,
            Err(ServiceError::Conflict("a".to_string()))
        );
    }

    #[tokio::test]
    async fn test_update_replaces_whole_entity() {
        let service =
            InMemoryClusterService::with_clusters([Cluster::new("a").with_property("P1", "V1")]);
        service
            .update_cluster(&Cluster::new("a").with_colo("Colo"))
            .await
            .unwrap();

        assert_eq!(
            service.get_cluster("a").await.unwrap(),
            Cluster::new("a").with_colo("Colo")
        );
    }

    #[tokio::test]
    async fn test_missing_cluster_is_not_found() {
        let service = InMemoryClusterService::new();
        let not_found = ServiceError::NotFound("x".to_string());

        assert_eq!(service.get_cluster("x").await, Err(not_found.clone()));
        assert_eq!(
            service.update_cluster(&Cluster::new("x")).await,
            Err(not_found.clone())
        );
        assert_eq!(service.delete_cluster("x").await, Err(not_found));
    }
}
