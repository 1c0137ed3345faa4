//! Candidate Fetcher
//!
//! Lists cluster names from the service and fetches each candidate, in
//! enumeration order.

use crate::error::ProviderError;
use crate::predicate::CompareOp;
use crate::service::{Cluster, ClusterService, ServiceError};
use futures::stream::{self, StreamExt};

/// Fetch every cluster that may match a request.
///
/// When `key_value` is set only names equal to it (under the same comparison
/// the predicate uses) are fetched. Up to `concurrency` fetches run at once;
/// results keep the order of `get_cluster_names`.
///
/// A candidate that disappears between listing and fetching cannot match and
/// is skipped. Any other fetch failure aborts the whole fetch.
pub async fn fetch_candidates<S>(
    service: &S,
    key_value: Option<&str>,
    concurrency: usize,
) -> Result<Vec<Cluster>, ProviderError>
where
    S: ClusterService + ?Sized,
{
    let mut names = service.get_cluster_names().await?;
    tracing::debug!("service listed {} cluster(s)", names.len());

    if let Some(key) = key_value {
        names.retain(|name| CompareOp::Equals.apply(name, key));
        tracing::debug!("{} candidate(s) after key filter `{}`", names.len(), key);
    }

    let results: Vec<(String, Result<Cluster, ServiceError>)> = stream::iter(names)
        .map(|name| async move {
            let result = service.get_cluster(&name).await;
            (name, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut clusters = Vec::with_capacity(results.len());
    for (name, result) in results {
        match result {
            Ok(cluster) => clusters.push(cluster),
            Err(ServiceError::NotFound(_)) => {
                tracing::debug!("cluster `{}` vanished before it could be fetched, skipping", name);
            }
            Err(e) => {
                tracing::error!("failed to fetch cluster `{}`: {}", name, e);
                return Err(e.into());
            }
        }
    }

    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::in_memory::InMemoryClusterService;
    use crate::service::MockClusterService;

    fn service() -> InMemoryClusterService {
        InMemoryClusterService::with_clusters([
            Cluster::new("Cluster1"),
            Cluster::new("Cluster2"),
            Cluster::new("Cluster3"),
        ])
    }

    fn names(clusters: &[Cluster]) -> Vec<&str> {
        clusters.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fetches_every_listed_cluster() {
        let clusters = fetch_candidates(&service(), None, 1).await.unwrap();
        assert_eq!(names(&clusters), vec!["Cluster1", "Cluster2", "Cluster3"]);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_keeps_order() {
        let clusters = fetch_candidates(&service(), None, 8).await.unwrap();
        assert_eq!(names(&clusters), vec!["Cluster1", "Cluster2", "Cluster3"]);
    }

    #[tokio::test]
    async fn test_key_value_limits_fetches() {
        let mut mock = MockClusterService::new();
        mock.expect_get_cluster_names()
            .times(1)
            .returning(|| Ok(vec!["Cluster1".to_string(), "Cluster2".to_string()]));
        mock.expect_get_cluster()
            .withf(|name: &str| name == "Cluster2")
            .times(1)
            .returning(|name: &str| Ok(Cluster::new(name)));

        let clusters = fetch_candidates(&mock, Some("Cluster2"), 1).await.unwrap();
        assert_eq!(names(&clusters), vec!["Cluster2"]);
    }

    #[tokio::test]
    async fn test_vanished_cluster_is_skipped() {
        let mut mock = MockClusterService::new();
        mock.expect_get_cluster_names()
            .returning(|| Ok(vec!["Gone".to_string(), "Cluster1".to_string()]));
        mock.expect_get_cluster()
            .withf(|name: &str| name == "Gone")
            .returning(|name: &str| Err(ServiceError::NotFound(name.to_string())));
        mock.expect_get_cluster()
            .withf(|name: &str| name == "Cluster1")
            .returning(|name: &str| Ok(Cluster::new(name)));

        let clusters = fetch_candidates(&mock, None, 1).await.unwrap();
        assert_eq!(names(&clusters), vec!["Cluster1"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts() {
        let mut mock = MockClusterService::new();
        mock.expect_get_cluster_names()
            .returning(|| Ok(vec!["Cluster1".to_string()]));
        mock.expect_get_cluster()
            .returning(|_| Err(ServiceError::Unavailable("timeout".to_string())));

        assert_eq!(
            fetch_candidates(&mock, None, 1).await,
            Err(ProviderError::ServiceUnavailable("timeout".to_string()))
        );
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let mut mock = MockClusterService::new();
        mock.expect_get_cluster_names()
            .returning(|| Err(ServiceError::Unavailable("refused".to_string())));
        mock.expect_get_cluster().never();

        assert_eq!(
            fetch_candidates(&mock, None, 1).await,
            Err(ProviderError::ServiceUnavailable("refused".to_string()))
        );
    }
}
