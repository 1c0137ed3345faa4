//! Integration tests for the target-cluster resource provider
//!
//! These tests drive full create/read/update/delete cycles through the
//! provider, against the in-memory service and against a mocked Ivory
//! endpoint.

use drcluster::predicate::PredicateBuilder;
use drcluster::provider::{
    CLUSTER_COLO_PROPERTY_ID, CLUSTER_INTERFACES_PROPERTY_ID, CLUSTER_LOCATIONS_PROPERTY_ID,
    CLUSTER_NAME_PROPERTY_ID, CLUSTER_PROPERTIES_PROPERTY_ID,
};
use drcluster::resource::{
    get_key_property_ids, get_property_ids, PropertyMap, Request, ResourceType,
};
use drcluster::service::in_memory::InMemoryClusterService;
use drcluster::service::ClusterService;
use drcluster::{ProviderError, ProviderOptions, ResourceProvider, TargetClusterResourceProvider};
use serde_json::json;
use std::collections::HashMap;

fn provider<S: ClusterService>(service: S) -> TargetClusterResourceProvider<S> {
    TargetClusterResourceProvider::new(
        service,
        get_property_ids(ResourceType::DrTargetCluster),
        get_key_property_ids(ResourceType::DrTargetCluster),
    )
}

fn cluster_properties(name: &str, colo: &str) -> PropertyMap {
    PropertyMap::from([
        (CLUSTER_NAME_PROPERTY_ID.to_string(), json!(name)),
        (CLUSTER_COLO_PROPERTY_ID.to_string(), json!(colo)),
        (CLUSTER_INTERFACES_PROPERTY_ID.to_string(), json!(["write:8020"])),
        (CLUSTER_LOCATIONS_PROPERTY_ID.to_string(), json!("staging")),
        (CLUSTER_PROPERTIES_PROPERTY_ID.to_string(), json!({"tier": "gold"})),
    ])
}

/// Full lifecycle against the in-memory service
mod in_memory_tests {
    use super::*;

    #[tokio::test]
    async fn test_crud_lifecycle() {
        let provider = provider(InMemoryClusterService::new());

        let created = provider
            .create_resources(&Request::create(
                vec![
                    cluster_properties("Cluster1", "east"),
                    cluster_properties("Cluster2", "west"),
                    cluster_properties("Cluster3", "east"),
                ],
                HashMap::new(),
            ))
            .await
            .unwrap();
        assert_eq!(created, vec!["Cluster1", "Cluster2", "Cluster3"]);

        let east = PredicateBuilder::new()
            .property(CLUSTER_COLO_PROPERTY_ID)
            .equals("east")
            .to_predicate()
            .unwrap();

        let delta = PropertyMap::from([("Cluster/properties/tier".to_string(), json!("silver"))]);
        let updated = provider
            .update_resources(&Request::update(delta, HashMap::new()), Some(&east))
            .await
            .unwrap();
        assert_eq!(updated, vec!["Cluster1", "Cluster3"]);

        let silver = PredicateBuilder::new()
            .property("Cluster/properties/tier")
            .equals("silver")
            .to_predicate()
            .unwrap();
        let resources = provider
            .get_resources(&Request::read([CLUSTER_NAME_PROPERTY_ID]), Some(&silver))
            .await
            .unwrap();
        let names: Vec<_> = resources
            .iter()
            .filter_map(|r| r.property(CLUSTER_NAME_PROPERTY_ID))
            .collect();
        assert_eq!(names, vec!["Cluster1", "Cluster3"]);

        let deleted = provider.delete_resources(Some(&east)).await.unwrap();
        assert_eq!(deleted, vec!["Cluster1", "Cluster3"]);

        let remaining = provider.service().snapshot().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Cluster2");
        assert_eq!(remaining[0].properties.get("tier").map(String::as_str), Some("gold"));
    }

    #[tokio::test]
    async fn test_duplicate_create_reports_conflict_and_keeps_others() {
        let provider = provider(InMemoryClusterService::new());
        provider
            .create_resources(&Request::create(
                vec![cluster_properties("Cluster1", "east")],
                HashMap::new(),
            ))
            .await
            .unwrap();

        let err = provider
            .create_resources(&Request::create(
                vec![
                    cluster_properties("Cluster1", "west"),
                    cluster_properties("Cluster2", "west"),
                ],
                HashMap::new(),
            ))
            .await
            .unwrap_err();

        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].error,
            ProviderError::Conflict("Cluster1".to_string())
        );

        let stored = provider.service().snapshot().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].colo, "east");
    }

    #[tokio::test]
    async fn test_or_predicate_with_concurrent_fetch() {
        let provider = provider(InMemoryClusterService::new()).with_options(ProviderOptions {
            fetch_concurrency: 4,
        });
        let maps = (1..=6)
            .map(|i| cluster_properties(&format!("Cluster{}", i), "east"))
            .collect();
        provider
            .create_resources(&Request::create(maps, HashMap::new()))
            .await
            .unwrap();

        let predicate = PredicateBuilder::new()
            .property(CLUSTER_NAME_PROPERTY_ID)
            .equals("Cluster2")
            .or()
            .property(CLUSTER_NAME_PROPERTY_ID)
            .equals("Cluster5")
            .to_predicate()
            .unwrap();

        let resources = provider
            .get_resources(&Request::default(), Some(&predicate))
            .await
            .unwrap();
        let names: Vec<_> = resources
            .iter()
            .filter_map(|r| r.property(CLUSTER_NAME_PROPERTY_ID))
            .collect();
        assert_eq!(names, vec!["Cluster2", "Cluster5"]);
    }

    #[tokio::test]
    async fn test_empty_service_selects_nothing() {
        let provider = provider(InMemoryClusterService::new());

        assert!(provider
            .get_resources(&Request::default(), None)
            .await
            .unwrap()
            .is_empty());
        assert!(provider.delete_resources(None).await.unwrap().is_empty());
    }
}

/// Provider over the REST client
mod http_tests {
    use super::*;
    use drcluster::service::client::IvoryClient;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_update_through_rest_service() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/entities/list/cluster"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entity": [{"name": "Cluster1"}, {"name": "Cluster2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/entities/definition/cluster/Cluster1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Cluster1",
                "colo": "east",
                "interfaces": ["write:8020"],
                "locations": ["staging"],
                "properties": {"tier": "gold"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        // The key filter keeps the provider away from Cluster2
        Mock::given(method("GET"))
            .and(path("/api/entities/definition/cluster/Cluster2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/entities/update/cluster/Cluster1"))
            .and(body_json(json!({
                "name": "Cluster1",
                "colo": "west",
                "interfaces": ["write:8020"],
                "locations": ["staging"],
                "properties": {"tier": "gold"}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = IvoryClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap();
        let predicate = PredicateBuilder::new()
            .property(CLUSTER_NAME_PROPERTY_ID)
            .equals("Cluster1")
            .to_predicate()
            .unwrap();
        let delta = PropertyMap::from([(CLUSTER_COLO_PROPERTY_ID.to_string(), json!("west"))]);

        let updated = provider(client)
            .update_resources(&Request::update(delta, HashMap::new()), Some(&predicate))
            .await
            .unwrap();
        assert_eq!(updated, vec!["Cluster1"]);
    }

    #[tokio::test]
    async fn test_service_outage_surfaces_as_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/entities/list/cluster"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = IvoryClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap();
        let err = provider(client)
            .get_resources(&Request::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ServiceUnavailable(_)));
    }
}
