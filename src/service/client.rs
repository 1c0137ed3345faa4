//! Ivory Client
//!
//! REST implementation of [`ClusterService`], combining the HTTP layer with
//! the Ivory entity endpoints.

use super::http::{HttpError, IvoryHttpClient};
use super::{Cluster, ClusterService, ServiceError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Entity type segment of every cluster endpoint
const ENTITY_TYPE: &str = "cluster";

/// Main Ivory client
#[derive(Clone)]
pub struct IvoryClient {
    http: IvoryHttpClient,
    base_url: String,
    token: Option<String>,
}

impl IvoryClient {
    /// Create a new client for the service at `endpoint`
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let url = Url::parse(endpoint)
            .with_context(|| format!("Invalid Ivory endpoint: {}", endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported endpoint scheme: {}", url.scheme());
        }

        let http = IvoryHttpClient::new(timeout)?;

        Ok(Self {
            http,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Entity API helpers
    // =========================================================================

    /// Build an entity API URL, e.g. `{base}/api/entities/definition/cluster/{name}`
    pub fn entities_url(&self, action: &str, name: Option<&str>) -> String {
        match name {
            Some(name) => format!(
                "{}/api/entities/{}/{}/{}",
                self.base_url,
                action,
                ENTITY_TYPE,
                urlencoding::encode(name)
            ),
            None => format!("{}/api/entities/{}/{}", self.base_url, action, ENTITY_TYPE),
        }
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[async_trait]
impl ClusterService for IvoryClient {
    async fn get_cluster_names(&self) -> Result<Vec<String>, ServiceError> {
        let url = self.entities_url("list", None);
        let response = self
            .http
            .get(&url, self.token())
            .await
            .map_err(|e| map_http_error(e, None))?;

        parse_cluster_names(&response)
    }

    async fn get_cluster(&self, name: &str) -> Result<Cluster, ServiceError> {
        let url = self.entities_url("definition", Some(name));
        let response = self
            .http
            .get(&url, self.token())
            .await
            .map_err(|e| map_http_error(e, Some(name)))?;

        serde_json::from_value(response)
            .map_err(|e| ServiceError::InvalidResponse(format!("cluster `{}`: {}", name, e)))
    }

    async fn submit_cluster(&self, cluster: &Cluster) -> Result<(), ServiceError> {
        let url = self.entities_url("submit", None);
        let body = to_body(cluster)?;
        self.http
            .post(&url, self.token(), Some(&body))
            .await
            .map_err(|e| map_http_error(e, Some(cluster.name.as_str())))?;
        Ok(())
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<(), ServiceError> {
        let url = self.entities_url("update", Some(cluster.name.as_str()));
        let body = to_body(cluster)?;
        self.http
            .post(&url, self.token(), Some(&body))
            .await
            .map_err(|e| map_http_error(e, Some(cluster.name.as_str())))?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), ServiceError> {
        let url = self.entities_url("delete", Some(name));
        self.http
            .delete(&url, self.token())
            .await
            .map_err(|e| map_http_error(e, Some(name)))?;
        Ok(())
    }
}

fn to_body(cluster: &Cluster) -> Result<Value, ServiceError> {
    serde_json::to_value(cluster)
        .map_err(|e| ServiceError::InvalidResponse(format!("cannot encode cluster: {}", e)))
}

/// Give an HTTP failure its cluster-service meaning.
///
/// `name` is the cluster the call addressed; list calls have none, so a 404
/// there means the endpoint itself is wrong.
pub fn map_http_error(error: HttpError, name: Option<&str>) -> ServiceError {
    match (error, name) {
        (HttpError::Status { status, .. }, Some(name)) if status == StatusCode::NOT_FOUND => {
            ServiceError::NotFound(name.to_string())
        }
        (HttpError::Status { status, .. }, Some(name)) if status == StatusCode::CONFLICT => {
            ServiceError::Conflict(name.to_string())
        }
        (HttpError::Status { status, body }, Some(name))
            if status == StatusCode::BAD_REQUEST && body.contains("already exists") =>
        {
            ServiceError::Conflict(name.to_string())
        }
        (HttpError::Status { status, .. }, _) => {
            ServiceError::Unavailable(format!("API request failed: {}", status))
        }
        (HttpError::Transport(e), _) => ServiceError::Unavailable(e.to_string()),
        (HttpError::Decode(e), _) => ServiceError::InvalidResponse(e.to_string()),
    }
}

/// Extract cluster names from a list response.
///
/// Accepts a bare array of names, or `{"entity": [...]}` whose items are names
/// or `{"name": ..}` objects. A single entity may be rendered as an object
/// instead of a one-element array.
pub fn parse_cluster_names(response: &Value) -> Result<Vec<String>, ServiceError> {
    let entities = match response {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        Value::Object(map) => match map.get("entity") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(single) => vec![single],
        },
        other => {
            return Err(ServiceError::InvalidResponse(format!(
                "unexpected cluster list: {}",
                other
            )))
        }
    };

    entities
        .into_iter()
        .map(|entity| {
            entity
                .as_str()
                .or_else(|| entity.get("name").and_then(|v| v.as_str()))
                .map(str::to_string)
                .ok_or_else(|| {
                    ServiceError::InvalidResponse(format!("cluster entry without name: {}", entity))
                })
        })
        .collect()
}
