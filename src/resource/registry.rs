//! Resource Registry - Load resource type definitions from JSON
//!
//! This module loads the property metadata of every resource type from
//! embedded JSON files and provides lookup functions for providers and the
//! front end.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/dr.json")];

/// Closed set of resource kinds known to the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ResourceType {
    /// Disaster-recovery target cluster, backed by the Ivory cluster service
    #[serde(rename = "DRTargetCluster")]
    DrTargetCluster,
}

impl ResourceType {
    /// All resource types, in declaration order
    pub const ALL: &'static [ResourceType] = &[ResourceType::DrTargetCluster];

    /// Registry name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::DrTargetCluster => "DRTargetCluster",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource type definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceTypeDef {
    /// Namespace prefix shared by every property id of the type
    pub category: String,
    pub key_property_id: String,
    pub property_ids: Vec<String>,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<ResourceType, ResourceTypeDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource type definition
pub fn get_resource_type(resource_type: ResourceType) -> Option<&'static ResourceTypeDef> {
    get_registry().resources.get(&resource_type)
}

/// Property ids registered for a resource type (empty if unregistered)
pub fn get_property_ids(resource_type: ResourceType) -> HashSet<String> {
    get_resource_type(resource_type)
        .map(|def| def.property_ids.iter().cloned().collect())
        .unwrap_or_default()
}

/// Key property id map for a resource type
pub fn get_key_property_ids(resource_type: ResourceType) -> HashMap<ResourceType, String> {
    get_resource_type(resource_type)
        .map(|def| HashMap::from([(resource_type, def.key_property_id.clone())]))
        .unwrap_or_default()
}
