//! Translation between property maps and `Cluster` entities
//!
//! Both directions are pure. `to_cluster` either builds a complete entity or
//! fails without side effects; nothing partial ever reaches the service.

use crate::error::ProviderError;
use crate::resource::{PropertyMap, Resource, ResourceType};
use crate::service::Cluster;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const CLUSTER_NAME_PROPERTY_ID: &str = "Cluster/name";
pub const CLUSTER_COLO_PROPERTY_ID: &str = "Cluster/colo";
pub const CLUSTER_INTERFACES_PROPERTY_ID: &str = "Cluster/interfaces";
pub const CLUSTER_LOCATIONS_PROPERTY_ID: &str = "Cluster/locations";
pub const CLUSTER_PROPERTIES_PROPERTY_ID: &str = "Cluster/properties";

/// Flatten a cluster into a target-cluster resource
pub fn to_resource(cluster: &Cluster) -> Resource {
    let mut resource = Resource::new(ResourceType::DrTargetCluster);
    resource.set_property(CLUSTER_NAME_PROPERTY_ID, cluster.name.as_str());
    resource.set_property(CLUSTER_COLO_PROPERTY_ID, cluster.colo.as_str());
    resource.set_property(
        CLUSTER_INTERFACES_PROPERTY_ID,
        string_array(&cluster.interfaces),
    );
    resource.set_property(
        CLUSTER_LOCATIONS_PROPERTY_ID,
        string_array(&cluster.locations),
    );
    resource.set_property(
        CLUSTER_PROPERTIES_PROPERTY_ID,
        cluster
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>(),
    );
    resource
}

/// Build a cluster from a property map.
///
/// The name is mandatory. Absent (or null) fields become empty values.
/// Flattened `Cluster/properties/<key>` entries are applied after a whole
/// `Cluster/properties` mapping, so they win on conflicting keys.
/// `registered` is the set of property ids known for the resource type.
pub fn to_cluster(
    properties: &PropertyMap,
    registered: &HashSet<String>,
) -> Result<Cluster, ProviderError> {
    let flattened_prefix = format!("{}/", CLUSTER_PROPERTIES_PROPERTY_ID);

    if let Some(unknown) = properties
        .keys()
        .find(|id| !registered.contains(id.as_str()) && !id.starts_with(&flattened_prefix))
    {
        return Err(ProviderError::Validation(format!(
            "unknown property `{}`",
            unknown
        )));
    }

    let name = match present(properties, CLUSTER_NAME_PROPERTY_ID) {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "`{}` must be a non-empty string, got {}",
                CLUSTER_NAME_PROPERTY_ID, other
            )))
        }
        None => {
            return Err(ProviderError::Validation(format!(
                "missing key property `{}`",
                CLUSTER_NAME_PROPERTY_ID
            )))
        }
    };

    let colo = match present(properties, CLUSTER_COLO_PROPERTY_ID) {
        None => String::new(),
        Some(Value::String(colo)) => colo.clone(),
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "`{}` must be a string, got {}",
                CLUSTER_COLO_PROPERTY_ID, other
            )))
        }
    };

    let interfaces = string_set(properties, CLUSTER_INTERFACES_PROPERTY_ID)?;
    let locations = string_set(properties, CLUSTER_LOCATIONS_PROPERTY_ID)?;

    let mut cluster_properties = BTreeMap::new();
    match present(properties, CLUSTER_PROPERTIES_PROPERTY_ID) {
        None => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                cluster_properties.insert(key.clone(), property_string(key, value)?);
            }
        }
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "`{}` must be a mapping, got {}",
                CLUSTER_PROPERTIES_PROPERTY_ID, other
            )))
        }
    }
    for (id, value) in properties {
        let Some(key) = id.strip_prefix(&flattened_prefix) else {
            continue;
        };
        if key.is_empty() {
            return Err(ProviderError::Validation(format!(
                "empty key in `{}`",
                id
            )));
        }
        if value.is_null() {
            cluster_properties.remove(key);
        } else {
            cluster_properties.insert(key.to_string(), property_string(key, value)?);
        }
    }

    Ok(Cluster {
        name,
        colo,
        interfaces,
        locations,
        properties: cluster_properties,
    })
}

/// Overlay `delta` onto `existing`: delta values win, absent ids are preserved.
///
/// A null counts as absent, except on a flattened `Cluster/properties/<key>`
/// where it removes that key.
pub fn merge_properties(existing: &PropertyMap, delta: &PropertyMap) -> PropertyMap {
    let flattened_prefix = format!("{}/", CLUSTER_PROPERTIES_PROPERTY_ID);
    let mut merged = existing.clone();
    merged.extend(
        delta
            .iter()
            .filter(|(id, value)| !value.is_null() || id.starts_with(&flattened_prefix))
            .map(|(id, value)| (id.clone(), value.clone())),
    );
    merged
}

/// Value of `id` unless absent or null
fn present<'a>(properties: &'a PropertyMap, id: &str) -> Option<&'a Value> {
    properties.get(id).filter(|v| !v.is_null())
}

fn string_array(values: &BTreeSet<String>) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

/// A collection of strings, or a single string standing for a one-element set
fn string_set(properties: &PropertyMap, id: &str) -> Result<BTreeSet<String>, ProviderError> {
    match present(properties, id) {
        None => Ok(BTreeSet::new()),
        Some(Value::String(single)) => Ok(BTreeSet::from([single.clone()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ProviderError::Validation(format!(
                    "`{}` must only contain strings, got {}",
                    id, other
                ))),
            })
            .collect(),
        Some(other) => Err(ProviderError::Validation(format!(
            "`{}` must be a collection of strings, got {}",
            id, other
        ))),
    }
}

/// Cluster property values are strings; numbers and booleans are stringified
fn property_string(key: &str, value: &Value) -> Result<String, ProviderError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ProviderError::Validation(format!(
            "cluster property `{}` must be a scalar, got {}",
            key, other
        ))),
    }
}
