//! Property Resource Model
//!
//! A resource is an identified bag of namespaced properties (`Cluster/name`,
//! `Cluster/colo`, ...). Values are JSON values so that collections and
//! mappings travel through the bridge without a dedicated type per field.

use super::registry::ResourceType;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Property id -> value mapping
pub type PropertyMap = BTreeMap<String, Value>;

/// Request info key used to correlate log lines of one request
pub const REQUEST_ID_INFO_KEY: &str = "request_id";

/// A typed, identified bag of properties
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    resource_type: ResourceType,
    properties: PropertyMap,
}

impl Resource {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            properties: PropertyMap::new(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn into_properties(self) -> PropertyMap {
        self.properties
    }

    pub fn set_property(&mut self, property_id: &str, value: impl Into<Value>) {
        self.properties.insert(property_id.to_string(), value.into());
    }

    /// Look up a property value, descending into mapping values for nested ids
    pub fn property(&self, property_id: &str) -> Option<&Value> {
        lookup_property(&self.properties, property_id)
    }

    /// Keep only the requested property ids (all of them when `property_ids` is empty)
    pub fn retain_properties(&mut self, property_ids: &HashSet<String>) {
        if property_ids.is_empty() {
            return;
        }
        // Entries of a mapping are returned under their own id
        let entries: Vec<(String, Value)> = property_ids
            .iter()
            .filter(|requested| !self.properties.contains_key(requested.as_str()))
            .filter_map(|requested| {
                lookup_property(&self.properties, requested)
                    .map(|value| (requested.clone(), value.clone()))
            })
            .collect();

        self.properties.retain(|id, _| {
            property_ids.iter().any(|requested| {
                id == requested
                    || id
                        .strip_prefix(requested.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
        });
        self.properties.extend(entries);
    }
}

/// Resolve `property_id` against a property map.
///
/// A direct hit wins. Otherwise the id is split at each `/` from the right and
/// the remainder is looked up as a key of the mapping stored under the prefix,
/// so `Cluster/properties/P1` addresses entry `P1` of `Cluster/properties`.
pub fn lookup_property<'a>(properties: &'a PropertyMap, property_id: &str) -> Option<&'a Value> {
    if let Some(value) = properties.get(property_id) {
        return Some(value);
    }

    property_id
        .rmatch_indices('/')
        .find_map(|(idx, _)| {
            let (prefix, rest) = (&property_id[..idx], &property_id[idx + 1..]);
            properties
                .get(prefix)
                .and_then(|v| v.as_object())
                .and_then(|map| map.get(rest))
        })
}

/// A create/update/read payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    properties: Vec<PropertyMap>,
    property_ids: HashSet<String>,
    request_info: HashMap<String, String>,
}

impl Request {
    /// Request creating one resource per property map
    pub fn create(properties: Vec<PropertyMap>, request_info: HashMap<String, String>) -> Self {
        Self {
            properties,
            property_ids: HashSet::new(),
            request_info,
        }
    }

    /// Request merging `properties` onto every selected resource
    pub fn update(properties: PropertyMap, request_info: HashMap<String, String>) -> Self {
        Self {
            properties: vec![properties],
            property_ids: HashSet::new(),
            request_info,
        }
    }

    /// Read request returning only `property_ids` (all properties when empty)
    pub fn read<I, S>(property_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            properties: Vec::new(),
            property_ids: property_ids.into_iter().map(Into::into).collect(),
            request_info: HashMap::new(),
        }
    }

    pub fn with_request_info(mut self, key: &str, value: &str) -> Self {
        self.request_info.insert(key.to_string(), value.to_string());
        self
    }

    pub fn properties(&self) -> &[PropertyMap] {
        &self.properties
    }

    pub fn property_ids(&self) -> &HashSet<String> {
        &self.property_ids
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_info.get(REQUEST_ID_INFO_KEY).map(String::as_str)
    }
}
