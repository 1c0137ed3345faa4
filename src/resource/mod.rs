//! Resource abstraction layer
//!
//! This module provides the loosely-typed side of the bridge: every resource
//! is a bag of namespaced properties, and the property ids of each resource
//! type are loaded from embedded JSON definitions.
//!
//! # Architecture
//!
//! - [`registry`] - Loads resource type definitions (property ids, key property id)
//! - [`model`] - `Resource`, `PropertyMap` and `Request`
//!
//! # Resource Definitions
//!
//! Resource types are defined in JSON files under `src/resources/`:
//! - `dr.json` - disaster-recovery resources (target clusters)
//!
//! # Example
//!
//! ```ignore
//! use drcluster::resource::{get_key_property_ids, ResourceType};
//!
//! let keys = get_key_property_ids(ResourceType::DrTargetCluster);
//! assert_eq!(keys[&ResourceType::DrTargetCluster], "Cluster/name");
//! ```

mod model;
mod registry;

pub use model::*;
pub use registry::*;
