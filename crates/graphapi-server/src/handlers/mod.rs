//! HTTP handler modules for the graph rendering API.
//!
//! Each sub-module implements thin handlers that parse requests,
//! delegate to the matching store, and return JSON responses. No
//! business logic lives in handlers.

use serde::Deserialize;

use graphapi_core::Stage;

pub mod graph_types;
pub mod health;
pub mod icon_sets;
pub mod layout_sets;
pub mod link_sets;
pub mod themes;

/// Query parameters selecting a bundle: lifecycle stage (default
/// `published`) and an optional exact version.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BundleQuery {
    #[serde(default)]
    pub stage: Stage,
    pub version: Option<u32>,
}
