//! HTTP/JSON API server for versioned graph rendering configuration.
//!
//! Exposes the five resource stores (icon sets, layout sets, link sets,
//! graph types, themes) as a REST API with draft/publish lifecycle
//! endpoints, standalone icon resolution, and the derived runtime and
//! autocomplete views of graph types. This crate contains the server
//! framework, error mapping, and route definitions; all business logic
//! lives in graphapi-core and graphapi-store.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
