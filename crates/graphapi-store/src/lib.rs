//! SQLite persistence for the graph rendering API.
//!
//! One database file holds five resource kinds, each behind its own
//! store with the same draft/publish lifecycle: a single mutable draft
//! per resource and append-only published snapshots. [`Stores`] wires
//! them together over a shared [`Database`] handle; [`defaults`] seeds
//! the built-in `default` resources on startup.

use std::path::Path;
use std::sync::Arc;

pub mod db;
pub mod defaults;
pub mod error;
pub mod graph_types;
pub mod icon_sets;
pub mod layout_sets;
pub mod link_sets;
mod migrate;
mod resolve;
mod schema;
pub mod themes;

pub use db::Database;
pub use error::StoreError;
pub use graph_types::GraphTypeStore;
pub use icon_sets::IconSetStore;
pub use layout_sets::LayoutSetStore;
pub use link_sets::LinkSetStore;
pub use resolve::{
    resolve_icon_sets, ResolveIconSetRef, ResolveIconSetsRequest, ResolveIconSetsResponse,
};
pub use themes::ThemeStore;

/// All five stores over one database.
pub struct Stores {
    pub icon_sets: Arc<IconSetStore>,
    pub layout_sets: Arc<LayoutSetStore>,
    pub link_sets: Arc<LinkSetStore>,
    pub graph_types: Arc<GraphTypeStore>,
    pub themes: Arc<ThemeStore>,
}

impl Stores {
    pub fn new(db: Database) -> Self {
        let icon_sets = Arc::new(IconSetStore::new(db.clone()));
        let layout_sets = Arc::new(LayoutSetStore::new(db.clone()));
        let link_sets = Arc::new(LinkSetStore::new(db.clone()));
        let themes = Arc::new(ThemeStore::new(db.clone()));
        let graph_types = Arc::new(GraphTypeStore::new(
            db,
            Arc::clone(&icon_sets),
            Arc::clone(&layout_sets),
            Arc::clone(&link_sets),
        ));
        Stores {
            icon_sets,
            layout_sets,
            link_sets,
            graph_types,
            themes,
        }
    }

    /// Opens (or creates) the database at `path`, migrates it, and
    /// builds the stores.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Stores::new(Database::open(path)?))
    }

    /// Resolves icon sets without touching a graph type.
    pub fn resolve_icon_sets(
        &self,
        request: &ResolveIconSetsRequest,
    ) -> Result<ResolveIconSetsResponse, StoreError> {
        resolve::resolve_icon_sets(&self.icon_sets, request)
    }
}
