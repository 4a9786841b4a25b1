//! Application state shared across handlers.
//!
//! The stores synchronize internally (per-store mutex plus a version
//! compare-and-swap in SQL), so handlers hold no lock of their own and
//! the state is a cheap clone.

use std::path::Path;
use std::sync::Arc;

use graphapi_store::{defaults, StoreError, Stores};

#[derive(Clone)]
pub struct AppState {
    pub stores: Arc<Stores>,
}

impl AppState {
    /// Opens the database, runs migrations, and seeds the default
    /// resources.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let stores = Stores::open(db_path)?;
        defaults::bootstrap(&stores)?;
        Ok(AppState {
            stores: Arc::new(stores),
        })
    }
}
