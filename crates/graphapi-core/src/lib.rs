//! Domain contracts for the graphapi resource-bundle engine.
//!
//! Every resource kind (icon sets, layout sets, link sets, graph types,
//! render themes) is represented as a checksummed bundle: editable fields
//! plus derived fields, hashed over a canonical JSON payload. This crate
//! holds the pure parts of that model and performs no I/O.
//!
//! # Modules
//!
//! - [`canonical`]: canonical JSON serialization and SHA-256 digests
//! - [`error`]: validation error type shared by all contracts
//! - [`validate`]: identifier/key/name normalization rules
//! - [`stage`]: the draft/published lifecycle stage
//! - [`icon_set`], [`layout_set`], [`link_set`], [`graph_type`], [`theme`]:
//!   per-kind bundle contracts and checksum payloads
//! - [`resolve`]: the icon-set merge algorithm and resolution checksum
//! - [`settings`]: the pluggable layout-settings validation seam

/// Schema marker embedded in every canonical checksum payload.
pub const SCHEMA_VERSION: &str = "v1";

pub mod canonical;
pub mod error;
pub mod graph_type;
pub mod icon_set;
pub mod layout_set;
pub mod link_set;
pub mod resolve;
pub mod settings;
pub mod stage;
pub mod theme;
pub mod validate;

pub use canonical::{canonical_json, checksum_of, sha256_hex};
pub use error::ValidationError;
pub use resolve::{
    merge_icon_sets, IconConflictPolicy, IconMergeError, IconResolution, IconSetSourceRef,
    NodeTypeSource,
};
pub use settings::{ElkSettingsValidator, SettingsMap, SettingsValidator};
pub use stage::Stage;
