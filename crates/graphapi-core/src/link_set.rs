//! Link-set bundle contract.
//!
//! A link set maps link type keys to edge definitions: a display label,
//! an optional ELK edge-type enum value, and extra ELK properties the
//! composer overlays onto the layout set's edge defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::canonical::checksum_of;
use crate::error::ValidationError;
use crate::settings::check_setting_key;
use crate::validate::{normalize_id, normalize_name, normalize_type_key};
use crate::SCHEMA_VERSION;

/// Maximum number of link types in one link set.
pub const MAX_LINK_TYPES: usize = 256;
/// Maximum number of ELK properties on one link type.
pub const MAX_ELK_PROPERTIES: usize = 256;

/// One link type's edge definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTypeDefinition {
    pub label: String,
    pub elk_edge_type: Option<String>,
    #[serde(default)]
    pub elk_properties: Map<String, Value>,
}

impl LinkTypeDefinition {
    fn normalized(&self) -> Result<Self, ValidationError> {
        let label = normalize_name(&self.label)?;
        let elk_edge_type = match &self.elk_edge_type {
            Some(raw) => Some(normalize_elk_edge_type(raw)?),
            None => None,
        };
        if self.elk_properties.len() > MAX_ELK_PROPERTIES {
            return Err(ValidationError::new(format!(
                "elkProperties exceed max size {MAX_ELK_PROPERTIES}."
            )));
        }
        for key in self.elk_properties.keys() {
            check_setting_key(key)?;
        }
        Ok(LinkTypeDefinition {
            label,
            elk_edge_type,
            elk_properties: self.elk_properties.clone(),
        })
    }
}

/// Normalizes an ELK edge-type value: uppercased, `^[A-Z_][A-Z0-9_]*$`.
pub fn normalize_elk_edge_type(value: &str) -> Result<String, ValidationError> {
    let normalized = value.trim().to_ascii_uppercase();
    let mut chars = normalized.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_uppercase() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if !head_ok || !tail_ok {
        return Err(ValidationError::new(format!(
            "Invalid elkEdgeType '{value}'. Use ^[A-Z_][A-Z0-9_]*$ (e.g. DIRECTED)."
        )));
    }
    Ok(normalized)
}

/// A fully-resolved link-set snapshot (draft or published).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSetBundle {
    pub schema_version: String,
    pub link_set_id: String,
    pub version: u32,
    pub name: String,
    pub entries: BTreeMap<String, LinkTypeDefinition>,
    pub updated_at: DateTime<Utc>,
    pub checksum: String,
}

impl LinkSetBundle {
    /// Builds a validated bundle at `version`, recomputing the checksum.
    pub fn build(
        link_set_id: &str,
        version: u32,
        name: &str,
        entries: &BTreeMap<String, LinkTypeDefinition>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let name = normalize_name(name)?;
        if entries.is_empty() {
            return Err(ValidationError::new("entries must not be empty."));
        }
        if entries.len() > MAX_LINK_TYPES {
            return Err(ValidationError::new(format!(
                "entries exceed max size {MAX_LINK_TYPES}."
            )));
        }
        let mut normalized = BTreeMap::new();
        for (key, definition) in entries {
            let key = normalize_type_key(key)?;
            if normalized.insert(key.clone(), definition.normalized()?).is_some() {
                return Err(ValidationError::new(format!(
                    "Duplicate link type key '{key}' after normalization."
                )));
            }
        }
        let checksum = checksum_of(&checksum_payload(&link_set_id, version, &name, &normalized));
        Ok(LinkSetBundle {
            schema_version: SCHEMA_VERSION.to_string(),
            link_set_id,
            version,
            name,
            entries: normalized,
            updated_at,
            checksum,
        })
    }

    /// Recomputes the checksum from the bundle's current fields.
    pub fn expected_checksum(&self) -> String {
        checksum_of(&checksum_payload(
            &self.link_set_id,
            self.version,
            &self.name,
            &self.entries,
        ))
    }

    /// Link type keys in sorted order.
    pub fn link_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

fn checksum_payload(
    link_set_id: &str,
    version: u32,
    name: &str,
    entries: &BTreeMap<String, LinkTypeDefinition>,
) -> Value {
    json!({
        "schemaVersion": SCHEMA_VERSION,
        "linkSetId": link_set_id,
        "linkSetVersion": version,
        "name": name,
        "entries": entries,
    })
}

/// Request body for creating a link set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkSetRequest {
    pub link_set_id: String,
    pub name: String,
    pub entries: BTreeMap<String, LinkTypeDefinition>,
}

/// Request body for replacing a link set's draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkSetRequest {
    pub name: String,
    pub entries: BTreeMap<String, LinkTypeDefinition>,
}
