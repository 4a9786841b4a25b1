//! Icon-set bundle contract.
//!
//! An icon set maps node type keys to iconify-style icon names. The
//! bundle checksum is computed over `{schemaVersion, iconSetId,
//! iconSetVersion, name, entries}`; `updatedAt` and the checksum itself
//! are never hash inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::canonical::checksum_of;
use crate::error::ValidationError;
use crate::validate::{normalize_iconify_name, normalize_id, normalize_name, normalize_type_key};
use crate::SCHEMA_VERSION;

/// Maximum number of entries in one icon set.
pub const MAX_ICON_SET_ENTRIES: usize = 2000;

/// A fully-resolved icon-set snapshot (draft or published).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSetBundle {
    pub schema_version: String,
    pub icon_set_id: String,
    pub version: u32,
    pub name: String,
    pub entries: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
    pub checksum: String,
}

impl IconSetBundle {
    /// Builds a validated bundle at `version`, recomputing the checksum.
    pub fn build(
        icon_set_id: &str,
        version: u32,
        name: &str,
        entries: &BTreeMap<String, String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let icon_set_id = normalize_id(icon_set_id, "iconSetId")?;
        let name = normalize_name(name)?;
        let entries = normalize_entries(entries)?;
        let checksum = checksum_of(&checksum_payload(&icon_set_id, version, &name, &entries));
        Ok(IconSetBundle {
            schema_version: SCHEMA_VERSION.to_string(),
            icon_set_id,
            version,
            name,
            entries,
            updated_at,
            checksum,
        })
    }

    /// Recomputes the checksum from the bundle's current fields.
    pub fn expected_checksum(&self) -> String {
        checksum_of(&checksum_payload(
            &self.icon_set_id,
            self.version,
            &self.name,
            &self.entries,
        ))
    }
}

fn checksum_payload(
    icon_set_id: &str,
    version: u32,
    name: &str,
    entries: &BTreeMap<String, String>,
) -> Value {
    json!({
        "schemaVersion": SCHEMA_VERSION,
        "iconSetId": icon_set_id,
        "iconSetVersion": version,
        "name": name,
        "entries": entries,
    })
}

fn normalize_entries(
    entries: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ValidationError> {
    if entries.is_empty() {
        return Err(ValidationError::new("entries must not be empty."));
    }
    if entries.len() > MAX_ICON_SET_ENTRIES {
        return Err(ValidationError::new(format!(
            "entries exceed max size {MAX_ICON_SET_ENTRIES}."
        )));
    }
    let mut normalized = BTreeMap::new();
    for (key, icon) in entries {
        let key = normalize_type_key(key)?;
        let icon = normalize_iconify_name(icon)?;
        if normalized.insert(key.clone(), icon).is_some() {
            return Err(ValidationError::new(format!(
                "Duplicate type key '{key}' after normalization."
            )));
        }
    }
    Ok(normalized)
}

/// Request body for creating an icon set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIconSetRequest {
    pub icon_set_id: String,
    pub name: String,
    pub entries: BTreeMap<String, String>,
}

/// Request body for replacing an icon set's draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIconSetRequest {
    pub name: String,
    pub entries: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn build_normalizes_keys_and_icons() {
        let bundle = IconSetBundle::build(
            "Telecom",
            1,
            " Telecom ",
            &entries(&[("Router", "MDI:Router"), ("gateway", "mdi:gate")]),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(bundle.icon_set_id, "telecom");
        assert_eq!(bundle.name, "Telecom");
        assert_eq!(bundle.entries["router"], "mdi:router");
        assert_eq!(bundle.entries["gateway"], "mdi:gate");
        assert_eq!(bundle.checksum, bundle.expected_checksum());
    }

    #[test]
    fn build_rejects_empty_entries() {
        let err = IconSetBundle::build("telecom", 1, "Telecom", &BTreeMap::new(), Utc::now())
            .unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn build_rejects_colliding_normalized_keys() {
        let err = IconSetBundle::build(
            "telecom",
            1,
            "Telecom",
            &entries(&[("Router", "mdi:router"), ("router", "mdi:router-wireless")]),
            Utc::now(),
        )
        .unwrap_err();
        assert!(err.message.contains("Duplicate"));
    }

    #[test]
    fn checksum_is_stable_across_updated_at() {
        let map = entries(&[("router", "mdi:router")]);
        let a = IconSetBundle::build("telecom", 3, "Telecom", &map, Utc::now()).unwrap();
        let b = IconSetBundle::build("telecom", 3, "Telecom", &map, Utc::now()).unwrap();
        assert_eq!(a.checksum, b.checksum);
    }

    #[test]
    fn checksum_changes_with_version() {
        let map = entries(&[("router", "mdi:router")]);
        let a = IconSetBundle::build("telecom", 1, "Telecom", &map, Utc::now()).unwrap();
        let b = IconSetBundle::build("telecom", 2, "Telecom", &map, Utc::now()).unwrap();
        assert_ne!(a.checksum, b.checksum);
    }
}
