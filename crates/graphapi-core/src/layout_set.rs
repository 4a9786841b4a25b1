//! Layout-set bundle contract.
//!
//! A layout set carries an opaque `elkSettings` map consumed by the
//! layout engine. Two keys are reserved for the graph-type composer and
//! rejected on direct edit. Validation of the option values themselves
//! is delegated to a [`SettingsValidator`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical::checksum_of;
use crate::error::ValidationError;
use crate::settings::{SettingsMap, SettingsValidator, RESERVED_SETTING_KEYS};
use crate::validate::{normalize_id, normalize_name};
use crate::SCHEMA_VERSION;

/// A fully-resolved layout-set snapshot (draft or published).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSetBundle {
    pub schema_version: String,
    pub layout_set_id: String,
    pub version: u32,
    pub name: String,
    pub elk_settings: SettingsMap,
    pub updated_at: DateTime<Utc>,
    pub checksum: String,
}

impl LayoutSetBundle {
    /// Builds a validated bundle at `version`, recomputing the checksum.
    /// Reserved keys are rejected; the remaining map must pass the
    /// layout engine's validator.
    pub fn build(
        layout_set_id: &str,
        version: u32,
        name: &str,
        elk_settings: &SettingsMap,
        validator: &dyn SettingsValidator,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let name = normalize_name(name)?;
        if elk_settings.is_empty() {
            return Err(ValidationError::new("elkSettings must not be empty."));
        }
        for reserved in RESERVED_SETTING_KEYS {
            if elk_settings.contains_key(reserved) {
                return Err(ValidationError::new(format!(
                    "elkSettings key '{reserved}' is reserved and managed by graph types."
                )));
            }
        }
        let elk_settings = validator.validate(elk_settings)?;
        let checksum = checksum_of(&checksum_payload(
            &layout_set_id,
            version,
            &name,
            &elk_settings,
        ));
        Ok(LayoutSetBundle {
            schema_version: SCHEMA_VERSION.to_string(),
            layout_set_id,
            version,
            name,
            elk_settings,
            updated_at,
            checksum,
        })
    }

    /// Recomputes the checksum from the bundle's current fields.
    pub fn expected_checksum(&self) -> String {
        checksum_of(&checksum_payload(
            &self.layout_set_id,
            self.version,
            &self.name,
            &self.elk_settings,
        ))
    }
}

fn checksum_payload(
    layout_set_id: &str,
    version: u32,
    name: &str,
    elk_settings: &SettingsMap,
) -> Value {
    json!({
        "schemaVersion": SCHEMA_VERSION,
        "layoutSetId": layout_set_id,
        "layoutSetVersion": version,
        "name": name,
        "elkSettings": elk_settings,
    })
}

/// Request body for creating a layout set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLayoutSetRequest {
    pub layout_set_id: String,
    pub name: String,
    pub elk_settings: SettingsMap,
}

/// Request body for replacing a layout set's draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLayoutSetRequest {
    pub name: String,
    pub elk_settings: SettingsMap,
}

/// Request body for upserting a single layout setting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLayoutSettingRequest {
    pub value: Value,
}
