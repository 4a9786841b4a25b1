//! Graph-type bundle contract and the pure composition step.
//!
//! A graph type references one published layout set, one-to-many
//! published icon sets, and one published link set, and derives a
//! runtime configuration from them: the resolved icon map, per-link-type
//! edge overrides, and the merged layout settings. Fetching the
//! referenced bundles is the store's job; everything after the fetch is
//! pure and lives here.
//!
//! Two checksums are derived. `runtimeChecksum` covers only the
//! functionally-consumed fields and identifies the configuration a
//! layout consumer actually receives; the outer `checksum` adds `name`,
//! `elkSettings`, and `runtimeChecksum` for full content identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::canonical::checksum_of;
use crate::error::ValidationError;
use crate::layout_set::LayoutSetBundle;
use crate::link_set::{LinkSetBundle, LinkTypeDefinition};
use crate::resolve::{IconConflictPolicy, IconResolution, IconSetSourceRef};
use crate::settings::{SettingsMap, SettingsValidator};
use crate::validate::{normalize_checksum, normalize_id, normalize_name};
use crate::SCHEMA_VERSION;

/// Maximum number of icon-set references on one graph type.
pub const MAX_ICON_SET_REFS: usize = 8;

/// Settings key under which the layout set carries its edge defaults.
pub const EDGE_DEFAULTS_KEY: &str = "edge_defaults";
/// ELK property set from a link type's `elkEdgeType`.
pub const ELK_EDGE_TYPE_PROPERTY: &str = "org.eclipse.elk.edge.type";

/// Reference to a published layout set, optionally pinned by checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSetRef {
    pub layout_set_id: String,
    pub layout_set_version: u32,
    pub checksum: Option<String>,
}

/// Reference to a published icon set, optionally pinned by checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSetRef {
    pub icon_set_id: String,
    pub icon_set_version: u32,
    pub checksum: Option<String>,
}

/// Reference to a published link set, optionally pinned by checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSetRef {
    pub link_set_id: String,
    pub link_set_version: u32,
    pub checksum: Option<String>,
}

fn normalize_ref_checksum(value: &Option<String>) -> Result<Option<String>, ValidationError> {
    match value {
        Some(raw) => Ok(Some(normalize_checksum(raw)?)),
        None => Ok(None),
    }
}

fn check_version(version: u32, field: &str) -> Result<(), ValidationError> {
    if version == 0 {
        return Err(ValidationError::new(format!("{field} must be >= 1.")));
    }
    Ok(())
}

/// The client-editable part of a graph type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTypeEditableFields {
    pub name: String,
    pub layout_set_ref: LayoutSetRef,
    pub icon_set_refs: Vec<IconSetRef>,
    pub link_set_ref: LinkSetRef,
    #[serde(default)]
    pub icon_conflict_policy: IconConflictPolicy,
}

impl GraphTypeEditableFields {
    /// Normalizes ids, versions, checksums, and the ref list; duplicate
    /// `(id, version)` icon-set refs are rejected.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let name = normalize_name(&self.name)?;
        let layout_set_ref = LayoutSetRef {
            layout_set_id: normalize_id(&self.layout_set_ref.layout_set_id, "layoutSetId")?,
            layout_set_version: self.layout_set_ref.layout_set_version,
            checksum: normalize_ref_checksum(&self.layout_set_ref.checksum)?,
        };
        check_version(layout_set_ref.layout_set_version, "layoutSetVersion")?;
        let link_set_ref = LinkSetRef {
            link_set_id: normalize_id(&self.link_set_ref.link_set_id, "linkSetId")?,
            link_set_version: self.link_set_ref.link_set_version,
            checksum: normalize_ref_checksum(&self.link_set_ref.checksum)?,
        };
        check_version(link_set_ref.link_set_version, "linkSetVersion")?;

        if self.icon_set_refs.is_empty() {
            return Err(ValidationError::new("iconSetRefs must not be empty."));
        }
        if self.icon_set_refs.len() > MAX_ICON_SET_REFS {
            return Err(ValidationError::new(format!(
                "iconSetRefs exceeds max size {MAX_ICON_SET_REFS}."
            )));
        }
        let mut icon_set_refs = Vec::with_capacity(self.icon_set_refs.len());
        let mut seen: Vec<(String, u32)> = Vec::new();
        for item in &self.icon_set_refs {
            let normalized = IconSetRef {
                icon_set_id: normalize_id(&item.icon_set_id, "iconSetId")?,
                icon_set_version: item.icon_set_version,
                checksum: normalize_ref_checksum(&item.checksum)?,
            };
            check_version(normalized.icon_set_version, "iconSetVersion")?;
            let identity = (normalized.icon_set_id.clone(), normalized.icon_set_version);
            if seen.contains(&identity) {
                return Err(ValidationError::new(format!(
                    "Duplicate iconset reference '{}@{}'.",
                    identity.0, identity.1
                )));
            }
            seen.push(identity);
            icon_set_refs.push(normalized);
        }

        Ok(GraphTypeEditableFields {
            name,
            layout_set_ref,
            icon_set_refs,
            link_set_ref,
            icon_conflict_policy: self.icon_conflict_policy,
        })
    }
}

/// A fully-composed graph-type snapshot (draft or published).
///
/// The refs are pinned: their checksums are filled in from the bundles
/// actually fetched at composition time, regardless of whether the
/// request pinned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTypeBundle {
    pub schema_version: String,
    pub graph_type_id: String,
    pub version: u32,
    pub name: String,
    pub layout_set_ref: LayoutSetRef,
    pub icon_set_refs: Vec<IconSetRef>,
    pub link_set_ref: LinkSetRef,
    pub icon_conflict_policy: IconConflictPolicy,
    pub node_types: Vec<String>,
    pub link_types: Vec<String>,
    pub type_icon_map: BTreeMap<String, String>,
    pub edge_type_overrides: BTreeMap<String, Map<String, Value>>,
    pub icon_set_resolution_checksum: String,
    pub runtime_checksum: String,
    pub elk_settings: SettingsMap,
    pub updated_at: DateTime<Utc>,
    pub checksum: String,
}

impl GraphTypeBundle {
    /// Composes a bundle from already-fetched referenced bundles and an
    /// already-computed icon resolution.
    ///
    /// `editable` must be normalized. The only failure mode left at this
    /// point is the merged settings map being refused by the layout
    /// engine's validator, which indicates a composition bug rather than
    /// bad user input.
    pub fn compose(
        graph_type_id: &str,
        version: u32,
        editable: &GraphTypeEditableFields,
        layout: &LayoutSetBundle,
        link: &LinkSetBundle,
        resolution: &IconResolution,
        validator: &dyn SettingsValidator,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let edge_defaults = match layout.elk_settings.get(EDGE_DEFAULTS_KEY) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let edge_type_overrides = build_edge_type_overrides(&edge_defaults, &link.entries);

        let mut elk_settings = layout.elk_settings.clone();
        elk_settings.insert(
            "type_icon_map".to_string(),
            json!(resolution.resolved_entries),
        );
        elk_settings.insert(
            "edge_type_overrides".to_string(),
            json!(edge_type_overrides),
        );
        let elk_settings = validator.validate(&elk_settings)?;

        let layout_set_ref = LayoutSetRef {
            layout_set_id: layout.layout_set_id.clone(),
            layout_set_version: layout.version,
            checksum: Some(layout.checksum.clone()),
        };
        let icon_set_refs: Vec<IconSetRef> = resolution
            .sources
            .iter()
            .map(|source| IconSetRef {
                icon_set_id: source.icon_set_id.clone(),
                icon_set_version: source.icon_set_version,
                checksum: Some(source.checksum.clone()),
            })
            .collect();
        let link_set_ref = LinkSetRef {
            link_set_id: link.link_set_id.clone(),
            link_set_version: link.version,
            checksum: Some(link.checksum.clone()),
        };

        let mut bundle = GraphTypeBundle {
            schema_version: SCHEMA_VERSION.to_string(),
            graph_type_id: graph_type_id.to_string(),
            version,
            name: editable.name.clone(),
            layout_set_ref,
            icon_set_refs,
            link_set_ref,
            icon_conflict_policy: editable.icon_conflict_policy,
            node_types: resolution.node_types(),
            link_types: link.link_types(),
            type_icon_map: resolution.resolved_entries.clone(),
            edge_type_overrides,
            icon_set_resolution_checksum: resolution.checksum.clone(),
            runtime_checksum: String::new(),
            elk_settings,
            updated_at,
            checksum: String::new(),
        };
        bundle.runtime_checksum = checksum_of(&bundle.runtime_payload());
        bundle.checksum = checksum_of(&bundle.full_payload());
        Ok(bundle)
    }

    /// Canonical payload behind `runtimeChecksum`.
    pub fn runtime_payload(&self) -> Value {
        json!({
            "schemaVersion": SCHEMA_VERSION,
            "graphTypeId": self.graph_type_id,
            "graphTypeVersion": self.version,
            "layoutSetRef": self.layout_set_ref,
            "iconSetRefs": self.icon_set_refs,
            "linkSetRef": self.link_set_ref,
            "iconConflictPolicy": self.icon_conflict_policy,
            "nodeTypes": self.node_types,
            "linkTypes": self.link_types,
            "typeIconMap": self.type_icon_map,
            "edgeTypeOverrides": self.edge_type_overrides,
            "iconSetResolutionChecksum": self.icon_set_resolution_checksum,
        })
    }

    /// Canonical payload behind the outer `checksum`.
    pub fn full_payload(&self) -> Value {
        let mut payload = self.runtime_payload();
        if let Value::Object(map) = &mut payload {
            map.insert("name".to_string(), json!(self.name));
            map.insert("elkSettings".to_string(), json!(self.elk_settings));
            map.insert("runtimeChecksum".to_string(), json!(self.runtime_checksum));
        }
        payload
    }

    /// Recomputes the outer checksum from the bundle's current fields.
    pub fn expected_checksum(&self) -> String {
        checksum_of(&self.full_payload())
    }

    /// The editable projection of this bundle, used when a stored
    /// bundle is replayed through composition.
    pub fn editable_fields(&self) -> GraphTypeEditableFields {
        GraphTypeEditableFields {
            name: self.name.clone(),
            layout_set_ref: self.layout_set_ref.clone(),
            icon_set_refs: self.icon_set_refs.clone(),
            link_set_ref: self.link_set_ref.clone(),
            icon_conflict_policy: self.icon_conflict_policy,
        }
    }
}

/// Builds the per-link-type edge overrides: a deep copy of the layout
/// set's edge defaults, with the ELK edge-type property set from
/// `elkEdgeType` and the link type's own properties applied on top.
pub fn build_edge_type_overrides(
    base_edge_defaults: &Map<String, Value>,
    link_entries: &BTreeMap<String, LinkTypeDefinition>,
) -> BTreeMap<String, Map<String, Value>> {
    let mut overrides = BTreeMap::new();
    for (key, definition) in link_entries {
        let mut payload = base_edge_defaults.clone();
        let mut properties = match payload.get("properties") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        if let Some(edge_type) = &definition.elk_edge_type {
            properties.insert(ELK_EDGE_TYPE_PROPERTY.to_string(), json!(edge_type));
        }
        for (prop_key, prop_value) in &definition.elk_properties {
            properties.insert(prop_key.clone(), prop_value.clone());
        }
        payload.insert("properties".to_string(), Value::Object(properties));
        overrides.insert(key.clone(), payload);
    }
    overrides
}

/// Canonical payload and checksum for the autocomplete catalog derived
/// from a graph-type bundle.
pub fn autocomplete_payload(bundle: &GraphTypeBundle) -> Value {
    json!({
        "schemaVersion": SCHEMA_VERSION,
        "graphTypeId": bundle.graph_type_id,
        "graphTypeVersion": bundle.version,
        "graphTypeChecksum": bundle.checksum,
        "runtimeChecksum": bundle.runtime_checksum,
        "iconSetResolutionChecksum": bundle.icon_set_resolution_checksum,
        "nodeTypes": bundle.node_types,
        "linkTypes": bundle.link_types,
    })
}

/// Runtime view of a graph type with the icon resolution re-run live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTypeRuntime {
    pub schema_version: String,
    pub graph_type_id: String,
    pub graph_type_version: u32,
    pub graph_type_checksum: String,
    pub runtime_checksum: String,
    pub conflict_policy: IconConflictPolicy,
    pub resolved_entries: BTreeMap<String, String>,
    pub sources: Vec<IconSetSourceRef>,
    pub key_sources: BTreeMap<String, crate::resolve::NodeTypeSource>,
    pub link_types: Vec<String>,
    pub edge_type_overrides: BTreeMap<String, Map<String, Value>>,
    pub checksum: String,
}

/// Autocomplete catalog for one graph-type bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteCatalog {
    pub schema_version: String,
    pub graph_type_id: String,
    pub graph_type_version: u32,
    pub graph_type_checksum: String,
    pub runtime_checksum: String,
    pub icon_set_resolution_checksum: String,
    pub checksum: String,
    pub node_types: Vec<String>,
    pub link_types: Vec<String>,
}

impl AutocompleteCatalog {
    pub fn from_bundle(bundle: &GraphTypeBundle) -> Self {
        AutocompleteCatalog {
            schema_version: SCHEMA_VERSION.to_string(),
            graph_type_id: bundle.graph_type_id.clone(),
            graph_type_version: bundle.version,
            graph_type_checksum: bundle.checksum.clone(),
            runtime_checksum: bundle.runtime_checksum.clone(),
            icon_set_resolution_checksum: bundle.icon_set_resolution_checksum.clone(),
            checksum: checksum_of(&autocomplete_payload(bundle)),
            node_types: bundle.node_types.clone(),
            link_types: bundle.link_types.clone(),
        }
    }
}

/// Request body for creating a graph type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGraphTypeRequest {
    pub graph_type_id: String,
    #[serde(flatten)]
    pub editable: GraphTypeEditableFields,
}

/// Request body for replacing a graph type's draft.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGraphTypeRequest {
    #[serde(flatten)]
    pub editable: GraphTypeEditableFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon_set::IconSetBundle;
    use crate::resolve::merge_icon_sets;
    use crate::settings::ElkSettingsValidator;

    fn layout_bundle() -> LayoutSetBundle {
        let mut settings = SettingsMap::new();
        settings.insert("elk.algorithm".into(), json!("layered"));
        settings.insert(
            EDGE_DEFAULTS_KEY.into(),
            json!({"properties": {"org.eclipse.elk.edge.thickness": 1}}),
        );
        LayoutSetBundle::build(
            "default",
            1,
            "Default",
            &settings,
            &ElkSettingsValidator,
            Utc::now(),
        )
        .unwrap()
    }

    fn link_bundle() -> LinkSetBundle {
        let mut entries = BTreeMap::new();
        entries.insert(
            "directed".to_string(),
            LinkTypeDefinition {
                label: "Directed".to_string(),
                elk_edge_type: Some("DIRECTED".to_string()),
                elk_properties: Map::new(),
            },
        );
        entries.insert(
            "none".to_string(),
            LinkTypeDefinition {
                label: "None".to_string(),
                elk_edge_type: None,
                elk_properties: Map::new(),
            },
        );
        LinkSetBundle::build("default", 1, "Default", &entries, Utc::now()).unwrap()
    }

    fn icon_bundle() -> IconSetBundle {
        let entries = [
            ("router".to_string(), "mdi:router".to_string()),
            ("gateway".to_string(), "mdi:gate".to_string()),
        ]
        .into_iter()
        .collect();
        IconSetBundle::build("telecom", 1, "Telecom", &entries, Utc::now()).unwrap()
    }

    fn editable(icon: &IconSetBundle, layout: &LayoutSetBundle, link: &LinkSetBundle) -> GraphTypeEditableFields {
        GraphTypeEditableFields {
            name: "Telecom".to_string(),
            layout_set_ref: LayoutSetRef {
                layout_set_id: layout.layout_set_id.clone(),
                layout_set_version: layout.version,
                checksum: None,
            },
            icon_set_refs: vec![IconSetRef {
                icon_set_id: icon.icon_set_id.clone(),
                icon_set_version: icon.version,
                checksum: None,
            }],
            link_set_ref: LinkSetRef {
                link_set_id: link.link_set_id.clone(),
                link_set_version: link.version,
                checksum: None,
            },
            icon_conflict_policy: IconConflictPolicy::Reject,
        }
    }

    fn composed() -> GraphTypeBundle {
        let layout = layout_bundle();
        let link = link_bundle();
        let icon = icon_bundle();
        let resolution =
            merge_icon_sets(std::slice::from_ref(&icon), IconConflictPolicy::Reject).unwrap();
        GraphTypeBundle::compose(
            "telecom",
            1,
            &editable(&icon, &layout, &link),
            &layout,
            &link,
            &resolution,
            &ElkSettingsValidator,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn node_types_match_type_icon_map_keys() {
        let bundle = composed();
        let mut map_keys: Vec<String> = bundle.type_icon_map.keys().cloned().collect();
        map_keys.sort();
        assert_eq!(bundle.node_types, map_keys);
        assert_eq!(bundle.node_types, vec!["gateway", "router"]);
    }

    #[test]
    fn refs_are_pinned_to_fetched_checksums() {
        let bundle = composed();
        assert_eq!(
            bundle.layout_set_ref.checksum.as_deref(),
            Some(layout_bundle().checksum.as_str())
        );
        assert!(bundle.icon_set_refs[0].checksum.is_some());
        assert!(bundle.link_set_ref.checksum.is_some());
    }

    #[test]
    fn merged_settings_carry_reserved_keys() {
        let bundle = composed();
        assert!(bundle.elk_settings.contains_key("type_icon_map"));
        assert!(bundle.elk_settings.contains_key("edge_type_overrides"));
        assert_eq!(bundle.elk_settings["elk.algorithm"], json!("layered"));
    }

    #[test]
    fn edge_overrides_layer_properties_over_defaults() {
        let defaults: Map<String, Value> =
            serde_json::from_value(json!({"properties": {"org.eclipse.elk.edge.thickness": 1}}))
                .unwrap();
        let mut properties = Map::new();
        properties.insert("org.eclipse.elk.edge.thickness".to_string(), json!(3));
        let mut entries = BTreeMap::new();
        entries.insert(
            "dependency".to_string(),
            LinkTypeDefinition {
                label: "Dependency".to_string(),
                elk_edge_type: Some("DIRECTED".to_string()),
                elk_properties: properties,
            },
        );
        let overrides = build_edge_type_overrides(&defaults, &entries);
        let dependency = &overrides["dependency"]["properties"];
        assert_eq!(dependency["org.eclipse.elk.edge.type"], json!("DIRECTED"));
        assert_eq!(dependency["org.eclipse.elk.edge.thickness"], json!(3));
    }

    #[test]
    fn checksums_are_reproducible() {
        let bundle = composed();
        assert_eq!(bundle.checksum, bundle.expected_checksum());
        assert_eq!(bundle.runtime_checksum, checksum_of(&bundle.runtime_payload()));
        assert_ne!(bundle.runtime_checksum, bundle.checksum);
    }

    #[test]
    fn runtime_checksum_ignores_name() {
        let layout = layout_bundle();
        let link = link_bundle();
        let icon = icon_bundle();
        let resolution =
            merge_icon_sets(std::slice::from_ref(&icon), IconConflictPolicy::Reject).unwrap();
        let mut fields = editable(&icon, &layout, &link);
        let a = GraphTypeBundle::compose(
            "telecom", 1, &fields, &layout, &link, &resolution,
            &ElkSettingsValidator, Utc::now(),
        )
        .unwrap();
        fields.name = "Renamed".to_string();
        let b = GraphTypeBundle::compose(
            "telecom", 1, &fields, &layout, &link, &resolution,
            &ElkSettingsValidator, Utc::now(),
        )
        .unwrap();
        assert_eq!(a.runtime_checksum, b.runtime_checksum);
        assert_ne!(a.checksum, b.checksum);
    }

    #[test]
    fn normalized_rejects_duplicate_icon_set_refs() {
        let layout = layout_bundle();
        let link = link_bundle();
        let icon = icon_bundle();
        let mut fields = editable(&icon, &layout, &link);
        fields.icon_set_refs.push(fields.icon_set_refs[0].clone());
        assert!(fields.normalized().unwrap_err().message.contains("Duplicate"));
    }

    #[test]
    fn normalized_rejects_zero_versions() {
        let layout = layout_bundle();
        let link = link_bundle();
        let icon = icon_bundle();
        let mut fields = editable(&icon, &layout, &link);
        fields.layout_set_ref.layout_set_version = 0;
        assert!(fields.normalized().is_err());
    }

    #[test]
    fn autocomplete_catalog_reuses_bundle_checksums() {
        let bundle = composed();
        let catalog = AutocompleteCatalog::from_bundle(&bundle);
        assert_eq!(catalog.graph_type_checksum, bundle.checksum);
        assert_eq!(catalog.runtime_checksum, bundle.runtime_checksum);
        assert_eq!(catalog.node_types, bundle.node_types);
        assert_eq!(catalog.checksum.len(), 64);
    }
}
