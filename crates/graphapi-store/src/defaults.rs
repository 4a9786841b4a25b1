//! Built-in default resources seeded at startup.
//!
//! Every fresh database gets one resource of each kind under the id
//! `default`, published at version 1, so a client can render a graph
//! without any prior setup. Seeding is idempotent: existing resources
//! are left exactly as they are.

use std::collections::BTreeMap;

use serde_json::{json, Map};

use graphapi_core::graph_type::{
    CreateGraphTypeRequest, GraphTypeEditableFields, IconSetRef, LayoutSetRef, LinkSetRef,
};
use graphapi_core::icon_set::CreateIconSetRequest;
use graphapi_core::layout_set::CreateLayoutSetRequest;
use graphapi_core::link_set::{CreateLinkSetRequest, LinkTypeDefinition};
use graphapi_core::resolve::IconConflictPolicy;
use graphapi_core::theme::CreateThemeRequest;
use graphapi_core::SettingsMap;

use crate::error::StoreError;
use crate::Stores;

pub const DEFAULT_ID: &str = "default";

pub fn default_icon_set_request() -> CreateIconSetRequest {
    let entries: BTreeMap<String, String> = [
        ("node", "mdi:circle-outline"),
        ("process", "mdi:cog-outline"),
        ("datastore", "mdi:database-outline"),
        ("service", "mdi:cloud-outline"),
        ("user", "mdi:account-outline"),
        ("external", "mdi:web"),
    ]
    .into_iter()
    .map(|(key, icon)| (key.to_string(), icon.to_string()))
    .collect();
    CreateIconSetRequest {
        icon_set_id: DEFAULT_ID.to_string(),
        name: "Default Node Type Iconset".to_string(),
        entries,
    }
}

pub fn default_layout_set_request() -> CreateLayoutSetRequest {
    let mut elk_settings = SettingsMap::new();
    elk_settings.insert("elk.algorithm".to_string(), json!("layered"));
    elk_settings.insert("elk.direction".to_string(), json!("DOWN"));
    elk_settings.insert("elk.spacing.nodeNode".to_string(), json!(40));
    elk_settings.insert(
        "elk.layered.spacing.nodeNodeBetweenLayers".to_string(),
        json!(60),
    );
    elk_settings.insert(
        "edge_defaults".to_string(),
        json!({
            "routing": "ORTHOGONAL",
            "properties": {
                "org.eclipse.elk.edge.thickness": 1,
            },
        }),
    );
    CreateLayoutSetRequest {
        layout_set_id: DEFAULT_ID.to_string(),
        name: "Default Layout Set".to_string(),
        elk_settings,
    }
}

pub fn default_link_set_request() -> CreateLinkSetRequest {
    fn definition(label: &str, edge_type: &str, thickness: Option<u32>) -> LinkTypeDefinition {
        let mut elk_properties = Map::new();
        if let Some(thickness) = thickness {
            elk_properties.insert(
                "org.eclipse.elk.edge.thickness".to_string(),
                json!(thickness),
            );
        }
        LinkTypeDefinition {
            label: label.to_string(),
            elk_edge_type: Some(edge_type.to_string()),
            elk_properties,
        }
    }
    let entries: BTreeMap<String, LinkTypeDefinition> = [
        ("directed".to_string(), definition("Directed", "DIRECTED", None)),
        ("undirected".to_string(), definition("Undirected", "UNDIRECTED", None)),
        ("association".to_string(), definition("Association", "UNDIRECTED", Some(1))),
        ("dependency".to_string(), definition("Dependency", "DIRECTED", Some(1))),
        ("generalization".to_string(), definition("Generalization", "DIRECTED", Some(1))),
        ("none".to_string(), definition("None", "UNDIRECTED", Some(1))),
    ]
    .into_iter()
    .collect();
    CreateLinkSetRequest {
        link_set_id: DEFAULT_ID.to_string(),
        name: "Default Link Set".to_string(),
        entries,
    }
}

pub fn default_graph_type_request() -> CreateGraphTypeRequest {
    CreateGraphTypeRequest {
        graph_type_id: DEFAULT_ID.to_string(),
        editable: GraphTypeEditableFields {
            name: "Default Graph Type".to_string(),
            layout_set_ref: LayoutSetRef {
                layout_set_id: DEFAULT_ID.to_string(),
                layout_set_version: 1,
                checksum: None,
            },
            icon_set_refs: vec![IconSetRef {
                icon_set_id: DEFAULT_ID.to_string(),
                icon_set_version: 1,
                checksum: None,
            }],
            link_set_ref: LinkSetRef {
                link_set_id: DEFAULT_ID.to_string(),
                link_set_version: 1,
                checksum: None,
            },
            icon_conflict_policy: IconConflictPolicy::Reject,
        },
    }
}

pub fn default_theme_request() -> CreateThemeRequest {
    let css_body = "\
.node > rect {
  fill: Canvas;
  stroke: CanvasText;
}
.node text {
  fill: CanvasText;
}
.edge path {
  stroke: CanvasText;
}
.edge text {
  fill: CanvasText;
}
";
    CreateThemeRequest {
        theme_id: DEFAULT_ID.to_string(),
        name: "Default Render Theme".to_string(),
        css_body: css_body.to_string(),
        variables: BTreeMap::new(),
    }
}

/// Seeds all five default resources. The graph type goes last since it
/// references the published defaults of the other set kinds.
pub fn bootstrap(stores: &Stores) -> Result<(), StoreError> {
    tracing::info!("seeding default resources");
    stores.icon_sets.ensure_default(&default_icon_set_request())?;
    stores.layout_sets.ensure_default(&default_layout_set_request())?;
    stores.link_sets.ensure_default(&default_link_set_request())?;
    stores.graph_types.ensure_default(&default_graph_type_request())?;
    stores.themes.ensure_default(&default_theme_request())?;
    Ok(())
}
