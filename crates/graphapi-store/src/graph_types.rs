//! Versioned graph-type store and the reference-resolving composer.
//!
//! Create and update requests carry only editable fields; this store
//! fetches the referenced published layout set, icon sets, and link set,
//! runs the icon resolution, and persists the composed bundle from
//! [`GraphTypeBundle::compose`]. Reference failures keep their cause:
//! an unresolvable ref is a 404, a stale checksum pin is a 409, and a
//! composition the layout validator refuses is a 500 since it can only
//! arise from a composer bug.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use graphapi_core::graph_type::{
    AutocompleteCatalog, CreateGraphTypeRequest, GraphTypeBundle, GraphTypeEditableFields,
    GraphTypeRuntime, UpdateGraphTypeRequest,
};
use graphapi_core::icon_set::IconSetBundle;
use graphapi_core::resolve::IconResolution;
use graphapi_core::validate::normalize_id;
use graphapi_core::{ElkSettingsValidator, Stage, SCHEMA_VERSION};

use crate::db::Database;
use crate::error::StoreError;
use crate::icon_sets::IconSetStore;
use crate::layout_sets::LayoutSetStore;
use crate::link_sets::LinkSetStore;
use crate::migrate::parse_timestamp;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTypeSummary {
    pub schema_version: String,
    pub graph_type_id: String,
    pub name: String,
    pub draft_version: u32,
    pub published_version: Option<u32>,
    pub updated_at: chrono::DateTime<Utc>,
    pub checksum: String,
    pub runtime_checksum: String,
    pub icon_set_resolution_checksum: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTypeRecord {
    pub schema_version: String,
    pub graph_type_id: String,
    pub draft: GraphTypeBundle,
    pub published_versions: Vec<GraphTypeBundle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTypeListResponse {
    pub graph_types: Vec<GraphTypeSummary>,
}

/// SQLite-backed graph-type store.
pub struct GraphTypeStore {
    db: Database,
    icon_sets: Arc<IconSetStore>,
    layout_sets: Arc<LayoutSetStore>,
    link_sets: Arc<LinkSetStore>,
    lock: Mutex<()>,
}

impl GraphTypeStore {
    pub fn new(
        db: Database,
        icon_sets: Arc<IconSetStore>,
        layout_sets: Arc<LayoutSetStore>,
        link_sets: Arc<LinkSetStore>,
    ) -> Self {
        GraphTypeStore {
            db,
            icon_sets,
            layout_sets,
            link_sets,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Composition
    // -----------------------------------------------------------------------

    /// Fetches the pinned published icon sets and merges them, sharing
    /// the fetch and failure mapping with the preview endpoint.
    fn resolve_icon_sets(
        &self,
        editable: &GraphTypeEditableFields,
    ) -> Result<(Vec<IconSetBundle>, IconResolution), StoreError> {
        crate::resolve::fetch_and_merge(
            &self.icon_sets,
            &editable.icon_set_refs,
            editable.icon_conflict_policy,
        )
    }

    /// Fetches the pinned references, resolves icons, and composes the
    /// bundle at `version`.
    fn compose(
        &self,
        graph_type_id: &str,
        version: u32,
        editable: &GraphTypeEditableFields,
    ) -> Result<GraphTypeBundle, StoreError> {
        let editable = editable.normalized()?;
        let layout_ref = &editable.layout_set_ref;
        let layout = self
            .layout_sets
            .get_bundle(
                &layout_ref.layout_set_id,
                Stage::Published,
                Some(layout_ref.layout_set_version),
            )
            .map_err(|cause| {
                StoreError::not_found(
                    "GRAPH_TYPE_LAYOUT_SET_REF_INVALID",
                    format!(
                        "Layoutset reference '{}@{}' cannot be resolved.",
                        layout_ref.layout_set_id, layout_ref.layout_set_version
                    ),
                )
                .with_details(json!({
                    "layoutSetId": layout_ref.layout_set_id,
                    "layoutSetVersion": layout_ref.layout_set_version,
                    "cause": cause.code,
                }))
            })?;
        if let Some(pinned) = &layout_ref.checksum {
            if *pinned != layout.checksum {
                return Err(StoreError::conflict(
                    "GRAPH_TYPE_LAYOUT_SET_REF_INVALID",
                    format!(
                        "Layoutset reference '{}@{}' does not match its pinned checksum.",
                        layout_ref.layout_set_id, layout_ref.layout_set_version
                    ),
                )
                .with_details(json!({
                    "layoutSetId": layout_ref.layout_set_id,
                    "layoutSetVersion": layout_ref.layout_set_version,
                    "expectedChecksum": pinned,
                    "actualChecksum": layout.checksum,
                })));
            }
        }

        let link_ref = &editable.link_set_ref;
        let link = self
            .link_sets
            .get_bundle(
                &link_ref.link_set_id,
                Stage::Published,
                Some(link_ref.link_set_version),
            )
            .map_err(|cause| {
                StoreError::not_found(
                    "GRAPH_TYPE_LINK_SET_REF_INVALID",
                    format!(
                        "Linkset reference '{}@{}' cannot be resolved.",
                        link_ref.link_set_id, link_ref.link_set_version
                    ),
                )
                .with_details(json!({
                    "linkSetId": link_ref.link_set_id,
                    "linkSetVersion": link_ref.link_set_version,
                    "cause": cause.code,
                }))
            })?;
        if let Some(pinned) = &link_ref.checksum {
            if *pinned != link.checksum {
                return Err(StoreError::conflict(
                    "GRAPH_TYPE_LINK_SET_REF_INVALID",
                    format!(
                        "Linkset reference '{}@{}' does not match its pinned checksum.",
                        link_ref.link_set_id, link_ref.link_set_version
                    ),
                )
                .with_details(json!({
                    "linkSetId": link_ref.link_set_id,
                    "linkSetVersion": link_ref.link_set_version,
                    "expectedChecksum": pinned,
                    "actualChecksum": link.checksum,
                })));
            }
        }

        let (_bundles, resolution) = self.resolve_icon_sets(&editable)?;
        GraphTypeBundle::compose(
            graph_type_id,
            version,
            &editable,
            &layout,
            &link,
            &resolution,
            &ElkSettingsValidator,
            Utc::now(),
        )
        .map_err(|err| {
            StoreError::fatal(
                "GRAPH_TYPE_RUNTIME_INVALID",
                format!("Composed graph type '{graph_type_id}' is invalid: {}", err.message),
            )
            .with_details(json!({"graphTypeId": graph_type_id}))
        })
    }

    // -----------------------------------------------------------------------
    // Public contract
    // -----------------------------------------------------------------------

    pub fn ensure_default(&self, request: &CreateGraphTypeRequest) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let graph_type_id = normalize_id(&request.graph_type_id, "graphTypeId")?;
        if self.draft_row(&conn, &graph_type_id)?.is_some() {
            return Ok(());
        }
        let bundle = self.compose(&graph_type_id, 1, &request.editable)?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        insert_published(&tx, &bundle)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list(&self) -> Result<GraphTypeListResponse, StoreError> {
        let conn = self.db.connect()?;
        let mut statement = conn.prepare(
            "SELECT g.graph_type_id, g.name, g.draft_version, g.draft_updated_at,
                    g.draft_checksum, g.draft_runtime_checksum,
                    g.draft_icon_set_resolution_checksum,
                    (SELECT MAX(version) FROM graph_type_published_versions p
                     WHERE p.graph_type_id = g.graph_type_id)
             FROM graph_types g ORDER BY g.graph_type_id",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<u32>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut graph_types = Vec::with_capacity(rows.len());
        for (
            graph_type_id,
            name,
            draft_version,
            updated_at,
            checksum,
            runtime_checksum,
            resolution_checksum,
            published,
        ) in rows
        {
            graph_types.push(GraphTypeSummary {
                schema_version: SCHEMA_VERSION.to_string(),
                updated_at: parse_timestamp(&updated_at)
                    .map_err(|err| corrupted(&graph_type_id, &err))?,
                graph_type_id,
                name,
                draft_version,
                published_version: published,
                checksum,
                runtime_checksum,
                icon_set_resolution_checksum: resolution_checksum,
            });
        }
        Ok(GraphTypeListResponse { graph_types })
    }

    pub fn get(&self, graph_type_id: &str) -> Result<GraphTypeRecord, StoreError> {
        let conn = self.db.connect()?;
        let graph_type_id = normalize_id(graph_type_id, "graphTypeId")?;
        let draft = self.require_draft(&conn, &graph_type_id)?;
        let published_versions = self.published_bundles(&conn, &graph_type_id)?;
        Ok(GraphTypeRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            graph_type_id,
            draft,
            published_versions,
        })
    }

    pub fn create(&self, request: &CreateGraphTypeRequest) -> Result<GraphTypeRecord, StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let graph_type_id = normalize_id(&request.graph_type_id, "graphTypeId")?;
        if self.draft_row(&conn, &graph_type_id)?.is_some() {
            return Err(StoreError::conflict(
                "GRAPH_TYPE_ALREADY_EXISTS",
                format!("Graph type '{graph_type_id}' already exists."),
            )
            .with_details(json!({"graphTypeId": graph_type_id})));
        }
        let bundle = self.compose(&graph_type_id, 1, &request.editable)?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        tx.commit()?;
        self.get(&graph_type_id)
    }

    pub fn update(
        &self,
        graph_type_id: &str,
        request: &UpdateGraphTypeRequest,
    ) -> Result<GraphTypeRecord, StoreError> {
        let _guard = self.guard();
        let graph_type_id = normalize_id(graph_type_id, "graphTypeId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &graph_type_id)?;
        let next = self.compose(&graph_type_id, current.version + 1, &request.editable)?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&graph_type_id)
    }

    pub fn publish(&self, graph_type_id: &str) -> Result<GraphTypeBundle, StoreError> {
        let _guard = self.guard();
        let graph_type_id = normalize_id(graph_type_id, "graphTypeId")?;
        let mut conn = self.db.connect()?;
        let draft = self.require_draft(&conn, &graph_type_id)?;
        let already: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM graph_type_published_versions
             WHERE graph_type_id = ?1 AND version = ?2)",
            params![graph_type_id, draft.version],
            |row| row.get(0),
        )?;
        if already {
            return Err(StoreError::conflict(
                "GRAPH_TYPE_VERSION_ALREADY_PUBLISHED",
                format!(
                    "Graph type '{graph_type_id}' version {} is already published.",
                    draft.version
                ),
            )
            .with_details(json!({"graphTypeId": graph_type_id, "version": draft.version})));
        }
        let tx = conn.transaction()?;
        insert_published(&tx, &draft)?;
        tx.commit()?;
        Ok(draft)
    }

    pub fn get_bundle(
        &self,
        graph_type_id: &str,
        stage: Stage,
        version: Option<u32>,
    ) -> Result<GraphTypeBundle, StoreError> {
        let conn = self.db.connect()?;
        let graph_type_id = normalize_id(graph_type_id, "graphTypeId")?;
        let draft = self.require_draft(&conn, &graph_type_id)?;
        match stage {
            Stage::Draft => match version {
                Some(requested) if requested != draft.version => {
                    Err(version_not_found(&graph_type_id, requested))
                }
                _ => Ok(draft),
            },
            Stage::Published => match version {
                Some(requested) => self
                    .published_bundle(&conn, &graph_type_id, requested)?
                    .ok_or_else(|| version_not_found(&graph_type_id, requested)),
                None => {
                    let latest: Option<u32> = conn.query_row(
                        "SELECT MAX(version) FROM graph_type_published_versions
                         WHERE graph_type_id = ?1",
                        params![graph_type_id],
                        |row| row.get(0),
                    )?;
                    match latest {
                        Some(latest) => self
                            .published_bundle(&conn, &graph_type_id, latest)?
                            .ok_or_else(|| version_not_found(&graph_type_id, latest)),
                        None => Err(StoreError::not_found(
                            "GRAPH_TYPE_NOT_PUBLISHED",
                            format!("Graph type '{graph_type_id}' has no published versions."),
                        )
                        .with_details(json!({"graphTypeId": graph_type_id}))),
                    }
                }
            },
        }
    }

    /// Runtime view with the icon resolution re-run against the pinned
    /// references. Pinned published inputs make the live run reproduce
    /// the stored runtime checksum; a divergence is surfaced as a 500.
    pub fn get_runtime(
        &self,
        graph_type_id: &str,
        stage: Stage,
        version: Option<u32>,
    ) -> Result<GraphTypeRuntime, StoreError> {
        let bundle = self.get_bundle(graph_type_id, stage, version)?;
        let editable = bundle.editable_fields();
        let (_bundles, resolution) = self.resolve_icon_sets(&editable)?;
        let recomposed = self.compose(&bundle.graph_type_id, bundle.version, &editable)?;
        if recomposed.runtime_checksum != bundle.runtime_checksum {
            return Err(StoreError::fatal(
                "GRAPH_TYPE_RUNTIME_INVALID",
                format!(
                    "Graph type '{}' runtime no longer matches its stored checksum.",
                    bundle.graph_type_id
                ),
            )
            .with_details(json!({
                "graphTypeId": bundle.graph_type_id,
                "expectedChecksum": bundle.runtime_checksum,
                "actualChecksum": recomposed.runtime_checksum,
            })));
        }
        Ok(GraphTypeRuntime {
            schema_version: SCHEMA_VERSION.to_string(),
            graph_type_id: bundle.graph_type_id.clone(),
            graph_type_version: bundle.version,
            graph_type_checksum: bundle.checksum.clone(),
            runtime_checksum: bundle.runtime_checksum.clone(),
            conflict_policy: bundle.icon_conflict_policy,
            resolved_entries: resolution.resolved_entries.clone(),
            sources: resolution.sources.clone(),
            key_sources: resolution.key_sources.clone(),
            link_types: bundle.link_types.clone(),
            edge_type_overrides: bundle.edge_type_overrides.clone(),
            checksum: recomposed.runtime_checksum,
        })
    }

    /// Autocomplete catalog derived from the resolved bundle.
    pub fn get_autocomplete(
        &self,
        graph_type_id: &str,
        stage: Stage,
        version: Option<u32>,
    ) -> Result<AutocompleteCatalog, StoreError> {
        let bundle = self.get_bundle(graph_type_id, stage, version)?;
        Ok(AutocompleteCatalog::from_bundle(&bundle))
    }

    // -----------------------------------------------------------------------
    // Row access
    // -----------------------------------------------------------------------

    fn draft_row(
        &self,
        conn: &Connection,
        graph_type_id: &str,
    ) -> Result<Option<(u32, String, String)>, StoreError> {
        let row = conn
            .query_row(
                "SELECT draft_version, draft_checksum, draft_payload
                 FROM graph_types WHERE graph_type_id = ?1",
                params![graph_type_id],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }

    fn require_draft(
        &self,
        conn: &Connection,
        graph_type_id: &str,
    ) -> Result<GraphTypeBundle, StoreError> {
        let (version, stored_checksum, payload) = self
            .draft_row(conn, graph_type_id)?
            .ok_or_else(|| {
                StoreError::not_found(
                    "GRAPH_TYPE_NOT_FOUND",
                    format!("Graph type '{graph_type_id}' was not found."),
                )
                .with_details(json!({"graphTypeId": graph_type_id}))
            })?;
        decode(graph_type_id, version, &payload, &stored_checksum)
    }

    fn published_bundle(
        &self,
        conn: &Connection,
        graph_type_id: &str,
        version: u32,
    ) -> Result<Option<GraphTypeBundle>, StoreError> {
        let row = conn
            .query_row(
                "SELECT checksum, payload FROM graph_type_published_versions
                 WHERE graph_type_id = ?1 AND version = ?2",
                params![graph_type_id, version],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((stored_checksum, payload)) = row else {
            return Ok(None);
        };
        decode(graph_type_id, version, &payload, &stored_checksum).map(Some)
    }

    fn published_bundles(
        &self,
        conn: &Connection,
        graph_type_id: &str,
    ) -> Result<Vec<GraphTypeBundle>, StoreError> {
        let versions = {
            let mut statement = conn.prepare(
                "SELECT version FROM graph_type_published_versions
                 WHERE graph_type_id = ?1 ORDER BY version",
            )?;
            let rows = statement
                .query_map(params![graph_type_id], |row| row.get::<_, u32>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        let mut bundles = Vec::with_capacity(versions.len());
        for version in versions {
            if let Some(bundle) = self.published_bundle(conn, graph_type_id, version)? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }
}

fn corrupted(graph_type_id: &str, reason: &str) -> StoreError {
    StoreError::fatal(
        "GRAPH_TYPE_STORAGE_CORRUPTED",
        format!("Stored graph type '{graph_type_id}' is corrupted: {reason}."),
    )
    .with_details(json!({"graphTypeId": graph_type_id}))
}

fn version_not_found(graph_type_id: &str, version: u32) -> StoreError {
    StoreError::not_found(
        "GRAPH_TYPE_VERSION_NOT_FOUND",
        format!("Graph type '{graph_type_id}' version {version} was not found."),
    )
    .with_details(json!({"graphTypeId": graph_type_id, "version": version}))
}

/// Decodes a stored payload and cross-checks its checksum, both against
/// the indexed column and against a recomputation from the content.
fn decode(
    graph_type_id: &str,
    version: u32,
    payload: &str,
    stored_checksum: &str,
) -> Result<GraphTypeBundle, StoreError> {
    let bundle: GraphTypeBundle = serde_json::from_str(payload)
        .map_err(|err| corrupted(graph_type_id, &format!("payload is not valid JSON: {err}")))?;
    if bundle.graph_type_id != graph_type_id || bundle.version != version {
        return Err(corrupted(graph_type_id, "payload identity mismatch"));
    }
    if bundle.checksum != stored_checksum || bundle.checksum != bundle.expected_checksum() {
        return Err(corrupted(graph_type_id, "checksum mismatch"));
    }
    Ok(bundle)
}

fn encode(bundle: &GraphTypeBundle) -> Result<String, StoreError> {
    serde_json::to_string(bundle).map_err(|err| {
        StoreError::fatal("STORAGE_ERROR", format!("failed to encode graph type: {err}"))
    })
}

fn insert_draft(tx: &rusqlite::Transaction<'_>, bundle: &GraphTypeBundle) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO graph_types (graph_type_id, name, draft_version, draft_updated_at,
             draft_checksum, draft_runtime_checksum, draft_icon_set_resolution_checksum, draft_payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            bundle.graph_type_id,
            bundle.name,
            bundle.version,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum,
            bundle.runtime_checksum,
            bundle.icon_set_resolution_checksum,
            encode(bundle)?
        ],
    )?;
    Ok(())
}

fn replace_draft(
    conn: &mut Connection,
    next: &GraphTypeBundle,
    expected_version: u32,
) -> Result<(), StoreError> {
    let affected = conn.execute(
        "UPDATE graph_types SET name = ?1, draft_version = ?2, draft_updated_at = ?3,
             draft_checksum = ?4, draft_runtime_checksum = ?5,
             draft_icon_set_resolution_checksum = ?6, draft_payload = ?7
         WHERE graph_type_id = ?8 AND draft_version = ?9",
        params![
            next.name,
            next.version,
            next.updated_at.to_rfc3339(),
            next.checksum,
            next.runtime_checksum,
            next.icon_set_resolution_checksum,
            encode(next)?,
            next.graph_type_id,
            expected_version
        ],
    )?;
    if affected == 0 {
        return Err(StoreError::conflict(
            "GRAPH_TYPE_CONCURRENT_MODIFICATION",
            format!(
                "Graph type '{}' draft moved past version {expected_version}.",
                next.graph_type_id
            ),
        )
        .with_details(
            json!({"graphTypeId": next.graph_type_id, "expectedVersion": expected_version}),
        ));
    }
    Ok(())
}

fn insert_published(
    tx: &rusqlite::Transaction<'_>,
    bundle: &GraphTypeBundle,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO graph_type_published_versions (graph_type_id, version, name, updated_at,
             checksum, runtime_checksum, icon_set_resolution_checksum, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            bundle.graph_type_id,
            bundle.version,
            bundle.name,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum,
            bundle.runtime_checksum,
            bundle.icon_set_resolution_checksum,
            encode(bundle)?
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphapi_core::graph_type::{IconSetRef, LayoutSetRef, LinkSetRef};
    use graphapi_core::icon_set::CreateIconSetRequest;
    use graphapi_core::layout_set::CreateLayoutSetRequest;
    use graphapi_core::link_set::{CreateLinkSetRequest, LinkTypeDefinition};
    use graphapi_core::resolve::IconConflictPolicy;
    use graphapi_core::SettingsMap;
    use serde_json::Map;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Fixture {
        icon_sets: Arc<IconSetStore>,
        layout_sets: Arc<LayoutSetStore>,
        link_sets: Arc<LinkSetStore>,
        graph_types: GraphTypeStore,
    }

    fn fixture(dir: &TempDir) -> Fixture {
        let db = Database::open(dir.path().join("graphapi.db")).unwrap();
        let icon_sets = Arc::new(IconSetStore::new(db.clone()));
        let layout_sets = Arc::new(LayoutSetStore::new(db.clone()));
        let link_sets = Arc::new(LinkSetStore::new(db.clone()));
        let graph_types = GraphTypeStore::new(
            db,
            Arc::clone(&icon_sets),
            Arc::clone(&layout_sets),
            Arc::clone(&link_sets),
        );
        Fixture {
            icon_sets,
            layout_sets,
            link_sets,
            graph_types,
        }
    }

    fn seed_references(fixture: &Fixture) {
        fixture
            .icon_sets
            .create(&CreateIconSetRequest {
                icon_set_id: "telecom".to_string(),
                name: "Telecom".to_string(),
                entries: [
                    ("router".to_string(), "mdi:router".to_string()),
                    ("gateway".to_string(), "mdi:gate".to_string()),
                    ("firewall".to_string(), "mdi:wall".to_string()),
                ]
                .into_iter()
                .collect(),
            })
            .unwrap();
        fixture.icon_sets.publish("telecom").unwrap();

        let mut elk_settings = SettingsMap::new();
        elk_settings.insert("elk.algorithm".into(), json!("layered"));
        elk_settings.insert(
            "edge_defaults".into(),
            json!({"properties": {"org.eclipse.elk.edge.thickness": 1}}),
        );
        fixture
            .layout_sets
            .create(&CreateLayoutSetRequest {
                layout_set_id: "default".to_string(),
                name: "Default".to_string(),
                elk_settings,
            })
            .unwrap();
        fixture.layout_sets.publish("default").unwrap();

        let mut entries = BTreeMap::new();
        entries.insert(
            "directed".to_string(),
            LinkTypeDefinition {
                label: "Directed".to_string(),
                elk_edge_type: Some("DIRECTED".to_string()),
                elk_properties: Map::new(),
            },
        );
        fixture
            .link_sets
            .create(&CreateLinkSetRequest {
                link_set_id: "default".to_string(),
                name: "Default".to_string(),
                entries,
            })
            .unwrap();
        fixture.link_sets.publish("default").unwrap();
    }

    fn editable() -> GraphTypeEditableFields {
        GraphTypeEditableFields {
            name: "Telecom".to_string(),
            layout_set_ref: LayoutSetRef {
                layout_set_id: "default".to_string(),
                layout_set_version: 1,
                checksum: None,
            },
            icon_set_refs: vec![IconSetRef {
                icon_set_id: "telecom".to_string(),
                icon_set_version: 1,
                checksum: None,
            }],
            link_set_ref: LinkSetRef {
                link_set_id: "default".to_string(),
                link_set_version: 1,
                checksum: None,
            },
            icon_conflict_policy: IconConflictPolicy::Reject,
        }
    }

    fn create_request() -> CreateGraphTypeRequest {
        CreateGraphTypeRequest {
            graph_type_id: "telecom".to_string(),
            editable: editable(),
        }
    }

    #[test]
    fn create_composes_and_pins_references() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        let record = fixture.graph_types.create(&create_request()).unwrap();
        let draft = record.draft;
        assert_eq!(draft.version, 1);
        assert_eq!(draft.node_types, vec!["firewall", "gateway", "router"]);
        assert_eq!(draft.type_icon_map["router"], "mdi:router");
        assert!(draft.layout_set_ref.checksum.is_some());
        assert!(draft.icon_set_refs[0].checksum.is_some());
        assert!(draft.link_set_ref.checksum.is_some());
        assert!(draft.elk_settings.contains_key("type_icon_map"));
    }

    #[test]
    fn draft_referenced_icon_set_is_not_resolvable() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        fixture
            .icon_sets
            .create(&CreateIconSetRequest {
                icon_set_id: "unpublished".to_string(),
                name: "Unpublished".to_string(),
                entries: [("router".to_string(), "mdi:router".to_string())]
                    .into_iter()
                    .collect(),
            })
            .unwrap();
        let mut request = create_request();
        request.editable.icon_set_refs[0].icon_set_id = "unpublished".to_string();
        let err = fixture.graph_types.create(&request).unwrap_err();
        assert_eq!(err.status_code, 404);
        assert_eq!(err.code, "GRAPH_TYPE_ICONSET_REF_INVALID");
        assert_eq!(err.details.unwrap()["cause"], "ICON_SET_NOT_PUBLISHED");
    }

    #[test]
    fn stale_checksum_pin_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        let mut request = create_request();
        request.editable.layout_set_ref.checksum = Some("ab".repeat(32));
        let err = fixture.graph_types.create(&request).unwrap_err();
        assert_eq!(err.status_code, 409);
        assert_eq!(err.code, "GRAPH_TYPE_LAYOUT_SET_REF_INVALID");
        let details = err.details.unwrap();
        assert_eq!(details["expectedChecksum"], "ab".repeat(32));
        assert!(details["actualChecksum"].is_string());
    }

    #[test]
    fn conflicting_icon_sets_reject_by_default() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        fixture
            .icon_sets
            .create(&CreateIconSetRequest {
                icon_set_id: "overlay".to_string(),
                name: "Overlay".to_string(),
                entries: [("router".to_string(), "mdi:router-network".to_string())]
                    .into_iter()
                    .collect(),
            })
            .unwrap();
        fixture.icon_sets.publish("overlay").unwrap();
        let mut request = create_request();
        request.editable.icon_set_refs.push(IconSetRef {
            icon_set_id: "overlay".to_string(),
            icon_set_version: 1,
            checksum: None,
        });
        let err = fixture.graph_types.create(&request).unwrap_err();
        assert_eq!(err.status_code, 409);
        assert_eq!(err.code, "ICONSET_KEY_CONFLICT");
        let details = err.details.unwrap();
        assert_eq!(details["key"], "router");
        assert_eq!(details["existingIcon"], "mdi:router");
        assert_eq!(details["incomingIcon"], "mdi:router-network");

        request.editable.icon_conflict_policy = IconConflictPolicy::LastWins;
        let record = fixture.graph_types.create(&request).unwrap();
        assert_eq!(record.draft.type_icon_map["router"], "mdi:router-network");
    }

    #[test]
    fn update_recomposes_at_the_next_version() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        fixture.graph_types.create(&create_request()).unwrap();
        let record = fixture
            .graph_types
            .update(
                "telecom",
                &UpdateGraphTypeRequest {
                    editable: GraphTypeEditableFields {
                        name: "Telecom v2".to_string(),
                        ..editable()
                    },
                },
            )
            .unwrap();
        assert_eq!(record.draft.version, 2);
        assert_eq!(record.draft.name, "Telecom v2");
    }

    #[test]
    fn runtime_matches_the_stored_checksums() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        fixture.graph_types.create(&create_request()).unwrap();
        fixture.graph_types.publish("telecom").unwrap();
        let runtime = fixture
            .graph_types
            .get_runtime("telecom", Stage::Published, None)
            .unwrap();
        assert_eq!(runtime.resolved_entries["router"], "mdi:router");
        assert_eq!(runtime.checksum, runtime.runtime_checksum);
        assert_eq!(runtime.sources.len(), 1);
        assert_eq!(runtime.key_sources["router"].icon, "mdi:router");
        assert_eq!(
            runtime.edge_type_overrides["directed"]["properties"]["org.eclipse.elk.edge.type"],
            json!("DIRECTED")
        );
    }

    #[test]
    fn autocomplete_catalog_reflects_the_bundle() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        fixture.graph_types.create(&create_request()).unwrap();
        let catalog = fixture
            .graph_types
            .get_autocomplete("telecom", Stage::Draft, None)
            .unwrap();
        assert_eq!(catalog.node_types, vec!["firewall", "gateway", "router"]);
        assert_eq!(catalog.link_types, vec!["directed"]);
        let bundle = fixture
            .graph_types
            .get_bundle("telecom", Stage::Draft, None)
            .unwrap();
        assert_eq!(catalog.graph_type_checksum, bundle.checksum);
    }

    #[test]
    fn publish_is_once_per_version() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        fixture.graph_types.create(&create_request()).unwrap();
        fixture.graph_types.publish("telecom").unwrap();
        let err = fixture.graph_types.publish("telecom").unwrap_err();
        assert_eq!(err.code, "GRAPH_TYPE_VERSION_ALREADY_PUBLISHED");
    }

    #[test]
    fn published_snapshot_survives_reference_deletion() {
        let dir = TempDir::new().unwrap();
        let fixture = fixture(&dir);
        seed_references(&fixture);
        fixture.graph_types.create(&create_request()).unwrap();
        fixture.graph_types.publish("telecom").unwrap();
        fixture.link_sets.delete("default").unwrap();
        let bundle = fixture
            .graph_types
            .get_bundle("telecom", Stage::Published, Some(1))
            .unwrap();
        assert_eq!(bundle.link_types, vec!["directed"]);
        let err = fixture
            .graph_types
            .get_runtime("telecom", Stage::Published, Some(1))
            .unwrap_err();
        assert_eq!(err.code, "GRAPH_TYPE_LINK_SET_REF_INVALID");
    }
}
