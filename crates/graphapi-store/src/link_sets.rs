//! Versioned link-set store.
//!
//! Entries are edge definitions keyed by link type, stored one row per
//! key with the definition JSON-encoded. Deletable, like layout sets.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use graphapi_core::link_set::{
    CreateLinkSetRequest, LinkSetBundle, LinkTypeDefinition, UpdateLinkSetRequest,
};
use graphapi_core::validate::{normalize_id, normalize_type_key};
use graphapi_core::{Stage, SCHEMA_VERSION};

use crate::db::Database;
use crate::error::StoreError;
use crate::migrate::parse_timestamp;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSetSummary {
    pub schema_version: String,
    pub link_set_id: String,
    pub name: String,
    pub draft_version: u32,
    pub published_version: Option<u32>,
    pub updated_at: chrono::DateTime<Utc>,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSetRecord {
    pub schema_version: String,
    pub link_set_id: String,
    pub draft: LinkSetBundle,
    pub published_versions: Vec<LinkSetBundle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSetListResponse {
    pub link_sets: Vec<LinkSetSummary>,
}

/// SQLite-backed link-set store.
pub struct LinkSetStore {
    db: Database,
    lock: Mutex<()>,
}

impl LinkSetStore {
    pub fn new(db: Database) -> Self {
        LinkSetStore {
            db,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Public contract
    // -----------------------------------------------------------------------

    pub fn ensure_default(&self, request: &CreateLinkSetRequest) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let link_set_id = normalize_id(&request.link_set_id, "linkSetId")?;
        if self.draft_row(&conn, &link_set_id)?.is_some() {
            return Ok(());
        }
        let bundle =
            LinkSetBundle::build(&link_set_id, 1, &request.name, &request.entries, Utc::now())?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        insert_published(&tx, &bundle)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list(&self) -> Result<LinkSetListResponse, StoreError> {
        let conn = self.db.connect()?;
        let mut statement = conn.prepare(
            "SELECT s.link_set_id, s.name, s.draft_version, s.draft_updated_at, s.draft_checksum,
                    (SELECT MAX(version) FROM link_set_published_versions p
                     WHERE p.link_set_id = s.link_set_id)
             FROM link_sets s ORDER BY s.link_set_id",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<u32>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut link_sets = Vec::with_capacity(rows.len());
        for (link_set_id, name, draft_version, updated_at, checksum, published_version) in rows {
            link_sets.push(LinkSetSummary {
                schema_version: SCHEMA_VERSION.to_string(),
                updated_at: parse_timestamp(&updated_at)
                    .map_err(|err| corrupted(&link_set_id, &err))?,
                link_set_id,
                name,
                draft_version,
                published_version,
                checksum,
            });
        }
        Ok(LinkSetListResponse { link_sets })
    }

    pub fn get(&self, link_set_id: &str) -> Result<LinkSetRecord, StoreError> {
        let conn = self.db.connect()?;
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let draft = self.require_draft(&conn, &link_set_id)?;
        let published_versions = self.published_bundles(&conn, &link_set_id)?;
        Ok(LinkSetRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            link_set_id,
            draft,
            published_versions,
        })
    }

    pub fn create(&self, request: &CreateLinkSetRequest) -> Result<LinkSetRecord, StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let link_set_id = normalize_id(&request.link_set_id, "linkSetId")?;
        if self.draft_row(&conn, &link_set_id)?.is_some() {
            return Err(StoreError::conflict(
                "LINK_SET_ALREADY_EXISTS",
                format!("Linkset '{link_set_id}' already exists."),
            )
            .with_details(json!({"linkSetId": link_set_id})));
        }
        let bundle =
            LinkSetBundle::build(&link_set_id, 1, &request.name, &request.entries, Utc::now())?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        tx.commit()?;
        self.get(&link_set_id)
    }

    pub fn update(
        &self,
        link_set_id: &str,
        request: &UpdateLinkSetRequest,
    ) -> Result<LinkSetRecord, StoreError> {
        let _guard = self.guard();
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &link_set_id)?;
        let next = LinkSetBundle::build(
            &link_set_id,
            current.version + 1,
            &request.name,
            &request.entries,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&link_set_id)
    }

    /// Sets one link type definition and rebuilds the draft as an update.
    pub fn upsert_entry(
        &self,
        link_set_id: &str,
        link_type_key: &str,
        definition: &LinkTypeDefinition,
    ) -> Result<LinkSetRecord, StoreError> {
        let _guard = self.guard();
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &link_set_id)?;
        let mut entries = current.entries.clone();
        entries.insert(normalize_type_key(link_type_key)?, definition.clone());
        let next = LinkSetBundle::build(
            &link_set_id,
            current.version + 1,
            &current.name,
            &entries,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&link_set_id)
    }

    /// Removes one link type. Removing the last remaining entry is
    /// rejected and leaves the draft unchanged.
    pub fn delete_entry(
        &self,
        link_set_id: &str,
        link_type_key: &str,
    ) -> Result<LinkSetRecord, StoreError> {
        let _guard = self.guard();
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let link_type_key = normalize_type_key(link_type_key)?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &link_set_id)?;
        let mut entries = current.entries.clone();
        if entries.remove(&link_type_key).is_none() {
            return Err(StoreError::not_found(
                "LINK_TYPE_NOT_FOUND",
                format!("Linkset '{link_set_id}' has no link type '{link_type_key}'."),
            )
            .with_details(json!({"linkSetId": link_set_id, "key": link_type_key})));
        }
        if entries.is_empty() {
            return Err(StoreError::validation(
                "LINK_SET_ENTRIES_EMPTY",
                format!("Linkset '{link_set_id}' must keep at least one link type."),
            )
            .with_details(json!({"linkSetId": link_set_id})));
        }
        let next = LinkSetBundle::build(
            &link_set_id,
            current.version + 1,
            &current.name,
            &entries,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&link_set_id)
    }

    pub fn publish(&self, link_set_id: &str) -> Result<LinkSetBundle, StoreError> {
        let _guard = self.guard();
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let mut conn = self.db.connect()?;
        let draft = self.require_draft(&conn, &link_set_id)?;
        let already: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM link_set_published_versions
             WHERE link_set_id = ?1 AND version = ?2)",
            params![link_set_id, draft.version],
            |row| row.get(0),
        )?;
        if already {
            return Err(StoreError::conflict(
                "LINK_SET_VERSION_ALREADY_PUBLISHED",
                format!(
                    "Linkset '{link_set_id}' version {} is already published.",
                    draft.version
                ),
            )
            .with_details(json!({"linkSetId": link_set_id, "version": draft.version})));
        }
        let tx = conn.transaction()?;
        insert_published(&tx, &draft)?;
        tx.commit()?;
        Ok(draft)
    }

    pub fn delete(&self, link_set_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let conn = self.db.connect()?;
        let affected = conn.execute(
            "DELETE FROM link_sets WHERE link_set_id = ?1",
            params![link_set_id],
        )?;
        if affected == 0 {
            return Err(not_found(&link_set_id));
        }
        Ok(())
    }

    pub fn get_bundle(
        &self,
        link_set_id: &str,
        stage: Stage,
        version: Option<u32>,
    ) -> Result<LinkSetBundle, StoreError> {
        let conn = self.db.connect()?;
        let link_set_id = normalize_id(link_set_id, "linkSetId")?;
        let draft = self.require_draft(&conn, &link_set_id)?;
        match stage {
            Stage::Draft => match version {
                Some(requested) if requested != draft.version => {
                    Err(version_not_found(&link_set_id, requested))
                }
                _ => Ok(draft),
            },
            Stage::Published => match version {
                Some(requested) => self
                    .published_bundle(&conn, &link_set_id, requested)?
                    .ok_or_else(|| version_not_found(&link_set_id, requested)),
                None => {
                    let latest: Option<u32> = conn.query_row(
                        "SELECT MAX(version) FROM link_set_published_versions
                         WHERE link_set_id = ?1",
                        params![link_set_id],
                        |row| row.get(0),
                    )?;
                    match latest {
                        Some(latest) => self
                            .published_bundle(&conn, &link_set_id, latest)?
                            .ok_or_else(|| version_not_found(&link_set_id, latest)),
                        None => Err(StoreError::not_found(
                            "LINK_SET_NOT_PUBLISHED",
                            format!("Linkset '{link_set_id}' has no published versions."),
                        )
                        .with_details(json!({"linkSetId": link_set_id}))),
                    }
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Row access
    // -----------------------------------------------------------------------

    fn draft_row(
        &self,
        conn: &Connection,
        link_set_id: &str,
    ) -> Result<Option<(String, u32, String, String)>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, draft_version, draft_updated_at, draft_checksum
                 FROM link_sets WHERE link_set_id = ?1",
                params![link_set_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }

    fn require_draft(
        &self,
        conn: &Connection,
        link_set_id: &str,
    ) -> Result<LinkSetBundle, StoreError> {
        let (name, version, updated_at, stored_checksum) = self
            .draft_row(conn, link_set_id)?
            .ok_or_else(|| not_found(link_set_id))?;
        let entries = self.entry_map(
            conn,
            "SELECT link_type_key, definition FROM link_set_draft_entries
             WHERE link_set_id = ?1",
            params![link_set_id],
            link_set_id,
        )?;
        rebuild(link_set_id, version, &name, &entries, &updated_at, &stored_checksum)
    }

    fn published_bundle(
        &self,
        conn: &Connection,
        link_set_id: &str,
        version: u32,
    ) -> Result<Option<LinkSetBundle>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, updated_at, checksum FROM link_set_published_versions
                 WHERE link_set_id = ?1 AND version = ?2",
                params![link_set_id, version],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((name, updated_at, stored_checksum)) = row else {
            return Ok(None);
        };
        let entries = self.entry_map(
            conn,
            "SELECT link_type_key, definition FROM link_set_published_entries
             WHERE link_set_id = ?1 AND version = ?2",
            params![link_set_id, version],
            link_set_id,
        )?;
        rebuild(link_set_id, version, &name, &entries, &updated_at, &stored_checksum).map(Some)
    }

    fn published_bundles(
        &self,
        conn: &Connection,
        link_set_id: &str,
    ) -> Result<Vec<LinkSetBundle>, StoreError> {
        let versions = {
            let mut statement = conn.prepare(
                "SELECT version FROM link_set_published_versions
                 WHERE link_set_id = ?1 ORDER BY version",
            )?;
            let rows = statement
                .query_map(params![link_set_id], |row| row.get::<_, u32>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        let mut bundles = Vec::with_capacity(versions.len());
        for version in versions {
            if let Some(bundle) = self.published_bundle(conn, link_set_id, version)? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }

    fn entry_map(
        &self,
        conn: &Connection,
        sql: &str,
        parameters: impl rusqlite::Params,
        link_set_id: &str,
    ) -> Result<BTreeMap<String, LinkTypeDefinition>, StoreError> {
        let mut statement = conn.prepare(sql)?;
        let rows = statement
            .query_map(parameters, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut entries = BTreeMap::new();
        for (link_type_key, raw) in rows {
            let definition: LinkTypeDefinition = serde_json::from_str(&raw).map_err(|err| {
                corrupted(
                    link_set_id,
                    &format!("definition for '{link_type_key}' is not valid JSON: {err}"),
                )
            })?;
            entries.insert(link_type_key, definition);
        }
        Ok(entries)
    }
}

fn not_found(link_set_id: &str) -> StoreError {
    StoreError::not_found(
        "LINK_SET_NOT_FOUND",
        format!("Linkset '{link_set_id}' was not found."),
    )
    .with_details(json!({"linkSetId": link_set_id}))
}

fn corrupted(link_set_id: &str, reason: &str) -> StoreError {
    StoreError::fatal(
        "LINK_SET_STORAGE_CORRUPTED",
        format!("Stored linkset '{link_set_id}' is corrupted: {reason}."),
    )
    .with_details(json!({"linkSetId": link_set_id}))
}

fn version_not_found(link_set_id: &str, version: u32) -> StoreError {
    StoreError::not_found(
        "LINK_SET_VERSION_NOT_FOUND",
        format!("Linkset '{link_set_id}' version {version} was not found."),
    )
    .with_details(json!({"linkSetId": link_set_id, "version": version}))
}

fn rebuild(
    link_set_id: &str,
    version: u32,
    name: &str,
    entries: &BTreeMap<String, LinkTypeDefinition>,
    updated_at: &str,
    stored_checksum: &str,
) -> Result<LinkSetBundle, StoreError> {
    let updated_at = parse_timestamp(updated_at).map_err(|err| corrupted(link_set_id, &err))?;
    let bundle = LinkSetBundle::build(link_set_id, version, name, entries, updated_at)
        .map_err(|err| corrupted(link_set_id, &err.message))?;
    if bundle.checksum != stored_checksum {
        return Err(corrupted(link_set_id, "checksum mismatch"));
    }
    Ok(bundle)
}

fn insert_draft(tx: &rusqlite::Transaction<'_>, bundle: &LinkSetBundle) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO link_sets (link_set_id, name, draft_version, draft_updated_at, draft_checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bundle.link_set_id,
            bundle.name,
            bundle.version,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum
        ],
    )?;
    insert_draft_entries(tx, bundle)?;
    Ok(())
}

fn insert_draft_entries(
    tx: &rusqlite::Transaction<'_>,
    bundle: &LinkSetBundle,
) -> Result<(), StoreError> {
    for (link_type_key, definition) in &bundle.entries {
        tx.execute(
            "INSERT INTO link_set_draft_entries (link_set_id, link_type_key, definition)
             VALUES (?1, ?2, ?3)",
            params![bundle.link_set_id, link_type_key, encode_definition(definition)?],
        )?;
    }
    Ok(())
}

fn replace_draft(
    conn: &mut Connection,
    next: &LinkSetBundle,
    expected_version: u32,
) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    let affected = tx.execute(
        "UPDATE link_sets SET name = ?1, draft_version = ?2, draft_updated_at = ?3, draft_checksum = ?4
         WHERE link_set_id = ?5 AND draft_version = ?6",
        params![
            next.name,
            next.version,
            next.updated_at.to_rfc3339(),
            next.checksum,
            next.link_set_id,
            expected_version
        ],
    )?;
    if affected == 0 {
        return Err(StoreError::conflict(
            "LINK_SET_CONCURRENT_MODIFICATION",
            format!(
                "Linkset '{}' draft moved past version {expected_version}.",
                next.link_set_id
            ),
        )
        .with_details(json!({"linkSetId": next.link_set_id, "expectedVersion": expected_version})));
    }
    tx.execute(
        "DELETE FROM link_set_draft_entries WHERE link_set_id = ?1",
        params![next.link_set_id],
    )?;
    insert_draft_entries(&tx, next)?;
    tx.commit()?;
    Ok(())
}

fn insert_published(
    tx: &rusqlite::Transaction<'_>,
    bundle: &LinkSetBundle,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO link_set_published_versions (link_set_id, version, name, updated_at, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bundle.link_set_id,
            bundle.version,
            bundle.name,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum
        ],
    )?;
    for (link_type_key, definition) in &bundle.entries {
        tx.execute(
            "INSERT INTO link_set_published_entries (link_set_id, version, link_type_key, definition)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                bundle.link_set_id,
                bundle.version,
                link_type_key,
                encode_definition(definition)?
            ],
        )?;
    }
    Ok(())
}

fn encode_definition(definition: &LinkTypeDefinition) -> Result<String, StoreError> {
    serde_json::to_string(definition).map_err(|err| {
        StoreError::fatal("STORAGE_ERROR", format!("failed to encode link type: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LinkSetStore {
        let db = Database::open(dir.path().join("graphapi.db")).unwrap();
        LinkSetStore::new(db)
    }

    fn definition(label: &str, edge_type: Option<&str>) -> LinkTypeDefinition {
        LinkTypeDefinition {
            label: label.to_string(),
            elk_edge_type: edge_type.map(str::to_string),
            elk_properties: Map::new(),
        }
    }

    fn request(id: &str) -> CreateLinkSetRequest {
        let mut entries = BTreeMap::new();
        entries.insert("directed".to_string(), definition("Directed", Some("DIRECTED")));
        entries.insert("none".to_string(), definition("None", None));
        CreateLinkSetRequest {
            link_set_id: id.to_string(),
            name: format!("{id} links"),
            entries,
        }
    }

    #[test]
    fn round_trips_definitions_with_properties() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut properties = Map::new();
        properties.insert("org.eclipse.elk.edge.thickness".to_string(), json!(1));
        let mut entries = BTreeMap::new();
        entries.insert(
            "dependency".to_string(),
            LinkTypeDefinition {
                label: "Dependency".to_string(),
                elk_edge_type: Some("DEPENDENCY".to_string()),
                elk_properties: properties,
            },
        );
        store
            .create(&CreateLinkSetRequest {
                link_set_id: "uml".to_string(),
                name: "UML".to_string(),
                entries,
            })
            .unwrap();
        let draft = store.get_bundle("uml", Stage::Draft, None).unwrap();
        assert_eq!(
            draft.entries["dependency"].elk_properties["org.eclipse.elk.edge.thickness"],
            1
        );
        assert_eq!(draft.checksum, draft.expected_checksum());
    }

    #[test]
    fn upsert_normalizes_the_key_and_bumps_the_version() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("uml")).unwrap();
        let record = store
            .upsert_entry("uml", "Aggregation", &definition("Aggregation", Some("association")))
            .unwrap();
        assert_eq!(record.draft.version, 2);
        assert_eq!(
            record.draft.entries["aggregation"].elk_edge_type.as_deref(),
            Some("ASSOCIATION")
        );
    }

    #[test]
    fn delete_entry_guards() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("uml")).unwrap();
        let err = store.delete_entry("uml", "missing").unwrap_err();
        assert_eq!(err.code, "LINK_TYPE_NOT_FOUND");
        store.delete_entry("uml", "none").unwrap();
        let err = store.delete_entry("uml", "directed").unwrap_err();
        assert_eq!(err.code, "LINK_SET_ENTRIES_EMPTY");
    }

    #[test]
    fn publish_and_pinned_fetch() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("uml")).unwrap();
        store.publish("uml").unwrap();
        store.delete_entry("uml", "none").unwrap();
        store.publish("uml").unwrap();
        let v1 = store.get_bundle("uml", Stage::Published, Some(1)).unwrap();
        assert!(v1.entries.contains_key("none"));
        let latest = store.get_bundle("uml", Stage::Published, None).unwrap();
        assert_eq!(latest.version, 2);
        assert!(!latest.entries.contains_key("none"));
    }

    #[test]
    fn delete_removes_the_link_set() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("uml")).unwrap();
        store.delete("uml").unwrap();
        assert_eq!(store.get("uml").unwrap_err().code, "LINK_SET_NOT_FOUND");
    }
}
