//! Versioned layout-set store.
//!
//! Same draft/publish shape as icon sets, with ELK settings normalized
//! into per-key rows holding JSON-encoded values. Unlike icon sets,
//! layout sets may be deleted outright.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{json, Value};

use graphapi_core::layout_set::{
    CreateLayoutSetRequest, LayoutSetBundle, UpdateLayoutSetRequest,
};
use graphapi_core::settings::check_setting_key;
use graphapi_core::validate::normalize_id;
use graphapi_core::{ElkSettingsValidator, SettingsMap, Stage, SCHEMA_VERSION};

use crate::db::Database;
use crate::error::StoreError;
use crate::migrate::parse_timestamp;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSetSummary {
    pub schema_version: String,
    pub layout_set_id: String,
    pub name: String,
    pub draft_version: u32,
    pub published_version: Option<u32>,
    pub updated_at: chrono::DateTime<Utc>,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSetRecord {
    pub schema_version: String,
    pub layout_set_id: String,
    pub draft: LayoutSetBundle,
    pub published_versions: Vec<LayoutSetBundle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSetListResponse {
    pub layout_sets: Vec<LayoutSetSummary>,
}

/// SQLite-backed layout-set store.
pub struct LayoutSetStore {
    db: Database,
    lock: Mutex<()>,
}

impl LayoutSetStore {
    pub fn new(db: Database) -> Self {
        LayoutSetStore {
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

    pub fn ensure_default(&self, request: &CreateLayoutSetRequest) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let layout_set_id = normalize_id(&request.layout_set_id, "layoutSetId")?;
        if self.draft_row(&conn, &layout_set_id)?.is_some() {
            return Ok(());
        }
        let bundle = LayoutSetBundle::build(
            &layout_set_id,
            1,
            &request.name,
            &request.elk_settings,
            &ElkSettingsValidator,
            Utc::now(),
        )?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        insert_published(&tx, &bundle)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list(&self) -> Result<LayoutSetListResponse, StoreError> {
        let conn = self.db.connect()?;
        let mut statement = conn.prepare(
            "SELECT s.layout_set_id, s.name, s.draft_version, s.draft_updated_at, s.draft_checksum,
                    (SELECT MAX(version) FROM layout_set_published_versions p
                     WHERE p.layout_set_id = s.layout_set_id)
             FROM layout_sets s ORDER BY s.layout_set_id",
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
        let mut layout_sets = Vec::with_capacity(rows.len());
        for (layout_set_id, name, draft_version, updated_at, checksum, published_version) in rows {
            layout_sets.push(LayoutSetSummary {
                schema_version: SCHEMA_VERSION.to_string(),
                updated_at: parse_timestamp(&updated_at)
                    .map_err(|err| corrupted(&layout_set_id, &err))?,
                layout_set_id,
                name,
                draft_version,
                published_version,
                checksum,
            });
        }
        Ok(LayoutSetListResponse { layout_sets })
    }

    pub fn get(&self, layout_set_id: &str) -> Result<LayoutSetRecord, StoreError> {
        let conn = self.db.connect()?;
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let draft = self.require_draft(&conn, &layout_set_id)?;
        let published_versions = self.published_bundles(&conn, &layout_set_id)?;
        Ok(LayoutSetRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            layout_set_id,
            draft,
            published_versions,
        })
    }

    pub fn create(&self, request: &CreateLayoutSetRequest) -> Result<LayoutSetRecord, StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let layout_set_id = normalize_id(&request.layout_set_id, "layoutSetId")?;
        if self.draft_row(&conn, &layout_set_id)?.is_some() {
            return Err(StoreError::conflict(
                "LAYOUT_SET_ALREADY_EXISTS",
                format!("Layoutset '{layout_set_id}' already exists."),
            )
            .with_details(json!({"layoutSetId": layout_set_id})));
        }
        let bundle = LayoutSetBundle::build(
            &layout_set_id,
            1,
            &request.name,
            &request.elk_settings,
            &ElkSettingsValidator,
            Utc::now(),
        )?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        tx.commit()?;
        self.get(&layout_set_id)
    }

    pub fn update(
        &self,
        layout_set_id: &str,
        request: &UpdateLayoutSetRequest,
    ) -> Result<LayoutSetRecord, StoreError> {
        let _guard = self.guard();
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &layout_set_id)?;
        let next = LayoutSetBundle::build(
            &layout_set_id,
            current.version + 1,
            &request.name,
            &request.elk_settings,
            &ElkSettingsValidator,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&layout_set_id)
    }

    /// Sets one ELK setting and rebuilds the draft as an update.
    pub fn upsert_setting(
        &self,
        layout_set_id: &str,
        setting_key: &str,
        value: &Value,
    ) -> Result<LayoutSetRecord, StoreError> {
        let _guard = self.guard();
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let setting_key = setting_key.trim().to_string();
        check_setting_key(&setting_key)?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &layout_set_id)?;
        let mut elk_settings = current.elk_settings.clone();
        elk_settings.insert(setting_key, value.clone());
        let next = LayoutSetBundle::build(
            &layout_set_id,
            current.version + 1,
            &current.name,
            &elk_settings,
            &ElkSettingsValidator,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&layout_set_id)
    }

    /// Removes one ELK setting. Removing the last remaining setting is
    /// rejected and leaves the draft unchanged.
    pub fn delete_setting(
        &self,
        layout_set_id: &str,
        setting_key: &str,
    ) -> Result<LayoutSetRecord, StoreError> {
        let _guard = self.guard();
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let setting_key = setting_key.trim().to_string();
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &layout_set_id)?;
        let mut elk_settings = current.elk_settings.clone();
        if elk_settings.remove(&setting_key).is_none() {
            return Err(StoreError::not_found(
                "LAYOUT_SET_ENTRY_NOT_FOUND",
                format!("Layoutset '{layout_set_id}' has no setting '{setting_key}'."),
            )
            .with_details(json!({"layoutSetId": layout_set_id, "key": setting_key})));
        }
        if elk_settings.is_empty() {
            return Err(StoreError::validation(
                "LAYOUT_SET_ENTRIES_EMPTY",
                format!("Layoutset '{layout_set_id}' must keep at least one setting."),
            )
            .with_details(json!({"layoutSetId": layout_set_id})));
        }
        let next = LayoutSetBundle::build(
            &layout_set_id,
            current.version + 1,
            &current.name,
            &elk_settings,
            &ElkSettingsValidator,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&layout_set_id)
    }

    pub fn publish(&self, layout_set_id: &str) -> Result<LayoutSetBundle, StoreError> {
        let _guard = self.guard();
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let mut conn = self.db.connect()?;
        let draft = self.require_draft(&conn, &layout_set_id)?;
        let already: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM layout_set_published_versions
             WHERE layout_set_id = ?1 AND version = ?2)",
            params![layout_set_id, draft.version],
            |row| row.get(0),
        )?;
        if already {
            return Err(StoreError::conflict(
                "LAYOUT_SET_VERSION_ALREADY_PUBLISHED",
                format!(
                    "Layoutset '{layout_set_id}' version {} is already published.",
                    draft.version
                ),
            )
            .with_details(json!({"layoutSetId": layout_set_id, "version": draft.version})));
        }
        let tx = conn.transaction()?;
        insert_published(&tx, &draft)?;
        tx.commit()?;
        Ok(draft)
    }

    /// Removes the layout set, its draft settings, and every published
    /// snapshot.
    pub fn delete(&self, layout_set_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let conn = self.db.connect()?;
        let affected = conn.execute(
            "DELETE FROM layout_sets WHERE layout_set_id = ?1",
            params![layout_set_id],
        )?;
        if affected == 0 {
            return Err(not_found(&layout_set_id));
        }
        Ok(())
    }

    pub fn get_bundle(
        &self,
        layout_set_id: &str,
        stage: Stage,
        version: Option<u32>,
    ) -> Result<LayoutSetBundle, StoreError> {
        let conn = self.db.connect()?;
        let layout_set_id = normalize_id(layout_set_id, "layoutSetId")?;
        let draft = self.require_draft(&conn, &layout_set_id)?;
        match stage {
            Stage::Draft => match version {
                Some(requested) if requested != draft.version => {
                    Err(version_not_found(&layout_set_id, requested))
                }
                _ => Ok(draft),
            },
            Stage::Published => match version {
                Some(requested) => self
                    .published_bundle(&conn, &layout_set_id, requested)?
                    .ok_or_else(|| version_not_found(&layout_set_id, requested)),
                None => {
                    let latest: Option<u32> = conn.query_row(
                        "SELECT MAX(version) FROM layout_set_published_versions
                         WHERE layout_set_id = ?1",
                        params![layout_set_id],
                        |row| row.get(0),
                    )?;
                    match latest {
                        Some(latest) => self
                            .published_bundle(&conn, &layout_set_id, latest)?
                            .ok_or_else(|| version_not_found(&layout_set_id, latest)),
                        None => Err(StoreError::not_found(
                            "LAYOUT_SET_NOT_PUBLISHED",
                            format!("Layoutset '{layout_set_id}' has no published versions."),
                        )
                        .with_details(json!({"layoutSetId": layout_set_id}))),
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
        layout_set_id: &str,
    ) -> Result<Option<(String, u32, String, String)>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, draft_version, draft_updated_at, draft_checksum
                 FROM layout_sets WHERE layout_set_id = ?1",
                params![layout_set_id],
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
        layout_set_id: &str,
    ) -> Result<LayoutSetBundle, StoreError> {
        let (name, version, updated_at, stored_checksum) = self
            .draft_row(conn, layout_set_id)?
            .ok_or_else(|| not_found(layout_set_id))?;
        let elk_settings = self.settings_map(
            conn,
            "SELECT setting_key, setting_value FROM layout_set_draft_entries
             WHERE layout_set_id = ?1",
            params![layout_set_id],
            layout_set_id,
        )?;
        rebuild(layout_set_id, version, &name, &elk_settings, &updated_at, &stored_checksum)
    }

    fn published_bundle(
        &self,
        conn: &Connection,
        layout_set_id: &str,
        version: u32,
    ) -> Result<Option<LayoutSetBundle>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, updated_at, checksum FROM layout_set_published_versions
                 WHERE layout_set_id = ?1 AND version = ?2",
                params![layout_set_id, version],
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
        let elk_settings = self.settings_map(
            conn,
            "SELECT setting_key, setting_value FROM layout_set_published_entries
             WHERE layout_set_id = ?1 AND version = ?2",
            params![layout_set_id, version],
            layout_set_id,
        )?;
        rebuild(layout_set_id, version, &name, &elk_settings, &updated_at, &stored_checksum)
            .map(Some)
    }

    fn published_bundles(
        &self,
        conn: &Connection,
        layout_set_id: &str,
    ) -> Result<Vec<LayoutSetBundle>, StoreError> {
        let versions = {
            let mut statement = conn.prepare(
                "SELECT version FROM layout_set_published_versions
                 WHERE layout_set_id = ?1 ORDER BY version",
            )?;
            let rows = statement
                .query_map(params![layout_set_id], |row| row.get::<_, u32>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        let mut bundles = Vec::with_capacity(versions.len());
        for version in versions {
            if let Some(bundle) = self.published_bundle(conn, layout_set_id, version)? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }

    fn settings_map(
        &self,
        conn: &Connection,
        sql: &str,
        parameters: impl rusqlite::Params,
        layout_set_id: &str,
    ) -> Result<SettingsMap, StoreError> {
        let mut statement = conn.prepare(sql)?;
        let rows = statement
            .query_map(parameters, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut map = SettingsMap::new();
        for (setting_key, raw_value) in rows {
            let value: Value = serde_json::from_str(&raw_value).map_err(|err| {
                corrupted(layout_set_id, &format!("setting '{setting_key}' is not JSON: {err}"))
            })?;
            map.insert(setting_key, value);
        }
        Ok(map)
    }
}

fn not_found(layout_set_id: &str) -> StoreError {
    StoreError::not_found(
        "LAYOUT_SET_NOT_FOUND",
        format!("Layoutset '{layout_set_id}' was not found."),
    )
    .with_details(json!({"layoutSetId": layout_set_id}))
}

fn corrupted(layout_set_id: &str, reason: &str) -> StoreError {
    StoreError::fatal(
        "LAYOUT_SET_STORAGE_CORRUPTED",
        format!("Stored layoutset '{layout_set_id}' is corrupted: {reason}."),
    )
    .with_details(json!({"layoutSetId": layout_set_id}))
}

fn version_not_found(layout_set_id: &str, version: u32) -> StoreError {
    StoreError::not_found(
        "LAYOUT_SET_VERSION_NOT_FOUND",
        format!("Layoutset '{layout_set_id}' version {version} was not found."),
    )
    .with_details(json!({"layoutSetId": layout_set_id, "version": version}))
}

fn rebuild(
    layout_set_id: &str,
    version: u32,
    name: &str,
    elk_settings: &SettingsMap,
    updated_at: &str,
    stored_checksum: &str,
) -> Result<LayoutSetBundle, StoreError> {
    let updated_at = parse_timestamp(updated_at).map_err(|err| corrupted(layout_set_id, &err))?;
    let bundle = LayoutSetBundle::build(
        layout_set_id,
        version,
        name,
        elk_settings,
        &ElkSettingsValidator,
        updated_at,
    )
    .map_err(|err| corrupted(layout_set_id, &err.message))?;
    if bundle.checksum != stored_checksum {
        return Err(corrupted(layout_set_id, "checksum mismatch"));
    }
    Ok(bundle)
}

fn insert_draft(tx: &rusqlite::Transaction<'_>, bundle: &LayoutSetBundle) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO layout_sets (layout_set_id, name, draft_version, draft_updated_at, draft_checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bundle.layout_set_id,
            bundle.name,
            bundle.version,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum
        ],
    )?;
    insert_draft_settings(tx, bundle)?;
    Ok(())
}

fn insert_draft_settings(
    tx: &rusqlite::Transaction<'_>,
    bundle: &LayoutSetBundle,
) -> Result<(), StoreError> {
    for (setting_key, value) in &bundle.elk_settings {
        tx.execute(
            "INSERT INTO layout_set_draft_entries (layout_set_id, setting_key, setting_value)
             VALUES (?1, ?2, ?3)",
            params![bundle.layout_set_id, setting_key, encode_value(value)?],
        )?;
    }
    Ok(())
}

fn replace_draft(
    conn: &mut Connection,
    next: &LayoutSetBundle,
    expected_version: u32,
) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    let affected = tx.execute(
        "UPDATE layout_sets SET name = ?1, draft_version = ?2, draft_updated_at = ?3, draft_checksum = ?4
         WHERE layout_set_id = ?5 AND draft_version = ?6",
        params![
            next.name,
            next.version,
            next.updated_at.to_rfc3339(),
            next.checksum,
            next.layout_set_id,
            expected_version
        ],
    )?;
    if affected == 0 {
        return Err(StoreError::conflict(
            "LAYOUT_SET_CONCURRENT_MODIFICATION",
            format!(
                "Layoutset '{}' draft moved past version {expected_version}.",
                next.layout_set_id
            ),
        )
        .with_details(
            json!({"layoutSetId": next.layout_set_id, "expectedVersion": expected_version}),
        ));
    }
    tx.execute(
        "DELETE FROM layout_set_draft_entries WHERE layout_set_id = ?1",
        params![next.layout_set_id],
    )?;
    insert_draft_settings(&tx, next)?;
    tx.commit()?;
    Ok(())
}

fn insert_published(
    tx: &rusqlite::Transaction<'_>,
    bundle: &LayoutSetBundle,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO layout_set_published_versions (layout_set_id, version, name, updated_at, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bundle.layout_set_id,
            bundle.version,
            bundle.name,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum
        ],
    )?;
    for (setting_key, value) in &bundle.elk_settings {
        tx.execute(
            "INSERT INTO layout_set_published_entries (layout_set_id, version, setting_key, setting_value)
             VALUES (?1, ?2, ?3, ?4)",
            params![bundle.layout_set_id, bundle.version, setting_key, encode_value(value)?],
        )?;
    }
    Ok(())
}

fn encode_value(value: &Value) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|err| StoreError::fatal("STORAGE_ERROR", format!("failed to encode setting: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LayoutSetStore {
        let db = Database::open(dir.path().join("graphapi.db")).unwrap();
        LayoutSetStore::new(db)
    }

    fn request(id: &str) -> CreateLayoutSetRequest {
        let mut elk_settings = SettingsMap::new();
        elk_settings.insert("elk.algorithm".into(), json!("layered"));
        elk_settings.insert("edge_defaults".into(), json!({"routing": "ORTHOGONAL"}));
        CreateLayoutSetRequest {
            layout_set_id: id.to_string(),
            name: format!("{id} layout"),
            elk_settings,
        }
    }

    #[test]
    fn round_trips_nested_setting_values() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("flow")).unwrap();
        let draft = store.get_bundle("flow", Stage::Draft, None).unwrap();
        assert_eq!(draft.elk_settings["edge_defaults"]["routing"], "ORTHOGONAL");
        assert_eq!(draft.checksum, draft.expected_checksum());
    }

    #[test]
    fn upsert_and_delete_setting_bump_the_version() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("flow")).unwrap();
        let record = store
            .upsert_setting("flow", "spacing.nodeNode", &json!(40))
            .unwrap();
        assert_eq!(record.draft.version, 2);
        assert_eq!(record.draft.elk_settings["spacing.nodeNode"], 40);
        let record = store.delete_setting("flow", "spacing.nodeNode").unwrap();
        assert_eq!(record.draft.version, 3);
        assert!(!record.draft.elk_settings.contains_key("spacing.nodeNode"));
    }

    #[test]
    fn deleting_an_absent_setting_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("flow")).unwrap();
        let err = store.delete_setting("flow", "missing").unwrap_err();
        assert_eq!(err.code, "LAYOUT_SET_ENTRY_NOT_FOUND");
    }

    #[test]
    fn deleting_the_last_setting_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut elk_settings = SettingsMap::new();
        elk_settings.insert("elk.algorithm".into(), json!("layered"));
        store
            .create(&CreateLayoutSetRequest {
                layout_set_id: "flow".to_string(),
                name: "Flow".to_string(),
                elk_settings,
            })
            .unwrap();
        let err = store.delete_setting("flow", "elk.algorithm").unwrap_err();
        assert_eq!(err.code, "LAYOUT_SET_ENTRIES_EMPTY");
        assert_eq!(store.get_bundle("flow", Stage::Draft, None).unwrap().version, 1);
    }

    #[test]
    fn reserved_keys_are_rejected_on_upsert() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("flow")).unwrap();
        let err = store
            .update(
                "flow",
                &UpdateLayoutSetRequest {
                    name: "Flow".to_string(),
                    elk_settings: {
                        let mut map = SettingsMap::new();
                        map.insert("type_icon_map".into(), json!({}));
                        map
                    },
                },
            )
            .unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[test]
    fn delete_removes_drafts_and_snapshots() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("flow")).unwrap();
        store.publish("flow").unwrap();
        store.delete("flow").unwrap();
        let err = store.get("flow").unwrap_err();
        assert_eq!(err.code, "LAYOUT_SET_NOT_FOUND");
        let err = store.delete("flow").unwrap_err();
        assert_eq!(err.code, "LAYOUT_SET_NOT_FOUND");
    }

    #[test]
    fn publish_is_once_per_version() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("flow")).unwrap();
        store.publish("flow").unwrap();
        let err = store.publish("flow").unwrap_err();
        assert_eq!(err.code, "LAYOUT_SET_VERSION_ALREADY_PUBLISHED");
    }
}
