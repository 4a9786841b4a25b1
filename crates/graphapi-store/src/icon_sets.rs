//! Versioned icon-set store.
//!
//! One mutable draft row per icon set plus append-only published
//! snapshots, with entries normalized into per-key rows. Loading a
//! bundle recomputes its checksum from the stored parts; a mismatch is
//! surfaced as corruption instead of being silently accepted.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use graphapi_core::icon_set::{CreateIconSetRequest, IconSetBundle, UpdateIconSetRequest};
use graphapi_core::validate::{normalize_id, normalize_type_key};
use graphapi_core::{Stage, SCHEMA_VERSION};

use crate::db::Database;
use crate::error::StoreError;
use crate::migrate::parse_timestamp;

/// Summary row returned by `list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSetSummary {
    pub schema_version: String,
    pub icon_set_id: String,
    pub name: String,
    pub draft_version: u32,
    pub published_version: Option<u32>,
    pub updated_at: chrono::DateTime<Utc>,
    pub checksum: String,
}

/// Full record: the draft plus every published snapshot, ascending.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSetRecord {
    pub schema_version: String,
    pub icon_set_id: String,
    pub draft: IconSetBundle,
    pub published_versions: Vec<IconSetBundle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSetListResponse {
    pub icon_sets: Vec<IconSetSummary>,
}

/// SQLite-backed icon-set store.
///
/// The mutex closes the lost-update race between concurrent
/// read-modify-write sequences in this process; the compare-and-swap on
/// `draft_version` closes it across processes sharing the file.
pub struct IconSetStore {
    db: Database,
    lock: Mutex<()>,
}

impl IconSetStore {
    pub fn new(db: Database) -> Self {
        IconSetStore {
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

    /// Idempotent seed: if `iconSetId` is absent, insert version 1 as
    /// draft and as the sole published version.
    pub fn ensure_default(&self, request: &CreateIconSetRequest) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let icon_set_id = normalize_id(&request.icon_set_id, "iconSetId")?;
        if self.draft_row(&conn, &icon_set_id)?.is_some() {
            return Ok(());
        }
        let bundle =
            IconSetBundle::build(&icon_set_id, 1, &request.name, &request.entries, Utc::now())?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        insert_published(&tx, &bundle)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list(&self) -> Result<IconSetListResponse, StoreError> {
        let conn = self.db.connect()?;
        let mut statement = conn.prepare(
            "SELECT s.icon_set_id, s.name, s.draft_version, s.draft_updated_at, s.draft_checksum,
                    (SELECT MAX(version) FROM icon_set_published_versions p
                     WHERE p.icon_set_id = s.icon_set_id)
             FROM icon_sets s ORDER BY s.icon_set_id",
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
        let mut icon_sets = Vec::with_capacity(rows.len());
        for (icon_set_id, name, draft_version, updated_at, checksum, published_version) in rows {
            icon_sets.push(IconSetSummary {
                schema_version: SCHEMA_VERSION.to_string(),
                updated_at: parse_timestamp(&updated_at).map_err(|err| corrupted(&icon_set_id, &err))?,
                icon_set_id,
                name,
                draft_version,
                published_version,
                checksum,
            });
        }
        Ok(IconSetListResponse { icon_sets })
    }

    pub fn get(&self, icon_set_id: &str) -> Result<IconSetRecord, StoreError> {
        let conn = self.db.connect()?;
        let icon_set_id = normalize_id(icon_set_id, "iconSetId")?;
        let draft = self.require_draft(&conn, &icon_set_id)?;
        let published_versions = self.published_bundles(&conn, &icon_set_id)?;
        Ok(IconSetRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            icon_set_id,
            draft,
            published_versions,
        })
    }

    /// Fails `ICON_SET_ALREADY_EXISTS` if the id is taken; otherwise
    /// inserts version 1 as draft only.
    pub fn create(&self, request: &CreateIconSetRequest) -> Result<IconSetRecord, StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let icon_set_id = normalize_id(&request.icon_set_id, "iconSetId")?;
        if self.draft_row(&conn, &icon_set_id)?.is_some() {
            return Err(StoreError::conflict(
                "ICON_SET_ALREADY_EXISTS",
                format!("Iconset '{icon_set_id}' already exists."),
            )
            .with_details(json!({"iconSetId": icon_set_id})));
        }
        let bundle =
            IconSetBundle::build(&icon_set_id, 1, &request.name, &request.entries, Utc::now())?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        tx.commit()?;
        self.get(&icon_set_id)
    }

    /// Replaces the draft with `draftVersion + 1` built from the request.
    pub fn update(
        &self,
        icon_set_id: &str,
        request: &UpdateIconSetRequest,
    ) -> Result<IconSetRecord, StoreError> {
        let _guard = self.guard();
        let icon_set_id = normalize_id(icon_set_id, "iconSetId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &icon_set_id)?;
        let next = IconSetBundle::build(
            &icon_set_id,
            current.version + 1,
            &request.name,
            &request.entries,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&icon_set_id)
    }

    /// Reads the draft, sets one entry, and rebuilds as an update.
    pub fn upsert_entry(
        &self,
        icon_set_id: &str,
        type_key: &str,
        icon: &str,
    ) -> Result<IconSetRecord, StoreError> {
        let _guard = self.guard();
        let icon_set_id = normalize_id(icon_set_id, "iconSetId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &icon_set_id)?;
        let mut entries = current.entries.clone();
        entries.insert(normalize_type_key(type_key)?, icon.to_string());
        let next = IconSetBundle::build(
            &icon_set_id,
            current.version + 1,
            &current.name,
            &entries,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&icon_set_id)
    }

    /// Removes one entry and rebuilds as an update. Removing the last
    /// remaining entry is rejected and leaves the draft unchanged.
    pub fn delete_entry(
        &self,
        icon_set_id: &str,
        type_key: &str,
    ) -> Result<IconSetRecord, StoreError> {
        let _guard = self.guard();
        let icon_set_id = normalize_id(icon_set_id, "iconSetId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &icon_set_id)?;
        let type_key = normalize_type_key(type_key)?;
        let mut entries = current.entries.clone();
        if entries.remove(&type_key).is_none() {
            return Err(StoreError::not_found(
                "ICON_SET_ENTRY_NOT_FOUND",
                format!("Iconset '{icon_set_id}' has no entry '{type_key}'."),
            )
            .with_details(json!({"iconSetId": icon_set_id, "key": type_key})));
        }
        if entries.is_empty() {
            return Err(StoreError::validation(
                "ICON_SET_ENTRIES_EMPTY",
                format!("Iconset '{icon_set_id}' must keep at least one entry."),
            )
            .with_details(json!({"iconSetId": icon_set_id})));
        }
        let next = IconSetBundle::build(
            &icon_set_id,
            current.version + 1,
            &current.name,
            &entries,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&icon_set_id)
    }

    /// Copies the current draft into the published set. A second call
    /// while the draft is unchanged is a conflict, not a no-op.
    pub fn publish(&self, icon_set_id: &str) -> Result<IconSetBundle, StoreError> {
        let _guard = self.guard();
        let icon_set_id = normalize_id(icon_set_id, "iconSetId")?;
        let mut conn = self.db.connect()?;
        let draft = self.require_draft(&conn, &icon_set_id)?;
        let already: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM icon_set_published_versions
             WHERE icon_set_id = ?1 AND version = ?2)",
            params![icon_set_id, draft.version],
            |row| row.get(0),
        )?;
        if already {
            return Err(StoreError::conflict(
                "ICON_SET_VERSION_ALREADY_PUBLISHED",
                format!("Iconset '{icon_set_id}' version {} is already published.", draft.version),
            )
            .with_details(json!({"iconSetId": icon_set_id, "version": draft.version})));
        }
        let tx = conn.transaction()?;
        insert_published(&tx, &draft)?;
        tx.commit()?;
        Ok(draft)
    }

    /// Resolves a bundle at a lifecycle stage, optionally pinned to an
    /// exact version.
    pub fn get_bundle(
        &self,
        icon_set_id: &str,
        stage: Stage,
        version: Option<u32>,
    ) -> Result<IconSetBundle, StoreError> {
        let conn = self.db.connect()?;
        let icon_set_id = normalize_id(icon_set_id, "iconSetId")?;
        let draft = self.require_draft(&conn, &icon_set_id)?;
        match stage {
            Stage::Draft => match version {
                Some(requested) if requested != draft.version => Err(version_not_found(
                    &icon_set_id,
                    requested,
                )),
                _ => Ok(draft),
            },
            Stage::Published => match version {
                Some(requested) => self
                    .published_bundle(&conn, &icon_set_id, requested)?
                    .ok_or_else(|| version_not_found(&icon_set_id, requested)),
                None => {
                    let latest: Option<u32> = conn.query_row(
                        "SELECT MAX(version) FROM icon_set_published_versions WHERE icon_set_id = ?1",
                        params![icon_set_id],
                        |row| row.get(0),
                    )?;
                    match latest {
                        Some(latest) => self
                            .published_bundle(&conn, &icon_set_id, latest)?
                            .ok_or_else(|| version_not_found(&icon_set_id, latest)),
                        None => Err(StoreError::not_found(
                            "ICON_SET_NOT_PUBLISHED",
                            format!("Iconset '{icon_set_id}' has no published versions."),
                        )
                        .with_details(json!({"iconSetId": icon_set_id}))),
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
        icon_set_id: &str,
    ) -> Result<Option<(String, u32, String, String)>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, draft_version, draft_updated_at, draft_checksum
                 FROM icon_sets WHERE icon_set_id = ?1",
                params![icon_set_id],
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
        icon_set_id: &str,
    ) -> Result<IconSetBundle, StoreError> {
        let (name, version, updated_at, stored_checksum) = self
            .draft_row(conn, icon_set_id)?
            .ok_or_else(|| {
                StoreError::not_found(
                    "ICON_SET_NOT_FOUND",
                    format!("Iconset '{icon_set_id}' was not found."),
                )
                .with_details(json!({"iconSetId": icon_set_id}))
            })?;
        let entries = self.entry_map(
            conn,
            "SELECT type_key, icon FROM icon_set_draft_entries WHERE icon_set_id = ?1",
            params![icon_set_id],
        )?;
        rebuild(icon_set_id, version, &name, &entries, &updated_at, &stored_checksum)
    }

    fn published_bundle(
        &self,
        conn: &Connection,
        icon_set_id: &str,
        version: u32,
    ) -> Result<Option<IconSetBundle>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, updated_at, checksum FROM icon_set_published_versions
                 WHERE icon_set_id = ?1 AND version = ?2",
                params![icon_set_id, version],
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
            "SELECT type_key, icon FROM icon_set_published_entries
             WHERE icon_set_id = ?1 AND version = ?2",
            params![icon_set_id, version],
        )?;
        rebuild(icon_set_id, version, &name, &entries, &updated_at, &stored_checksum).map(Some)
    }

    fn published_bundles(
        &self,
        conn: &Connection,
        icon_set_id: &str,
    ) -> Result<Vec<IconSetBundle>, StoreError> {
        let versions = {
            let mut statement = conn.prepare(
                "SELECT version FROM icon_set_published_versions
                 WHERE icon_set_id = ?1 ORDER BY version",
            )?;
            let rows = statement
                .query_map(params![icon_set_id], |row| row.get::<_, u32>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        let mut bundles = Vec::with_capacity(versions.len());
        for version in versions {
            if let Some(bundle) = self.published_bundle(conn, icon_set_id, version)? {
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
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let mut statement = conn.prepare(sql)?;
        let entries = statement
            .query_map(parameters, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(entries)
    }
}

fn corrupted(icon_set_id: &str, reason: &str) -> StoreError {
    StoreError::fatal(
        "ICON_SET_STORAGE_CORRUPTED",
        format!("Stored iconset '{icon_set_id}' is corrupted: {reason}."),
    )
    .with_details(json!({"iconSetId": icon_set_id}))
}

fn version_not_found(icon_set_id: &str, version: u32) -> StoreError {
    StoreError::not_found(
        "ICON_SET_VERSION_NOT_FOUND",
        format!("Iconset '{icon_set_id}' version {version} was not found."),
    )
    .with_details(json!({"iconSetId": icon_set_id, "version": version}))
}

/// Rebuilds a bundle from stored parts and cross-checks the stored
/// checksum against the recomputed one.
fn rebuild(
    icon_set_id: &str,
    version: u32,
    name: &str,
    entries: &BTreeMap<String, String>,
    updated_at: &str,
    stored_checksum: &str,
) -> Result<IconSetBundle, StoreError> {
    let updated_at = parse_timestamp(updated_at).map_err(|err| corrupted(icon_set_id, &err))?;
    let bundle = IconSetBundle::build(icon_set_id, version, name, entries, updated_at)
        .map_err(|err| corrupted(icon_set_id, &err.message))?;
    if bundle.checksum != stored_checksum {
        return Err(corrupted(icon_set_id, "checksum mismatch"));
    }
    Ok(bundle)
}

fn insert_draft(tx: &rusqlite::Transaction<'_>, bundle: &IconSetBundle) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO icon_sets (icon_set_id, name, draft_version, draft_updated_at, draft_checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bundle.icon_set_id,
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
    bundle: &IconSetBundle,
) -> Result<(), StoreError> {
    for (type_key, icon) in &bundle.entries {
        tx.execute(
            "INSERT INTO icon_set_draft_entries (icon_set_id, type_key, icon) VALUES (?1, ?2, ?3)",
            params![bundle.icon_set_id, type_key, icon],
        )?;
    }
    Ok(())
}

/// Atomically swaps the draft for `next`, compare-and-swapping on the
/// version the caller read. Zero affected rows means another writer got
/// there first.
fn replace_draft(
    conn: &mut Connection,
    next: &IconSetBundle,
    expected_version: u32,
) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    let affected = tx.execute(
        "UPDATE icon_sets SET name = ?1, draft_version = ?2, draft_updated_at = ?3, draft_checksum = ?4
         WHERE icon_set_id = ?5 AND draft_version = ?6",
        params![
            next.name,
            next.version,
            next.updated_at.to_rfc3339(),
            next.checksum,
            next.icon_set_id,
            expected_version
        ],
    )?;
    if affected == 0 {
        return Err(StoreError::conflict(
            "ICON_SET_CONCURRENT_MODIFICATION",
            format!(
                "Iconset '{}' draft moved past version {expected_version}.",
                next.icon_set_id
            ),
        )
        .with_details(json!({"iconSetId": next.icon_set_id, "expectedVersion": expected_version})));
    }
    tx.execute(
        "DELETE FROM icon_set_draft_entries WHERE icon_set_id = ?1",
        params![next.icon_set_id],
    )?;
    insert_draft_entries(&tx, next)?;
    tx.commit()?;
    Ok(())
}

fn insert_published(
    tx: &rusqlite::Transaction<'_>,
    bundle: &IconSetBundle,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO icon_set_published_versions (icon_set_id, version, name, updated_at, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bundle.icon_set_id,
            bundle.version,
            bundle.name,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum
        ],
    )?;
    for (type_key, icon) in &bundle.entries {
        tx.execute(
            "INSERT INTO icon_set_published_entries (icon_set_id, version, type_key, icon)
             VALUES (?1, ?2, ?3, ?4)",
            params![bundle.icon_set_id, bundle.version, type_key, icon],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> IconSetStore {
        let db = Database::open(dir.path().join("graphapi.db")).unwrap();
        IconSetStore::new(db)
    }

    fn request(id: &str, pairs: &[(&str, &str)]) -> CreateIconSetRequest {
        CreateIconSetRequest {
            icon_set_id: id.to_string(),
            name: format!("{id} icons"),
            entries: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn create_starts_at_version_one_unpublished() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let record = store
            .create(&request("telecom", &[("router", "mdi:router")]))
            .unwrap();
        assert_eq!(record.draft.version, 1);
        assert!(record.published_versions.is_empty());
        let err = store.get_bundle("telecom", Stage::Published, None).unwrap_err();
        assert_eq!(err.code, "ICON_SET_NOT_PUBLISHED");
    }

    #[test]
    fn duplicate_create_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        let err = store
            .create(&request("telecom", &[("router", "mdi:router")]))
            .unwrap_err();
        assert_eq!(err.status_code, 409);
        assert_eq!(err.code, "ICON_SET_ALREADY_EXISTS");
    }

    #[test]
    fn updates_increment_version_monotonically() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        for expected in 2..=5u32 {
            let record = store
                .update(
                    "telecom",
                    &UpdateIconSetRequest {
                        name: "Telecom".to_string(),
                        entries: [("router".to_string(), "mdi:router".to_string())]
                            .into_iter()
                            .collect(),
                    },
                )
                .unwrap();
            assert_eq!(record.draft.version, expected);
        }
    }

    #[test]
    fn publish_is_once_per_version() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        let bundle = store.publish("telecom").unwrap();
        assert_eq!(bundle.version, 1);
        let err = store.publish("telecom").unwrap_err();
        assert_eq!(err.code, "ICON_SET_VERSION_ALREADY_PUBLISHED");
        store.upsert_entry("telecom", "gateway", "mdi:gate").unwrap();
        assert_eq!(store.publish("telecom").unwrap().version, 2);
    }

    #[test]
    fn published_snapshots_are_immutable_under_draft_changes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        let published = store.publish("telecom").unwrap();
        store.upsert_entry("telecom", "router", "mdi:router-wireless").unwrap();
        let fetched = store.get_bundle("telecom", Stage::Published, Some(1)).unwrap();
        assert_eq!(fetched.entries["router"], "mdi:router");
        assert_eq!(fetched.checksum, published.checksum);
    }

    #[test]
    fn get_bundle_resolves_stages_and_versions() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        store.publish("telecom").unwrap();
        store.upsert_entry("telecom", "gateway", "mdi:gate").unwrap();
        store.publish("telecom").unwrap();

        assert_eq!(store.get_bundle("telecom", Stage::Draft, None).unwrap().version, 2);
        assert_eq!(store.get_bundle("telecom", Stage::Published, None).unwrap().version, 2);
        assert_eq!(
            store.get_bundle("telecom", Stage::Published, Some(1)).unwrap().version,
            1
        );
        let err = store.get_bundle("telecom", Stage::Published, Some(9)).unwrap_err();
        assert_eq!(err.code, "ICON_SET_VERSION_NOT_FOUND");
        let err = store.get_bundle("telecom", Stage::Draft, Some(1)).unwrap_err();
        assert_eq!(err.code, "ICON_SET_VERSION_NOT_FOUND");
        let err = store.get_bundle("missing", Stage::Draft, None).unwrap_err();
        assert_eq!(err.code, "ICON_SET_NOT_FOUND");
    }

    #[test]
    fn deleting_the_last_entry_is_rejected_and_leaves_the_draft_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        let err = store.delete_entry("telecom", "router").unwrap_err();
        assert_eq!(err.status_code, 400);
        assert_eq!(err.code, "ICON_SET_ENTRIES_EMPTY");
        let draft = store.get_bundle("telecom", Stage::Draft, None).unwrap();
        assert_eq!(draft.version, 1);
        assert_eq!(draft.entries["router"], "mdi:router");
    }

    #[test]
    fn deleting_an_absent_entry_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        let err = store.delete_entry("telecom", "missing").unwrap_err();
        assert_eq!(err.code, "ICON_SET_ENTRY_NOT_FOUND");
    }

    #[test]
    fn ensure_default_is_idempotent_and_publishes_version_one() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let seed = request("default", &[("router", "mdi:router")]);
        store.ensure_default(&seed).unwrap();
        store.ensure_default(&seed).unwrap();
        let record = store.get("default").unwrap();
        assert_eq!(record.draft.version, 1);
        assert_eq!(record.published_versions.len(), 1);
    }

    #[test]
    fn list_reports_latest_published_version() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("aa", &[("router", "mdi:router")])).unwrap();
        store.create(&request("bb", &[("router", "mdi:router")])).unwrap();
        store.publish("bb").unwrap();
        let listed = store.list().unwrap().icon_sets;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].icon_set_id, "aa");
        assert_eq!(listed[0].published_version, None);
        assert_eq!(listed[1].published_version, Some(1));
    }

    #[test]
    fn checksum_mismatch_reads_as_corruption() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("telecom", &[("router", "mdi:router")])).unwrap();
        let conn = store.db.connect().unwrap();
        conn.execute(
            "UPDATE icon_set_draft_entries SET icon = 'mdi:tampered' WHERE icon_set_id = 'telecom'",
            [],
        )
        .unwrap();
        drop(conn);
        let err = store.get_bundle("telecom", Stage::Draft, None).unwrap_err();
        assert_eq!(err.status_code, 500);
        assert_eq!(err.code, "ICON_SET_STORAGE_CORRUPTED");
    }
}
