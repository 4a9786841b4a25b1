//! Schema migrations, keyed by SQLite's `user_version` pragma.
//!
//! Two repair strategies exist. Additive: new checksum columns are
//! added with `DEFAULT ''` and backfilled from each row's payload blob.
//! Structural: the layout-set tables once stored entries as a JSON
//! payload blob; those tables are renamed to a `_legacy_v0` suffix,
//! the normalized tables are created, every legacy row is replayed
//! through bundle validation, and the legacy tables are dropped.
//!
//! Each data-bearing step is a pure `legacy row -> bundle` function so
//! it can be tested apart from the live store. If a stored payload
//! fails validation the migration stops with `*_STORAGE_CORRUPTED`;
//! a shape the migrations cannot close fails
//! `*_SCHEMA_MIGRATION_REQUIRED`. Neither is retried: silently guessing
//! at data shapes is worse than refusing to start.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use serde_json::Value;
use tracing::info;

use graphapi_core::layout_set::LayoutSetBundle;
use graphapi_core::settings::SettingsMap;
use graphapi_core::ElkSettingsValidator;

use crate::error::StoreError;
use crate::schema;

/// Schema version this build reads and writes.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Brings the database at `conn` up to [`CURRENT_SCHEMA_VERSION`] and
/// verifies the resulting shape.
pub fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let version = user_version(conn)?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::fatal(
            "SCHEMA_MIGRATION_REQUIRED",
            format!(
                "Database schema version {version} is newer than supported version {CURRENT_SCHEMA_VERSION}."
            ),
        ));
    }
    if version < CURRENT_SCHEMA_VERSION {
        info!(from = version, to = CURRENT_SCHEMA_VERSION, "migrating storage schema");
        let tx = conn.transaction()?;
        if version < 1 {
            migrate_to_v1(&tx)?;
        }
        if version < 2 {
            migrate_to_v2(&tx)?;
        }
        tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
        tx.commit()?;
    }
    schema::verify(conn)
}

fn user_version(conn: &Connection) -> Result<i32, StoreError> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// v1: create the current tables. If layout sets exist in the legacy
/// payload-blob shape, replay them into the normalized tables first.
fn migrate_to_v1(tx: &Transaction<'_>) -> Result<(), StoreError> {
    let legacy_layout = schema::table_exists(tx, "layout_sets")?
        && schema::has_column(tx, "layout_sets", "draft_payload")?;
    if legacy_layout {
        migrate_legacy_layout_sets(tx)?;
    } else {
        tx.execute_batch(schema::CREATE_LAYOUT_SET_TABLES)?;
    }
    tx.execute_batch(schema::CREATE_ICON_SET_TABLES)?;
    tx.execute_batch(schema::CREATE_LINK_SET_TABLES)?;
    tx.execute_batch(schema::CREATE_GRAPH_TYPE_TABLES)?;
    tx.execute_batch(schema::CREATE_THEME_TABLES)?;
    Ok(())
}

/// v2: additive checksum columns on the graph-type tables, backfilled
/// from each row's payload blob.
fn migrate_to_v2(tx: &Transaction<'_>) -> Result<(), StoreError> {
    if !schema::table_exists(tx, "graph_types")? {
        return Ok(());
    }
    for (table, column) in [
        ("graph_types", "draft_runtime_checksum"),
        ("graph_types", "draft_icon_set_resolution_checksum"),
        ("graph_type_published_versions", "runtime_checksum"),
        ("graph_type_published_versions", "icon_set_resolution_checksum"),
    ] {
        if !schema::has_column(tx, table, column)? {
            info!(table, column, "adding missing column");
            tx.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} TEXT NOT NULL DEFAULT ''"
            ))?;
        }
    }
    backfill_graph_type_checksums(tx, "graph_types", "graph_type_id", "draft_payload", &[
        "draft_runtime_checksum",
        "draft_icon_set_resolution_checksum",
    ])?;
    backfill_graph_type_checksums(
        tx,
        "graph_type_published_versions",
        "rowid",
        "payload",
        &["runtime_checksum", "icon_set_resolution_checksum"],
    )?;
    Ok(())
}

fn backfill_graph_type_checksums(
    tx: &Transaction<'_>,
    table: &str,
    key_column: &str,
    payload_column: &str,
    target_columns: &[&str; 2],
) -> Result<(), StoreError> {
    let mut statement = tx.prepare(&format!(
        "SELECT {key_column}, {payload_column} FROM {table}
         WHERE {} = '' OR {} = ''",
        target_columns[0], target_columns[1]
    ))?;
    let rows = statement
        .query_map([], |row| {
            Ok((row.get::<_, rusqlite::types::Value>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    drop(statement);

    for (key, payload) in rows {
        let (runtime_checksum, resolution_checksum) = graph_type_checksums_from_payload(&payload)?;
        tx.execute(
            &format!(
                "UPDATE {table} SET {} = ?1, {} = ?2 WHERE {key_column} = ?3",
                target_columns[0], target_columns[1]
            ),
            params![runtime_checksum, resolution_checksum, key],
        )?;
    }
    Ok(())
}

/// Extracts `(runtimeChecksum, iconSetResolutionChecksum)` from a
/// stored graph-type payload blob. Absent fields backfill as empty;
/// unparseable payloads are corruption.
pub fn graph_type_checksums_from_payload(payload: &str) -> Result<(String, String), StoreError> {
    let value: Value = serde_json::from_str(payload).map_err(|err| {
        StoreError::fatal(
            "GRAPH_TYPE_STORAGE_CORRUPTED",
            format!("Stored graph type payload is not valid JSON: {err}."),
        )
    })?;
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Ok((field("runtimeChecksum"), field("iconSetResolutionChecksum")))
}

/// Rebuilds a layout-set bundle from one legacy payload-blob row.
/// The payload must hold an `elkSettings` object; everything else is
/// taken from the row's own columns and the checksum is recomputed.
pub fn layout_set_from_legacy(
    layout_set_id: &str,
    version: u32,
    name: &str,
    updated_at: &str,
    payload: &str,
) -> Result<LayoutSetBundle, StoreError> {
    let corrupted = |message: String| StoreError::fatal("LAYOUT_SET_STORAGE_CORRUPTED", message);
    let value: Value = serde_json::from_str(payload).map_err(|err| {
        corrupted(format!(
            "Legacy layout set '{layout_set_id}' payload is not valid JSON: {err}."
        ))
    })?;
    let elk_settings: SettingsMap = match value.get("elkSettings") {
        Some(Value::Object(map)) => map.clone(),
        _ => {
            return Err(corrupted(format!(
                "Legacy layout set '{layout_set_id}' payload has no elkSettings object."
            )))
        }
    };
    let updated_at = parse_timestamp(updated_at).map_err(|err| {
        corrupted(format!(
            "Legacy layout set '{layout_set_id}' has an invalid timestamp: {err}."
        ))
    })?;
    LayoutSetBundle::build(
        layout_set_id,
        version,
        name,
        &elk_settings,
        &ElkSettingsValidator,
        updated_at,
    )
    .map_err(|err| {
        corrupted(format!(
            "Legacy layout set '{layout_set_id}' failed validation: {}.",
            err.message
        ))
    })
}

/// Parses an RFC 3339 timestamp into UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| err.to_string())
}

fn migrate_legacy_layout_sets(tx: &Transaction<'_>) -> Result<(), StoreError> {
    info!("replaying legacy layout set tables into normalized shape");
    tx.execute_batch("ALTER TABLE layout_sets RENAME TO layout_sets_legacy_v0")?;
    let has_legacy_published = schema::table_exists(tx, "layout_set_published_versions")?;
    if has_legacy_published {
        tx.execute_batch(
            "ALTER TABLE layout_set_published_versions RENAME TO layout_set_published_versions_legacy_v0",
        )?;
    }
    tx.execute_batch(schema::CREATE_LAYOUT_SET_TABLES)?;

    let drafts = {
        let mut statement = tx.prepare(
            "SELECT layout_set_id, name, draft_version, draft_updated_at, draft_payload
             FROM layout_sets_legacy_v0",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    for (id, name, version, updated_at, payload) in drafts {
        let bundle = layout_set_from_legacy(&id, version, &name, &updated_at, &payload)?;
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
        for (key, value) in &bundle.elk_settings {
            tx.execute(
                "INSERT INTO layout_set_draft_entries (layout_set_id, setting_key, setting_value)
                 VALUES (?1, ?2, ?3)",
                params![bundle.layout_set_id, key, serde_json::to_string(value).map_err(|err| {
                    StoreError::fatal(
                        "LAYOUT_SET_STORAGE_CORRUPTED",
                        format!("failed to serialize setting value: {err}"),
                    )
                })?],
            )?;
        }
    }

    if has_legacy_published {
        let published = {
            let mut statement = tx.prepare(
                "SELECT layout_set_id, version, name, updated_at, payload
                 FROM layout_set_published_versions_legacy_v0",
            )?;
            let rows = statement
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        for (id, version, name, updated_at, payload) in published {
            let bundle = layout_set_from_legacy(&id, version, &name, &updated_at, &payload)?;
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
            for (key, value) in &bundle.elk_settings {
                tx.execute(
                    "INSERT INTO layout_set_published_entries (layout_set_id, version, setting_key, setting_value)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        bundle.layout_set_id,
                        bundle.version,
                        key,
                        serde_json::to_string(value).map_err(|err| {
                            StoreError::fatal(
                                "LAYOUT_SET_STORAGE_CORRUPTED",
                                format!("failed to serialize setting value: {err}"),
                            )
                        })?
                    ],
                )?;
            }
        }
        tx.execute_batch("DROP TABLE layout_set_published_versions_legacy_v0")?;
    }
    tx.execute_batch("DROP TABLE layout_sets_legacy_v0")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;
    use tempfile::TempDir;

    fn db_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("graphapi.db")
    }

    #[test]
    fn fresh_database_lands_on_current_version() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(db_path(&dir)).unwrap();
        let conn = db.connect().unwrap();
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
        assert!(schema::table_exists(&conn, "icon_sets").unwrap());
        assert!(schema::table_exists(&conn, "layout_set_draft_entries").unwrap());
        assert!(schema::table_exists(&conn, "graph_type_published_versions").unwrap());
    }

    #[test]
    fn reopening_is_idempotent() {
        let dir = TempDir::new().unwrap();
        Database::open(db_path(&dir)).unwrap();
        Database::open(db_path(&dir)).unwrap();
    }

    fn legacy_layout_payload(settings: &Value) -> String {
        json!({
            "schemaVersion": "v1",
            "layoutSetId": "default",
            "name": "Default Layout Set",
            "elkSettings": settings,
        })
        .to_string()
    }

    fn seed_legacy_layout_db(path: &std::path::Path) -> (String, String) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE layout_sets (
                 layout_set_id TEXT PRIMARY KEY,
                 name TEXT NOT NULL,
                 draft_version INTEGER NOT NULL,
                 draft_updated_at TEXT NOT NULL,
                 draft_checksum TEXT NOT NULL,
                 draft_payload TEXT NOT NULL
             );
             CREATE TABLE layout_set_published_versions (
                 layout_set_id TEXT NOT NULL,
                 version INTEGER NOT NULL,
                 name TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 checksum TEXT NOT NULL,
                 payload TEXT NOT NULL,
                 PRIMARY KEY (layout_set_id, version)
             );",
        )
        .unwrap();

        let settings = json!({"elk.algorithm": "layered", "spacing.nodeNode": 40});
        let now = Utc::now().to_rfc3339();
        let draft = layout_set_from_legacy(
            "default",
            2,
            "Default Layout Set",
            &now,
            &legacy_layout_payload(&settings),
        )
        .unwrap();
        let published = layout_set_from_legacy(
            "default",
            1,
            "Default Layout Set",
            &now,
            &legacy_layout_payload(&settings),
        )
        .unwrap();
        conn.execute(
            "INSERT INTO layout_sets VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                "default",
                "Default Layout Set",
                2,
                now,
                draft.checksum,
                legacy_layout_payload(&settings)
            ],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO layout_set_published_versions VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                "default",
                1,
                "Default Layout Set",
                now,
                published.checksum,
                legacy_layout_payload(&settings)
            ],
        )
        .unwrap();
        (draft.checksum, published.checksum)
    }

    #[test]
    fn legacy_layout_blob_tables_are_replayed_into_normalized_rows() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        let (draft_checksum, published_checksum) = seed_legacy_layout_db(&path);

        let db = Database::open(&path).unwrap();
        let conn = db.connect().unwrap();

        let (version, checksum): (u32, String) = conn
            .query_row(
                "SELECT draft_version, draft_checksum FROM layout_sets WHERE layout_set_id = 'default'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(version, 2);
        assert_eq!(checksum, draft_checksum);

        let stored_published: String = conn
            .query_row(
                "SELECT checksum FROM layout_set_published_versions
                 WHERE layout_set_id = 'default' AND version = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored_published, published_checksum);

        let entry_count: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM layout_set_draft_entries WHERE layout_set_id = 'default'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(entry_count, 2);

        assert!(!schema::table_exists(&conn, "layout_sets_legacy_v0").unwrap());
        assert!(!schema::table_exists(&conn, "layout_set_published_versions_legacy_v0").unwrap());
    }

    #[test]
    fn corrupted_legacy_payload_stops_the_migration() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE layout_sets (
                 layout_set_id TEXT PRIMARY KEY,
                 name TEXT NOT NULL,
                 draft_version INTEGER NOT NULL,
                 draft_updated_at TEXT NOT NULL,
                 draft_checksum TEXT NOT NULL,
                 draft_payload TEXT NOT NULL
             );",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO layout_sets VALUES ('bad', 'Bad', 1, ?1, '', 'not json')",
            params![Utc::now().to_rfc3339()],
        )
        .unwrap();
        drop(conn);

        let err = Database::open(&path).unwrap_err();
        assert_eq!(err.code, "LAYOUT_SET_STORAGE_CORRUPTED");
    }

    #[test]
    fn missing_graph_type_columns_are_added_and_backfilled() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE graph_types (
                 graph_type_id TEXT PRIMARY KEY,
                 name TEXT NOT NULL,
                 draft_version INTEGER NOT NULL,
                 draft_updated_at TEXT NOT NULL,
                 draft_checksum TEXT NOT NULL,
                 draft_payload TEXT NOT NULL
             );
             CREATE TABLE graph_type_published_versions (
                 graph_type_id TEXT NOT NULL,
                 version INTEGER NOT NULL,
                 name TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 checksum TEXT NOT NULL,
                 payload TEXT NOT NULL,
                 PRIMARY KEY (graph_type_id, version)
             );",
        )
        .unwrap();
        let payload = json!({
            "runtimeChecksum": "a".repeat(64),
            "iconSetResolutionChecksum": "b".repeat(64),
        })
        .to_string();
        conn.execute(
            "INSERT INTO graph_types VALUES ('default', 'Default', 1, ?1, '', ?2)",
            params![Utc::now().to_rfc3339(), payload],
        )
        .unwrap();
        drop(conn);

        let db = Database::open(&path).unwrap();
        let conn = db.connect().unwrap();
        let (runtime, resolution): (String, String) = conn
            .query_row(
                "SELECT draft_runtime_checksum, draft_icon_set_resolution_checksum
                 FROM graph_types WHERE graph_type_id = 'default'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(runtime, "a".repeat(64));
        assert_eq!(resolution, "b".repeat(64));
    }

    #[test]
    fn extra_columns_are_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        Database::open(&path).unwrap();
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("ALTER TABLE icon_sets ADD COLUMN operator_note TEXT")
            .unwrap();
        drop(conn);
        Database::open(&path).unwrap();
    }

    #[test]
    fn newer_schema_version_is_terminal() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        Database::open(&path).unwrap();
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
        drop(conn);
        let err = Database::open(&path).unwrap_err();
        assert_eq!(err.code, "SCHEMA_MIGRATION_REQUIRED");
    }

    #[test]
    fn checksum_extraction_defaults_missing_fields_to_empty() {
        let (runtime, resolution) = graph_type_checksums_from_payload("{}").unwrap();
        assert_eq!(runtime, "");
        assert_eq!(resolution, "");
        assert!(graph_type_checksums_from_payload("not json").is_err());
    }
}
