//! SQL schema constants and post-migration verification.
//!
//! One table pair per resource kind: `{kind}s` holds the single draft
//! row per resource, `{kind}_published_versions` the append-only
//! snapshots. Entry-bearing kinds (icon, layout, link sets) split their
//! entries into `{kind}_draft_entries` / `{kind}_published_entries`
//! keyed per entry so single-entry upsert/delete never rewrites a JSON
//! blob. Graph types and themes keep a payload blob column alongside
//! the indexed checksum columns.

use rusqlite::Connection;

use crate::error::StoreError;

pub const CREATE_ICON_SET_TABLES: &str = "
CREATE TABLE IF NOT EXISTS icon_sets (
    icon_set_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    draft_version INTEGER NOT NULL,
    draft_updated_at TEXT NOT NULL,
    draft_checksum TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS icon_set_draft_entries (
    icon_set_id TEXT NOT NULL REFERENCES icon_sets(icon_set_id) ON DELETE CASCADE,
    type_key TEXT NOT NULL,
    icon TEXT NOT NULL,
    PRIMARY KEY (icon_set_id, type_key)
);
CREATE TABLE IF NOT EXISTS icon_set_published_versions (
    icon_set_id TEXT NOT NULL REFERENCES icon_sets(icon_set_id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    name TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    checksum TEXT NOT NULL,
    PRIMARY KEY (icon_set_id, version)
);
CREATE TABLE IF NOT EXISTS icon_set_published_entries (
    icon_set_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    type_key TEXT NOT NULL,
    icon TEXT NOT NULL,
    PRIMARY KEY (icon_set_id, version, type_key),
    FOREIGN KEY (icon_set_id, version)
        REFERENCES icon_set_published_versions(icon_set_id, version) ON DELETE CASCADE
);
";

pub const CREATE_LAYOUT_SET_TABLES: &str = "
CREATE TABLE IF NOT EXISTS layout_sets (
    layout_set_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    draft_version INTEGER NOT NULL,
    draft_updated_at TEXT NOT NULL,
    draft_checksum TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS layout_set_draft_entries (
    layout_set_id TEXT NOT NULL REFERENCES layout_sets(layout_set_id) ON DELETE CASCADE,
    setting_key TEXT NOT NULL,
    setting_value TEXT NOT NULL,
    PRIMARY KEY (layout_set_id, setting_key)
);
CREATE TABLE IF NOT EXISTS layout_set_published_versions (
    layout_set_id TEXT NOT NULL REFERENCES layout_sets(layout_set_id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    name TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    checksum TEXT NOT NULL,
    PRIMARY KEY (layout_set_id, version)
);
CREATE TABLE IF NOT EXISTS layout_set_published_entries (
    layout_set_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    setting_key TEXT NOT NULL,
    setting_value TEXT NOT NULL,
    PRIMARY KEY (layout_set_id, version, setting_key),
    FOREIGN KEY (layout_set_id, version)
        REFERENCES layout_set_published_versions(layout_set_id, version) ON DELETE CASCADE
);
";

pub const CREATE_LINK_SET_TABLES: &str = "
CREATE TABLE IF NOT EXISTS link_sets (
    link_set_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    draft_version INTEGER NOT NULL,
    draft_updated_at TEXT NOT NULL,
    draft_checksum TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS link_set_draft_entries (
    link_set_id TEXT NOT NULL REFERENCES link_sets(link_set_id) ON DELETE CASCADE,
    link_type_key TEXT NOT NULL,
    definition TEXT NOT NULL,
    PRIMARY KEY (link_set_id, link_type_key)
);
CREATE TABLE IF NOT EXISTS link_set_published_versions (
    link_set_id TEXT NOT NULL REFERENCES link_sets(link_set_id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    name TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    checksum TEXT NOT NULL,
    PRIMARY KEY (link_set_id, version)
);
CREATE TABLE IF NOT EXISTS link_set_published_entries (
    link_set_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    link_type_key TEXT NOT NULL,
    definition TEXT NOT NULL,
    PRIMARY KEY (link_set_id, version, link_type_key),
    FOREIGN KEY (link_set_id, version)
        REFERENCES link_set_published_versions(link_set_id, version) ON DELETE CASCADE
);
";

pub const CREATE_GRAPH_TYPE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS graph_types (
    graph_type_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    draft_version INTEGER NOT NULL,
    draft_updated_at TEXT NOT NULL,
    draft_checksum TEXT NOT NULL,
    draft_runtime_checksum TEXT NOT NULL DEFAULT '',
    draft_icon_set_resolution_checksum TEXT NOT NULL DEFAULT '',
    draft_payload TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS graph_type_published_versions (
    graph_type_id TEXT NOT NULL REFERENCES graph_types(graph_type_id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    name TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    checksum TEXT NOT NULL,
    runtime_checksum TEXT NOT NULL DEFAULT '',
    icon_set_resolution_checksum TEXT NOT NULL DEFAULT '',
    payload TEXT NOT NULL,
    PRIMARY KEY (graph_type_id, version)
);
";

pub const CREATE_THEME_TABLES: &str = "
CREATE TABLE IF NOT EXISTS themes (
    theme_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    draft_version INTEGER NOT NULL,
    draft_updated_at TEXT NOT NULL,
    draft_checksum TEXT NOT NULL,
    draft_payload TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS theme_published_versions (
    theme_id TEXT NOT NULL REFERENCES themes(theme_id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    name TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    checksum TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (theme_id, version)
);
";

/// Expected columns per table, checked after migration. Extra columns
/// are tolerated; missing columns are not.
const EXPECTED_COLUMNS: &[(&str, &str, &[&str])] = &[
    ("ICON_SET", "icon_sets", &[
        "icon_set_id", "name", "draft_version", "draft_updated_at", "draft_checksum",
    ]),
    ("ICON_SET", "icon_set_draft_entries", &["icon_set_id", "type_key", "icon"]),
    ("ICON_SET", "icon_set_published_versions", &[
        "icon_set_id", "version", "name", "updated_at", "checksum",
    ]),
    ("ICON_SET", "icon_set_published_entries", &[
        "icon_set_id", "version", "type_key", "icon",
    ]),
    ("LAYOUT_SET", "layout_sets", &[
        "layout_set_id", "name", "draft_version", "draft_updated_at", "draft_checksum",
    ]),
    ("LAYOUT_SET", "layout_set_draft_entries", &[
        "layout_set_id", "setting_key", "setting_value",
    ]),
    ("LAYOUT_SET", "layout_set_published_versions", &[
        "layout_set_id", "version", "name", "updated_at", "checksum",
    ]),
    ("LAYOUT_SET", "layout_set_published_entries", &[
        "layout_set_id", "version", "setting_key", "setting_value",
    ]),
    ("LINK_SET", "link_sets", &[
        "link_set_id", "name", "draft_version", "draft_updated_at", "draft_checksum",
    ]),
    ("LINK_SET", "link_set_draft_entries", &[
        "link_set_id", "link_type_key", "definition",
    ]),
    ("LINK_SET", "link_set_published_versions", &[
        "link_set_id", "version", "name", "updated_at", "checksum",
    ]),
    ("LINK_SET", "link_set_published_entries", &[
        "link_set_id", "version", "link_type_key", "definition",
    ]),
    ("GRAPH_TYPE", "graph_types", &[
        "graph_type_id", "name", "draft_version", "draft_updated_at", "draft_checksum",
        "draft_runtime_checksum", "draft_icon_set_resolution_checksum", "draft_payload",
    ]),
    ("GRAPH_TYPE", "graph_type_published_versions", &[
        "graph_type_id", "version", "name", "updated_at", "checksum",
        "runtime_checksum", "icon_set_resolution_checksum", "payload",
    ]),
    ("THEME", "themes", &[
        "theme_id", "name", "draft_version", "draft_updated_at", "draft_checksum", "draft_payload",
    ]),
    ("THEME", "theme_published_versions", &[
        "theme_id", "version", "name", "updated_at", "checksum", "payload",
    ]),
];

/// Returns the column names of `table`.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let mut statement = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = statement
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Returns whether `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Returns whether `table` has a column named `column`.
pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    Ok(table_columns(conn, table)?.iter().any(|c| c == column))
}

/// Diffs actual columns against the expected set for every table.
/// A missing column after migration means the database shape is beyond
/// what the migrations know how to repair.
pub fn verify(conn: &Connection) -> Result<(), StoreError> {
    for (kind, table, expected) in EXPECTED_COLUMNS {
        let actual = table_columns(conn, table)?;
        let missing: Vec<&str> = expected
            .iter()
            .filter(|column| !actual.iter().any(|c| c == *column))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::fatal(
                format!("{kind}_SCHEMA_MIGRATION_REQUIRED"),
                format!("Table '{table}' is missing columns: {}.", missing.join(", ")),
            )
            .with_details(serde_json::json!({
                "table": table,
                "missingColumns": missing,
            })));
        }
    }
    Ok(())
}
