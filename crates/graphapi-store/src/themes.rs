//! Versioned theme store.
//!
//! Themes keep their editable fields in one payload blob per row: the
//! CSS body and the managed variables have no per-entry endpoints, so
//! nothing is gained by splitting them out. `renderCss` is derived and
//! recompiled on load rather than stored.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;

use graphapi_core::theme::{
    CreateThemeRequest, ThemeBundle, ThemeVariable, UpdateThemeRequest,
};
use graphapi_core::validate::normalize_id;
use graphapi_core::{Stage, SCHEMA_VERSION};

use crate::db::Database;
use crate::error::StoreError;
use crate::migrate::parse_timestamp;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSummary {
    pub schema_version: String,
    pub theme_id: String,
    pub name: String,
    pub draft_version: u32,
    pub published_version: Option<u32>,
    pub updated_at: chrono::DateTime<Utc>,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRecord {
    pub schema_version: String,
    pub theme_id: String,
    pub draft: ThemeBundle,
    pub published_versions: Vec<ThemeBundle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeListResponse {
    pub themes: Vec<ThemeSummary>,
}

/// Editable fields as stored in the payload column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemePayload {
    css_body: String,
    variables: BTreeMap<String, ThemeVariable>,
}

/// SQLite-backed theme store.
pub struct ThemeStore {
    db: Database,
    lock: Mutex<()>,
}

impl ThemeStore {
    pub fn new(db: Database) -> Self {
        ThemeStore {
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

    pub fn ensure_default(&self, request: &CreateThemeRequest) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let theme_id = normalize_id(&request.theme_id, "themeId")?;
        if self.draft_row(&conn, &theme_id)?.is_some() {
            return Ok(());
        }
        let bundle = ThemeBundle::build(
            &theme_id,
            1,
            &request.name,
            &request.css_body,
            &request.variables,
            Utc::now(),
        )?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        insert_published(&tx, &bundle)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list(&self) -> Result<ThemeListResponse, StoreError> {
        let conn = self.db.connect()?;
        let mut statement = conn.prepare(
            "SELECT t.theme_id, t.name, t.draft_version, t.draft_updated_at, t.draft_checksum,
                    (SELECT MAX(version) FROM theme_published_versions p
                     WHERE p.theme_id = t.theme_id)
             FROM themes t ORDER BY t.theme_id",
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
        let mut themes = Vec::with_capacity(rows.len());
        for (theme_id, name, draft_version, updated_at, checksum, published_version) in rows {
            themes.push(ThemeSummary {
                schema_version: SCHEMA_VERSION.to_string(),
                updated_at: parse_timestamp(&updated_at).map_err(|err| corrupted(&theme_id, &err))?,
                theme_id,
                name,
                draft_version,
                published_version,
                checksum,
            });
        }
        Ok(ThemeListResponse { themes })
    }

    pub fn get(&self, theme_id: &str) -> Result<ThemeRecord, StoreError> {
        let conn = self.db.connect()?;
        let theme_id = normalize_id(theme_id, "themeId")?;
        let draft = self.require_draft(&conn, &theme_id)?;
        let published_versions = self.published_bundles(&conn, &theme_id)?;
        Ok(ThemeRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            theme_id,
            draft,
            published_versions,
        })
    }

    pub fn create(&self, request: &CreateThemeRequest) -> Result<ThemeRecord, StoreError> {
        let _guard = self.guard();
        let mut conn = self.db.connect()?;
        let theme_id = normalize_id(&request.theme_id, "themeId")?;
        if self.draft_row(&conn, &theme_id)?.is_some() {
            return Err(StoreError::conflict(
                "THEME_ALREADY_EXISTS",
                format!("Theme '{theme_id}' already exists."),
            )
            .with_details(json!({"themeId": theme_id})));
        }
        let bundle = ThemeBundle::build(
            &theme_id,
            1,
            &request.name,
            &request.css_body,
            &request.variables,
            Utc::now(),
        )?;
        let tx = conn.transaction()?;
        insert_draft(&tx, &bundle)?;
        tx.commit()?;
        self.get(&theme_id)
    }

    pub fn update(
        &self,
        theme_id: &str,
        request: &UpdateThemeRequest,
    ) -> Result<ThemeRecord, StoreError> {
        let _guard = self.guard();
        let theme_id = normalize_id(theme_id, "themeId")?;
        let mut conn = self.db.connect()?;
        let current = self.require_draft(&conn, &theme_id)?;
        let next = ThemeBundle::build(
            &theme_id,
            current.version + 1,
            &request.name,
            &request.css_body,
            &request.variables,
            Utc::now(),
        )?;
        replace_draft(&mut conn, &next, current.version)?;
        self.get(&theme_id)
    }

    pub fn publish(&self, theme_id: &str) -> Result<ThemeBundle, StoreError> {
        let _guard = self.guard();
        let theme_id = normalize_id(theme_id, "themeId")?;
        let mut conn = self.db.connect()?;
        let draft = self.require_draft(&conn, &theme_id)?;
        let already: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM theme_published_versions
             WHERE theme_id = ?1 AND version = ?2)",
            params![theme_id, draft.version],
            |row| row.get(0),
        )?;
        if already {
            return Err(StoreError::conflict(
                "THEME_VERSION_ALREADY_PUBLISHED",
                format!("Theme '{theme_id}' version {} is already published.", draft.version),
            )
            .with_details(json!({"themeId": theme_id, "version": draft.version})));
        }
        let tx = conn.transaction()?;
        insert_published(&tx, &draft)?;
        tx.commit()?;
        Ok(draft)
    }

    pub fn get_bundle(
        &self,
        theme_id: &str,
        stage: Stage,
        version: Option<u32>,
    ) -> Result<ThemeBundle, StoreError> {
        let conn = self.db.connect()?;
        let theme_id = normalize_id(theme_id, "themeId")?;
        let draft = self.require_draft(&conn, &theme_id)?;
        match stage {
            Stage::Draft => match version {
                Some(requested) if requested != draft.version => {
                    Err(version_not_found(&theme_id, requested))
                }
                _ => Ok(draft),
            },
            Stage::Published => match version {
                Some(requested) => self
                    .published_bundle(&conn, &theme_id, requested)?
                    .ok_or_else(|| version_not_found(&theme_id, requested)),
                None => {
                    let latest: Option<u32> = conn.query_row(
                        "SELECT MAX(version) FROM theme_published_versions WHERE theme_id = ?1",
                        params![theme_id],
                        |row| row.get(0),
                    )?;
                    match latest {
                        Some(latest) => self
                            .published_bundle(&conn, &theme_id, latest)?
                            .ok_or_else(|| version_not_found(&theme_id, latest)),
                        None => Err(StoreError::not_found(
                            "THEME_NOT_PUBLISHED",
                            format!("Theme '{theme_id}' has no published versions."),
                        )
                        .with_details(json!({"themeId": theme_id}))),
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
        theme_id: &str,
    ) -> Result<Option<(String, u32, String, String, String)>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, draft_version, draft_updated_at, draft_checksum, draft_payload
                 FROM themes WHERE theme_id = ?1",
                params![theme_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }

    fn require_draft(&self, conn: &Connection, theme_id: &str) -> Result<ThemeBundle, StoreError> {
        let (name, version, updated_at, stored_checksum, payload) = self
            .draft_row(conn, theme_id)?
            .ok_or_else(|| {
                StoreError::not_found(
                    "THEME_NOT_FOUND",
                    format!("Theme '{theme_id}' was not found."),
                )
                .with_details(json!({"themeId": theme_id}))
            })?;
        rebuild(theme_id, version, &name, &payload, &updated_at, &stored_checksum)
    }

    fn published_bundle(
        &self,
        conn: &Connection,
        theme_id: &str,
        version: u32,
    ) -> Result<Option<ThemeBundle>, StoreError> {
        let row = conn
            .query_row(
                "SELECT name, updated_at, checksum, payload FROM theme_published_versions
                 WHERE theme_id = ?1 AND version = ?2",
                params![theme_id, version],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((name, updated_at, stored_checksum, payload)) = row else {
            return Ok(None);
        };
        rebuild(theme_id, version, &name, &payload, &updated_at, &stored_checksum).map(Some)
    }

    fn published_bundles(
        &self,
        conn: &Connection,
        theme_id: &str,
    ) -> Result<Vec<ThemeBundle>, StoreError> {
        let versions = {
            let mut statement = conn.prepare(
                "SELECT version FROM theme_published_versions
                 WHERE theme_id = ?1 ORDER BY version",
            )?;
            let rows = statement
                .query_map(params![theme_id], |row| row.get::<_, u32>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        let mut bundles = Vec::with_capacity(versions.len());
        for version in versions {
            if let Some(bundle) = self.published_bundle(conn, theme_id, version)? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }
}

fn corrupted(theme_id: &str, reason: &str) -> StoreError {
    StoreError::fatal(
        "THEME_STORAGE_CORRUPTED",
        format!("Stored theme '{theme_id}' is corrupted: {reason}."),
    )
    .with_details(json!({"themeId": theme_id}))
}

fn version_not_found(theme_id: &str, version: u32) -> StoreError {
    StoreError::not_found(
        "THEME_VERSION_NOT_FOUND",
        format!("Theme '{theme_id}' version {version} was not found."),
    )
    .with_details(json!({"themeId": theme_id, "version": version}))
}

fn rebuild(
    theme_id: &str,
    version: u32,
    name: &str,
    payload: &str,
    updated_at: &str,
    stored_checksum: &str,
) -> Result<ThemeBundle, StoreError> {
    let updated_at = parse_timestamp(updated_at).map_err(|err| corrupted(theme_id, &err))?;
    let payload: ThemePayload = serde_json::from_str(payload)
        .map_err(|err| corrupted(theme_id, &format!("payload is not valid JSON: {err}")))?;
    let bundle = ThemeBundle::build(
        theme_id,
        version,
        name,
        &payload.css_body,
        &payload.variables,
        updated_at,
    )
    .map_err(|err| corrupted(theme_id, &err.message))?;
    if bundle.checksum != stored_checksum {
        return Err(corrupted(theme_id, "checksum mismatch"));
    }
    Ok(bundle)
}

fn encode_payload(bundle: &ThemeBundle) -> Result<String, StoreError> {
    serde_json::to_string(&ThemePayload {
        css_body: bundle.css_body.clone(),
        variables: bundle.variables.clone(),
    })
    .map_err(|err| StoreError::fatal("STORAGE_ERROR", format!("failed to encode theme: {err}")))
}

fn insert_draft(tx: &rusqlite::Transaction<'_>, bundle: &ThemeBundle) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO themes (theme_id, name, draft_version, draft_updated_at, draft_checksum, draft_payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            bundle.theme_id,
            bundle.name,
            bundle.version,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum,
            encode_payload(bundle)?
        ],
    )?;
    Ok(())
}

fn replace_draft(
    conn: &mut Connection,
    next: &ThemeBundle,
    expected_version: u32,
) -> Result<(), StoreError> {
    let affected = conn.execute(
        "UPDATE themes SET name = ?1, draft_version = ?2, draft_updated_at = ?3,
                draft_checksum = ?4, draft_payload = ?5
         WHERE theme_id = ?6 AND draft_version = ?7",
        params![
            next.name,
            next.version,
            next.updated_at.to_rfc3339(),
            next.checksum,
            encode_payload(next)?,
            next.theme_id,
            expected_version
        ],
    )?;
    if affected == 0 {
        return Err(StoreError::conflict(
            "THEME_CONCURRENT_MODIFICATION",
            format!("Theme '{}' draft moved past version {expected_version}.", next.theme_id),
        )
        .with_details(json!({"themeId": next.theme_id, "expectedVersion": expected_version})));
    }
    Ok(())
}

fn insert_published(
    tx: &rusqlite::Transaction<'_>,
    bundle: &ThemeBundle,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO theme_published_versions (theme_id, version, name, updated_at, checksum, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            bundle.theme_id,
            bundle.version,
            bundle.name,
            bundle.updated_at.to_rfc3339(),
            bundle.checksum,
            encode_payload(bundle)?
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphapi_core::theme::ThemeValueType;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ThemeStore {
        let db = Database::open(dir.path().join("graphapi.db")).unwrap();
        ThemeStore::new(db)
    }

    fn request(id: &str) -> CreateThemeRequest {
        let mut variables = BTreeMap::new();
        variables.insert(
            "background-color".to_string(),
            ThemeVariable {
                value_type: ThemeValueType::Color,
                light_value: "#fff".to_string(),
                dark_value: "#000".to_string(),
            },
        );
        CreateThemeRequest {
            theme_id: id.to_string(),
            name: format!("{id} theme"),
            css_body: ".node > rect { fill: var(--background-color); }\n".to_string(),
            variables,
        }
    }

    #[test]
    fn render_css_is_recompiled_on_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("dark")).unwrap();
        let draft = store.get_bundle("dark", Stage::Draft, None).unwrap();
        assert!(draft.render_css.starts_with(":root {\n  color-scheme: light dark;\n"));
        assert!(draft.render_css.ends_with(request("dark").css_body.as_str()));
        assert_eq!(draft.checksum, draft.expected_checksum());
    }

    #[test]
    fn theme_without_variables_renders_the_body_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .create(&CreateThemeRequest {
                theme_id: "plain".to_string(),
                name: "Plain".to_string(),
                css_body: ".node { fill: red; }".to_string(),
                variables: BTreeMap::new(),
            })
            .unwrap();
        let draft = store.get_bundle("plain", Stage::Draft, None).unwrap();
        assert_eq!(draft.render_css, ".node { fill: red; }");
    }

    #[test]
    fn publish_once_and_immutable_snapshots() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("dark")).unwrap();
        store.publish("dark").unwrap();
        assert_eq!(
            store.publish("dark").unwrap_err().code,
            "THEME_VERSION_ALREADY_PUBLISHED"
        );
        store
            .update(
                "dark",
                &UpdateThemeRequest {
                    name: "Dark".to_string(),
                    css_body: ".node { fill: blue; }".to_string(),
                    variables: BTreeMap::new(),
                },
            )
            .unwrap();
        let v1 = store.get_bundle("dark", Stage::Published, Some(1)).unwrap();
        assert!(v1.css_body.contains("--background-color"));
    }

    #[test]
    fn shadowed_variable_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut bad = request("dark");
        bad.css_body = ":root { --background-color: red; }".to_string();
        let err = store.create(&bad).unwrap_err();
        assert_eq!(err.status_code, 400);
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn tampered_payload_reads_as_corruption() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(&request("dark")).unwrap();
        let conn = store.db.connect().unwrap();
        conn.execute(
            "UPDATE themes SET draft_payload = '{\"cssBody\": \".x{}\", \"variables\": {}}'
             WHERE theme_id = 'dark'",
            [],
        )
        .unwrap();
        drop(conn);
        let err = store.get_bundle("dark", Stage::Draft, None).unwrap_err();
        assert_eq!(err.code, "THEME_STORAGE_CORRUPTED");
    }
}
