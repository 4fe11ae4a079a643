//! SQLite metadata store.
//!
//! All publication writes go through an explicit transaction handed out by
//! [`Database::begin`]; the write methods take a `&mut SqliteConnection`
//! so they can only run inside one. Read methods run directly on the
//! pool.

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, Transaction, sqlite::SqliteRow};
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::entities::{Plugin, PluginDependency, PluginFile, PluginVersion};
use crate::error::{RegistryError, Result};

/// Column values for a version row about to be inserted.
pub struct NewVersion {
    pub plugin_id: i64,
    pub version: String,
    pub manifest: serde_json::Value,
    pub plugin_file_path: String,
    pub manifest_file_path: Option<String>,
    pub file_size: i64,
    pub checksum: String,
}

/// Which plugin columns a search query matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    Name,
    Description,
    Author,
    #[default]
    NameOrDescription,
    Any,
}

impl FromStr for SearchField {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SearchField::Name),
            "description" => Ok(SearchField::Description),
            "author" => Ok(SearchField::Author),
            "all" | "any" => Ok(SearchField::Any),
            other => Err(RegistryError::validation(format!(
                "unknown search field {:?} (expected name, description, author, or all)",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and create if missing) the database at the given URL.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(RegistryError::Database)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Open the database named by DATABASE_URL.
    ///
    /// Example: sqlite:./data/foundry.db
    pub async fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/foundry.db".to_string());

        Self::new(&database_url).await
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plugins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT 'unknown',
                created_at TEXT NOT NULL,            -- RFC 3339
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plugin_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plugin_id INTEGER NOT NULL REFERENCES plugins(id) ON DELETE CASCADE,
                version TEXT NOT NULL,
                manifest TEXT NOT NULL,              -- JSON
                plugin_file_path TEXT NOT NULL,
                manifest_file_path TEXT,
                file_size INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                is_latest INTEGER NOT NULL DEFAULT 0, -- SQLite boolean (0/1)
                download_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE (plugin_id, version)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plugin_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plugin_version_id INTEGER NOT NULL REFERENCES plugin_versions(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plugin_dependencies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plugin_version_id INTEGER NOT NULL REFERENCES plugin_versions(id) ON DELETE CASCADE,
                dependency_name TEXT NOT NULL,
                version_constraint TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_versions_plugin ON plugin_versions(plugin_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_versions_latest ON plugin_versions(plugin_id, is_latest)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_files_version ON plugin_files(plugin_version_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_deps_version ON plugin_dependencies(plugin_version_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Begin a publication transaction. SQLite's single writer makes this
    /// the serialization point for the latest-flag recomputation.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // Transaction-scoped writes

    /// Fetch the plugin row by name, inserting it first if absent.
    pub async fn get_or_create_plugin(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        description: &str,
        author: &str,
    ) -> Result<Plugin> {
        let now = now_rfc3339()?;

        sqlx::query(
            r#"
            INSERT INTO plugins (name, description, author, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
        "#,
        )
        .bind(name)
        .bind(description)
        .bind(author)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query(
            "SELECT id, name, description, author, created_at, updated_at FROM plugins WHERE name = ?",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        map_plugin(&row)
    }

    /// Apply explicit description/author overrides to an existing plugin.
    pub async fn update_plugin(
        &self,
        conn: &mut SqliteConnection,
        plugin_id: i64,
        description: Option<&str>,
        author: Option<&str>,
    ) -> Result<()> {
        if description.is_none() && author.is_none() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE plugins
            SET description = COALESCE(?, description),
                author = COALESCE(?, author),
                updated_at = ?
            WHERE id = ?
        "#,
        )
        .bind(description)
        .bind(author)
        .bind(now_rfc3339()?)
        .bind(plugin_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn version_exists(
        &self,
        conn: &mut SqliteConnection,
        plugin_id: i64,
        version: &str,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM plugin_versions WHERE plugin_id = ? AND version = ?",
        )
        .bind(plugin_id)
        .bind(version)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    /// Insert a version row with is_latest unset; the latest flag is
    /// recomputed for the whole plugin afterwards.
    pub async fn insert_version(
        &self,
        conn: &mut SqliteConnection,
        new: &NewVersion,
    ) -> Result<i64> {
        let manifest_json = serde_json::to_string(&new.manifest)?;

        let result = sqlx::query(
            r#"
            INSERT INTO plugin_versions
            (plugin_id, version, manifest, plugin_file_path, manifest_file_path,
             file_size, checksum, is_latest, download_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?)
        "#,
        )
        .bind(new.plugin_id)
        .bind(&new.version)
        .bind(manifest_json)
        .bind(&new.plugin_file_path)
        .bind(&new.manifest_file_path)
        .bind(new.file_size)
        .bind(&new.checksum)
        .bind(now_rfc3339()?)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn insert_file(
        &self,
        conn: &mut SqliteConnection,
        plugin_version_id: i64,
        file_name: &str,
        file_path: &str,
        file_size: i64,
        mime_type: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plugin_files (plugin_version_id, file_name, file_path, file_size, mime_type)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(plugin_version_id)
        .bind(file_name)
        .bind(file_path)
        .bind(file_size)
        .bind(mime_type)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn insert_dependency(
        &self,
        conn: &mut SqliteConnection,
        plugin_version_id: i64,
        name: &str,
        constraint: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plugin_dependencies (plugin_version_id, dependency_name, version_constraint)
            VALUES (?, ?, ?)
        "#,
        )
        .bind(plugin_version_id)
        .bind(name)
        .bind(constraint)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// All version strings for a plugin, including the row inserted inside
    /// the current transaction.
    pub async fn list_version_strings(
        &self,
        conn: &mut SqliteConnection,
        plugin_id: i64,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT version FROM plugin_versions WHERE plugin_id = ?")
            .bind(plugin_id)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("version")?))
            .collect()
    }

    pub async fn reset_latest(&self, conn: &mut SqliteConnection, plugin_id: i64) -> Result<()> {
        sqlx::query("UPDATE plugin_versions SET is_latest = 0 WHERE plugin_id = ?")
            .bind(plugin_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn mark_latest(
        &self,
        conn: &mut SqliteConnection,
        plugin_id: i64,
        version: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE plugin_versions SET is_latest = 1 WHERE plugin_id = ? AND version = ?")
            .bind(plugin_id)
            .bind(version)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // Pool-scoped reads

    pub async fn get_plugin(&self, name: &str) -> Result<Option<Plugin>> {
        let row = sqlx::query(
            "SELECT id, name, description, author, created_at, updated_at FROM plugins WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_plugin).transpose()
    }

    pub async fn get_version(
        &self,
        plugin_id: i64,
        version: &str,
    ) -> Result<Option<PluginVersion>> {
        let row = sqlx::query(
            "SELECT * FROM plugin_versions WHERE plugin_id = ? AND version = ?",
        )
        .bind(plugin_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_version).transpose()
    }

    pub async fn latest_version(&self, plugin_id: i64) -> Result<Option<PluginVersion>> {
        let row = sqlx::query(
            "SELECT * FROM plugin_versions WHERE plugin_id = ? AND is_latest = 1",
        )
        .bind(plugin_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_version).transpose()
    }

    /// All versions of a plugin, insertion-ordered. Callers sort by
    /// semantic version where ordering matters.
    pub async fn list_versions(&self, plugin_id: i64) -> Result<Vec<PluginVersion>> {
        let rows = sqlx::query("SELECT * FROM plugin_versions WHERE plugin_id = ? ORDER BY id")
            .bind(plugin_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_version).collect()
    }

    pub async fn list_files(&self, plugin_version_id: i64) -> Result<Vec<PluginFile>> {
        let rows = sqlx::query(
            "SELECT * FROM plugin_files WHERE plugin_version_id = ? ORDER BY file_name",
        )
        .bind(plugin_version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_file).collect()
    }

    pub async fn list_dependencies(
        &self,
        plugin_version_id: i64,
    ) -> Result<Vec<PluginDependency>> {
        let rows = sqlx::query(
            "SELECT * FROM plugin_dependencies WHERE plugin_version_id = ? ORDER BY dependency_name",
        )
        .bind(plugin_version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_dependency).collect()
    }

    pub async fn increment_download_count(&self, plugin_version_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE plugin_versions SET download_count = download_count + 1 WHERE id = ?",
        )
        .bind(plugin_version_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_versions(&self, plugin_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM plugin_versions WHERE plugin_id = ?")
            .bind(plugin_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Paginated plugin listing with optional substring search and author
    /// filter. Returns the page plus the total match count.
    pub async fn search_plugins(
        &self,
        query: Option<&str>,
        field: SearchField,
        author: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Plugin>, i64)> {
        let pattern = query.map(|q| format!("%{}%", q));

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, description, author, created_at, updated_at FROM plugins WHERE 1=1",
        );
        push_filters(&mut builder, pattern.as_deref(), field, author);
        builder.push(" ORDER BY name LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let plugins = rows.iter().map(map_plugin).collect::<Result<Vec<_>>>()?;

        let mut count_builder =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS n FROM plugins WHERE 1=1");
        push_filters(&mut count_builder, pattern.as_deref(), field, author);
        let total = count_builder
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        Ok((plugins, total))
    }

    /// (plugin name, version, is_latest) for every published version.
    pub async fn all_version_rows(&self) -> Result<Vec<(String, String, bool)>> {
        let rows = sqlx::query(
            r#"
            SELECT p.name AS name, v.version AS version, v.is_latest AS is_latest
            FROM plugin_versions v
            JOIN plugins p ON p.id = v.plugin_id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>("name")?,
                    row.try_get::<String, _>("version")?,
                    row.try_get::<i64, _>("is_latest")? == 1,
                ))
            })
            .collect()
    }
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    pattern: Option<&str>,
    field: SearchField,
    author: Option<&str>,
) {
    if let Some(pattern) = pattern {
        match field {
            SearchField::Name => {
                builder.push(" AND name LIKE ");
                builder.push_bind(pattern.to_string());
            }
            SearchField::Description => {
                builder.push(" AND description LIKE ");
                builder.push_bind(pattern.to_string());
            }
            SearchField::Author => {
                builder.push(" AND author LIKE ");
                builder.push_bind(pattern.to_string());
            }
            SearchField::NameOrDescription => {
                builder.push(" AND (name LIKE ");
                builder.push_bind(pattern.to_string());
                builder.push(" OR description LIKE ");
                builder.push_bind(pattern.to_string());
                builder.push(")");
            }
            SearchField::Any => {
                builder.push(" AND (name LIKE ");
                builder.push_bind(pattern.to_string());
                builder.push(" OR description LIKE ");
                builder.push_bind(pattern.to_string());
                builder.push(" OR author LIKE ");
                builder.push_bind(pattern.to_string());
                builder.push(")");
            }
        }
    }

    if let Some(author) = author {
        builder.push(" AND author = ");
        builder.push_bind(author.to_string());
    }
}

fn now_rfc3339() -> Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    Ok(OffsetDateTime::parse(value, &Rfc3339)?)
}

fn map_plugin(row: &SqliteRow) -> Result<Plugin> {
    Ok(Plugin {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        author: row.try_get("author")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn map_version(row: &SqliteRow) -> Result<PluginVersion> {
    let manifest_json: String = row.try_get("manifest")?;

    Ok(PluginVersion {
        id: row.try_get("id")?,
        plugin_id: row.try_get("plugin_id")?,
        version: row.try_get("version")?,
        manifest: serde_json::from_str(&manifest_json)?,
        plugin_file_path: row.try_get("plugin_file_path")?,
        manifest_file_path: row.try_get("manifest_file_path")?,
        file_size: row.try_get("file_size")?,
        checksum: row.try_get("checksum")?,
        is_latest: row.try_get::<i64, _>("is_latest")? == 1,
        download_count: row.try_get("download_count")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn map_file(row: &SqliteRow) -> Result<PluginFile> {
    Ok(PluginFile {
        id: row.try_get("id")?,
        plugin_version_id: row.try_get("plugin_version_id")?,
        file_name: row.try_get("file_name")?,
        file_path: row.try_get("file_path")?,
        file_size: row.try_get("file_size")?,
        mime_type: row.try_get("mime_type")?,
    })
}

fn map_dependency(row: &SqliteRow) -> Result<PluginDependency> {
    Ok(PluginDependency {
        id: row.try_get("id")?,
        plugin_version_id: row.try_get("plugin_version_id")?,
        dependency_name: row.try_get("dependency_name")?,
        version_constraint: row.try_get("version_constraint")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_plugin_is_idempotent() {
        let db = test_db().await;
        let mut tx = db.begin().await.unwrap();

        let first = db
            .get_or_create_plugin(&mut tx, "demo", "a demo", "alice")
            .await
            .unwrap();
        let second = db
            .get_or_create_plugin(&mut tx, "demo", "different", "bob")
            .await
            .unwrap();

        // Second call finds the existing row untouched.
        assert_eq!(first.id, second.id);
        assert_eq!(second.description, "a demo");
        assert_eq!(second.author, "alice");
    }

    #[tokio::test]
    async fn test_update_plugin_coalesces_overrides() {
        let db = test_db().await;
        let mut tx = db.begin().await.unwrap();

        let plugin = db
            .get_or_create_plugin(&mut tx, "demo", "a demo", "alice")
            .await
            .unwrap();
        db.update_plugin(&mut tx, plugin.id, Some("updated"), None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let reloaded = db.get_plugin("demo").await.unwrap().unwrap();
        assert_eq!(reloaded.description, "updated");
        assert_eq!(reloaded.author, "alice");
    }

    #[tokio::test]
    async fn test_version_insert_and_latest_flags() {
        let db = test_db().await;
        let mut tx = db.begin().await.unwrap();

        let plugin = db
            .get_or_create_plugin(&mut tx, "demo", "", "unknown")
            .await
            .unwrap();

        for version in ["1.0.0", "2.0.0"] {
            db.insert_version(
                &mut tx,
                &NewVersion {
                    plugin_id: plugin.id,
                    version: version.to_string(),
                    manifest: serde_json::json!({"name": "demo", "version": version}),
                    plugin_file_path: format!("plugins/demo/{}/plugin.py", version),
                    manifest_file_path: None,
                    file_size: 10,
                    checksum: "abc".to_string(),
                },
            )
            .await
            .unwrap();
        }

        assert!(db.version_exists(&mut tx, plugin.id, "1.0.0").await.unwrap());
        assert!(!db.version_exists(&mut tx, plugin.id, "3.0.0").await.unwrap());

        db.reset_latest(&mut tx, plugin.id).await.unwrap();
        db.mark_latest(&mut tx, plugin.id, "2.0.0").await.unwrap();
        tx.commit().await.unwrap();

        let latest = db.latest_version(plugin.id).await.unwrap().unwrap();
        assert_eq!(latest.version, "2.0.0");
        assert_eq!(db.count_versions(plugin.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_version_violates_unique_constraint() {
        let db = test_db().await;
        let mut tx = db.begin().await.unwrap();

        let plugin = db
            .get_or_create_plugin(&mut tx, "demo", "", "unknown")
            .await
            .unwrap();

        let new = NewVersion {
            plugin_id: plugin.id,
            version: "1.0.0".to_string(),
            manifest: serde_json::json!({}),
            plugin_file_path: "plugins/demo/1.0.0/plugin.py".to_string(),
            manifest_file_path: None,
            file_size: 1,
            checksum: "abc".to_string(),
        };

        db.insert_version(&mut tx, &new).await.unwrap();
        assert!(db.insert_version(&mut tx, &new).await.is_err());
    }

    #[tokio::test]
    async fn test_increment_download_count() {
        let db = test_db().await;
        let mut tx = db.begin().await.unwrap();

        let plugin = db
            .get_or_create_plugin(&mut tx, "demo", "", "unknown")
            .await
            .unwrap();
        let version_id = db
            .insert_version(
                &mut tx,
                &NewVersion {
                    plugin_id: plugin.id,
                    version: "1.0.0".to_string(),
                    manifest: serde_json::json!({}),
                    plugin_file_path: "plugins/demo/1.0.0/plugin.py".to_string(),
                    manifest_file_path: None,
                    file_size: 1,
                    checksum: "abc".to_string(),
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        db.increment_download_count(version_id).await.unwrap();
        db.increment_download_count(version_id).await.unwrap();

        let version = db.get_version(plugin.id, "1.0.0").await.unwrap().unwrap();
        assert_eq!(version.download_count, 2);
    }

    #[tokio::test]
    async fn test_search_plugins_filters_and_pagination() {
        let db = test_db().await;
        let mut tx = db.begin().await.unwrap();

        db.get_or_create_plugin(&mut tx, "alpha", "first tool", "alice")
            .await
            .unwrap();
        db.get_or_create_plugin(&mut tx, "beta", "second tool", "bob")
            .await
            .unwrap();
        db.get_or_create_plugin(&mut tx, "gamma", "alpha-adjacent", "alice")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let (page, total) = db
            .search_plugins(Some("alpha"), SearchField::NameOrDescription, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(total, 2);
        let names: Vec<_> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "gamma"]);

        let (page, total) = db
            .search_plugins(None, SearchField::default(), Some("alice"), 1, 1)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "gamma");

        let (_, total) = db
            .search_plugins(Some("bob"), SearchField::Any, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
    }
}
