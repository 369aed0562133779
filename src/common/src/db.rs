use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{PgPool, Row, SqlitePool, query};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::hierarchy::ClassRef;
use crate::model::{DocId, Document};
use crate::tx::{TxClass, TxEntry, TxOp};
use crate::workspace::WorkspaceId;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to the database backing the document store and its transaction
/// log (PostgreSQL or SQLite).
#[derive(Clone, Debug)]
pub enum Database {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl Database {
    /// Connect and initialize the schema.
    pub async fn connect(dsn: &str) -> StoreResult<Self> {
        Self::connect_with_timeout(dsn, DEFAULT_CONNECT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(dsn: &str, timeout: Duration) -> StoreResult<Self> {
        log::info!("Connecting to database with DSN: {}", redact_dsn(dsn));

        let db = if dsn.starts_with("sqlite:") {
            ensure_data_directory(dsn)?;

            let options = SqlitePoolOptions::new().acquire_timeout(timeout);
            let connected = if is_sqlite_memory(dsn) {
                // every connection of an in-memory database is a separate database
                options.max_connections(1).connect(dsn).await
            } else {
                // Add mode=rwc to create database file if it doesn't exist
                let dsn_with_create = if dsn.contains('?') {
                    if dsn.contains("mode=") {
                        dsn.to_string()
                    } else {
                        format!("{dsn}&mode=rwc")
                    }
                } else {
                    format!("{dsn}?mode=rwc")
                };
                options.connect(&dsn_with_create).await
            };
            let pool = connected.map_err(|e| {
                log::error!("Failed to connect to SQLite database: {e}");
                StoreError::ConnectionError(e.to_string())
            })?;
            Database::Sqlite(pool)
        } else if dsn.starts_with("postgres:") || dsn.starts_with("postgresql:") {
            let pool = PgPoolOptions::new()
                .acquire_timeout(timeout)
                .connect(dsn)
                .await
                .map_err(|e| {
                    log::error!("Failed to connect to PostgreSQL database: {e}");
                    StoreError::ConnectionError(e.to_string())
                })?;
            Database::Postgres(pool)
        } else {
            return Err(StoreError::ConnectionError(format!(
                "Unsupported database DSN '{}'. Supported: sqlite:, postgres:",
                redact_dsn(dsn)
            )));
        };

        log::debug!("Database connection established");
        db.init().await.map_err(|e| {
            log::error!("Failed to initialize schema: {e}");
            e
        })?;
        Ok(db)
    }

    /// Initialize tables if they do not exist.
    async fn init(&self) -> StoreResult<()> {
        match self {
            Database::Sqlite(pool) => {
                let create_workspaces = r#"
                CREATE TABLE IF NOT EXISTS workspaces (
                    id TEXT PRIMARY KEY,
                    read_only INTEGER NOT NULL DEFAULT 0
                )"#;
                query(create_workspaces).execute(pool).await?;

                let create_documents = r#"
                CREATE TABLE IF NOT EXISTS documents (
                    workspace TEXT NOT NULL,
                    id TEXT NOT NULL,
                    class TEXT NOT NULL,
                    mixins TEXT NOT NULL,
                    attributes TEXT NOT NULL,
                    modified_on INTEGER NOT NULL,
                    PRIMARY KEY (workspace, id)
                )"#;
                query(create_documents).execute(pool).await?;

                let create_tx = r#"
                CREATE TABLE IF NOT EXISTS tx (
                    workspace TEXT NOT NULL,
                    id TEXT NOT NULL,
                    class TEXT NOT NULL,
                    object_id TEXT NOT NULL,
                    object_class TEXT NOT NULL,
                    modified_on INTEGER NOT NULL,
                    PRIMARY KEY (workspace, id)
                )"#;
                query(create_tx).execute(pool).await?;

                query("CREATE INDEX IF NOT EXISTS tx_object ON tx (workspace, object_id)")
                    .execute(pool)
                    .await?;
            }
            Database::Postgres(pool) => {
                let create_workspaces = r#"
                CREATE TABLE IF NOT EXISTS workspaces (
                    id TEXT PRIMARY KEY,
                    read_only BOOLEAN NOT NULL DEFAULT FALSE
                )"#;
                query(create_workspaces).execute(pool).await?;

                let create_documents = r#"
                CREATE TABLE IF NOT EXISTS documents (
                    workspace TEXT NOT NULL,
                    id TEXT NOT NULL,
                    class TEXT NOT NULL,
                    mixins TEXT NOT NULL,
                    attributes TEXT NOT NULL,
                    modified_on BIGINT NOT NULL,
                    PRIMARY KEY (workspace, id)
                )"#;
                query(create_documents).execute(pool).await?;

                let create_tx = r#"
                CREATE TABLE IF NOT EXISTS tx (
                    workspace TEXT NOT NULL,
                    id TEXT NOT NULL,
                    class TEXT NOT NULL,
                    object_id TEXT NOT NULL,
                    object_class TEXT NOT NULL,
                    modified_on BIGINT NOT NULL,
                    PRIMARY KEY (workspace, id)
                )"#;
                query(create_tx).execute(pool).await?;

                query("CREATE INDEX IF NOT EXISTS tx_object ON tx (workspace, object_id)")
                    .execute(pool)
                    .await?;
            }
        }

        Ok(())
    }

    /// Whether writes through normal sessions are blocked for a workspace.
    ///
    /// Workspaces without a row are writable.
    pub async fn is_read_only(&self, workspace: &WorkspaceId) -> StoreResult<bool> {
        let row = match self {
            Database::Sqlite(pool) => {
                query("SELECT read_only FROM workspaces WHERE id = ?")
                    .bind(workspace.as_str())
                    .fetch_optional(pool)
                    .await?
                    .map(|row| row.try_get::<bool, _>("read_only"))
            }
            Database::Postgres(pool) => {
                query("SELECT read_only FROM workspaces WHERE id = $1")
                    .bind(workspace.as_str())
                    .fetch_optional(pool)
                    .await?
                    .map(|row| row.try_get::<bool, _>("read_only"))
            }
        };
        Ok(row.transpose()?.unwrap_or(false))
    }

    /// Load every document of a workspace.
    pub async fn documents(&self, workspace: &WorkspaceId) -> StoreResult<Vec<Document>> {
        let stmt = "SELECT id, class, mixins, attributes, modified_on FROM documents \
                    WHERE workspace = ";
        let mut documents = Vec::new();
        match self {
            Database::Sqlite(pool) => {
                let rows = query(&format!("{stmt}? ORDER BY id"))
                    .bind(workspace.as_str())
                    .fetch_all(pool)
                    .await?;
                for row in rows {
                    documents.push(document_from_parts(
                        row.try_get("id")?,
                        row.try_get("class")?,
                        row.try_get("mixins")?,
                        row.try_get("attributes")?,
                        row.try_get("modified_on")?,
                    )?);
                }
            }
            Database::Postgres(pool) => {
                let rows = query(&format!("{stmt}$1 ORDER BY id"))
                    .bind(workspace.as_str())
                    .fetch_all(pool)
                    .await?;
                for row in rows {
                    documents.push(document_from_parts(
                        row.try_get("id")?,
                        row.try_get("class")?,
                        row.try_get("mixins")?,
                        row.try_get("attributes")?,
                        row.try_get("modified_on")?,
                    )?);
                }
            }
        }
        Ok(documents)
    }

    /// Apply mutations and their log entries in a single database transaction.
    pub async fn apply(
        &self,
        workspace: &WorkspaceId,
        ops: &[TxOp],
        modified_on: i64,
    ) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        match self {
            Database::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                for op in ops {
                    match op {
                        TxOp::Create(doc) => {
                            query(
                                "INSERT INTO documents \
                                 (workspace, id, class, mixins, attributes, modified_on) \
                                 VALUES (?, ?, ?, ?, ?, ?)",
                            )
                            .bind(workspace.as_str())
                            .bind(doc.id.as_str())
                            .bind(doc.class.as_str())
                            .bind(serde_json::to_string(&doc.mixins)?)
                            .bind(serde_json::to_string(&doc.attributes)?)
                            .bind(doc.modified_on)
                            .execute(&mut *tx)
                            .await?;
                        }
                        TxOp::Remove { id, .. } => {
                            query("DELETE FROM documents WHERE workspace = ? AND id = ?")
                                .bind(workspace.as_str())
                                .bind(id.as_str())
                                .execute(&mut *tx)
                                .await?;
                        }
                    }

                    let entry = op.to_entry(modified_on);
                    query(
                        "INSERT INTO tx \
                         (workspace, id, class, object_id, object_class, modified_on) \
                         VALUES (?, ?, ?, ?, ?, ?)",
                    )
                    .bind(workspace.as_str())
                    .bind(entry.id.as_str())
                    .bind(entry.class.as_str())
                    .bind(entry.object_id.as_str())
                    .bind(entry.object_class.as_str())
                    .bind(entry.modified_on)
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await?;
            }
            Database::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                for op in ops {
                    match op {
                        TxOp::Create(doc) => {
                            query(
                                "INSERT INTO documents \
                                 (workspace, id, class, mixins, attributes, modified_on) \
                                 VALUES ($1, $2, $3, $4, $5, $6)",
                            )
                            .bind(workspace.as_str())
                            .bind(doc.id.as_str())
                            .bind(doc.class.as_str())
                            .bind(serde_json::to_string(&doc.mixins)?)
                            .bind(serde_json::to_string(&doc.attributes)?)
                            .bind(doc.modified_on)
                            .execute(&mut *tx)
                            .await?;
                        }
                        TxOp::Remove { id, .. } => {
                            query("DELETE FROM documents WHERE workspace = $1 AND id = $2")
                                .bind(workspace.as_str())
                                .bind(id.as_str())
                                .execute(&mut *tx)
                                .await?;
                        }
                    }

                    let entry = op.to_entry(modified_on);
                    query(
                        "INSERT INTO tx \
                         (workspace, id, class, object_id, object_class, modified_on) \
                         VALUES ($1, $2, $3, $4, $5, $6)",
                    )
                    .bind(workspace.as_str())
                    .bind(entry.id.as_str())
                    .bind(entry.class.as_str())
                    .bind(entry.object_id.as_str())
                    .bind(entry.object_class.as_str())
                    .bind(entry.modified_on)
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await?;
            }
        }

        Ok(())
    }

    /// Read every transaction-log entry of a workspace, oldest first.
    pub async fn tx_entries(&self, workspace: &WorkspaceId) -> StoreResult<Vec<TxEntry>> {
        let stmt = "SELECT id, class, object_id, object_class, modified_on FROM tx \
                    WHERE workspace = ";
        let rows = match self {
            Database::Sqlite(pool) => {
                let rows = query(&format!("{stmt}? ORDER BY modified_on, id"))
                    .bind(workspace.as_str())
                    .fetch_all(pool)
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        Ok(TxEntry {
                            id: DocId::new(row.try_get::<String, _>("id")?),
                            class: TxClass::parse(row.try_get::<&str, _>("class")?),
                            object_id: DocId::new(row.try_get::<String, _>("object_id")?),
                            object_class: ClassRef::new(
                                row.try_get::<String, _>("object_class")?,
                            ),
                            modified_on: row.try_get("modified_on")?,
                        })
                    })
                    .collect::<Result<Vec<_>, sqlx::Error>>()?
            }
            Database::Postgres(pool) => {
                let rows = query(&format!("{stmt}$1 ORDER BY modified_on, id"))
                    .bind(workspace.as_str())
                    .fetch_all(pool)
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        Ok(TxEntry {
                            id: DocId::new(row.try_get::<String, _>("id")?),
                            class: TxClass::parse(row.try_get::<&str, _>("class")?),
                            object_id: DocId::new(row.try_get::<String, _>("object_id")?),
                            object_class: ClassRef::new(
                                row.try_get::<String, _>("object_class")?,
                            ),
                            modified_on: row.try_get("modified_on")?,
                        })
                    })
                    .collect::<Result<Vec<_>, sqlx::Error>>()?
            }
        };
        Ok(rows)
    }

    /// Delete every log entry referencing a document. Returns rows removed.
    pub async fn delete_tx_for_object(
        &self,
        workspace: &WorkspaceId,
        object_id: &DocId,
    ) -> StoreResult<u64> {
        let result = match self {
            Database::Sqlite(pool) => {
                query("DELETE FROM tx WHERE workspace = ? AND object_id = ?")
                    .bind(workspace.as_str())
                    .bind(object_id.as_str())
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            Database::Postgres(pool) => {
                query("DELETE FROM tx WHERE workspace = $1 AND object_id = $2")
                    .bind(workspace.as_str())
                    .bind(object_id.as_str())
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        };
        Ok(result)
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        match self {
            Database::Sqlite(pool) => pool.close().await,
            Database::Postgres(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Database::Sqlite(pool) => pool.is_closed(),
            Database::Postgres(pool) => pool.is_closed(),
        }
    }
}

fn document_from_parts(
    id: String,
    class: String,
    mixins: String,
    attributes: String,
    modified_on: i64,
) -> StoreResult<Document> {
    let mixins: Vec<ClassRef> = serde_json::from_str(&mixins)?;
    let attributes: Map<String, Value> = serde_json::from_str(&attributes)?;
    Ok(Document {
        id: DocId::new(id),
        class: ClassRef::new(class),
        mixins,
        attributes,
        modified_on,
    })
}

fn is_sqlite_memory(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// Create the parent directory of a SQLite database file.
fn ensure_data_directory(dsn: &str) -> StoreResult<()> {
    if is_sqlite_memory(dsn) {
        return Ok(());
    }

    let path = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn);
    let path = path.split('?').next().unwrap_or(path);

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionError(format!(
                    "Failed to create data directory {}: {e}",
                    parent.display()
                ))
            })?;
            log::info!("Created data directory: {}", parent.display());
        }
    }
    Ok(())
}

/// Strip credentials from a DSN before logging it.
pub fn redact_dsn(dsn: &str) -> String {
    match url::Url::parse(dsn) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => dsn.to_string(),
    }
}
