//! Database migrations

use crate::db::Collection;
use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Table layout shared by every collection
fn create_collection_table(collection: Collection) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL UNIQUE,
            document_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            body TEXT NOT NULL
        )",
        collection.table_name()
    )
}

/// Run `statements` in one transaction, rolling back on the first failure
async fn apply(conn: &Connection, version: i32, statements: &[String]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated offline store to version {version}");
    Ok(())
}

/// Migration to version 1: offline documents, change queue, and conflicts
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )"
        .to_string(),
        create_collection_table(Collection::Documents),
        "CREATE INDEX IF NOT EXISTS idx_documents_last_modified ON documents(timestamp)"
            .to_string(),
        create_collection_table(Collection::Changes),
        "CREATE INDEX IF NOT EXISTS idx_changes_document_id ON changes(document_id)".to_string(),
        "CREATE INDEX IF NOT EXISTS idx_changes_timestamp ON changes(timestamp)".to_string(),
        create_collection_table(Collection::Conflicts),
        "CREATE INDEX IF NOT EXISTS idx_conflicts_document_id ON conflicts(document_id)"
            .to_string(),
    ];

    apply(conn, 1, &statements).await
}

/// Migration to version 2: collaboration sessions
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        create_collection_table(Collection::Sessions),
        "CREATE INDEX IF NOT EXISTS idx_sessions_document_id ON collaboration_sessions(document_id)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON collaboration_sessions(timestamp)"
            .to_string(),
    ];

    apply(conn, CURRENT_VERSION, &statements).await
}
