// Storage layer — the result store and the feedback store.
//
// SQLite (rusqlite with the "bundled" feature, so no system SQLite needed)
// is the default backend. The database file lives wherever
// CROSSMODAL_DB_PATH points (defaults to ./crossmodal.db). MemoryStore
// backs tests and builds without the `sqlite` feature.

pub mod memory;
pub mod models;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use traits::{FeedbackStore, ResultStore};

#[cfg(feature = "sqlite")]
use anyhow::{Context, Result};
#[cfg(feature = "sqlite")]
use std::path::Path;

/// Open (or create) the SQLite database and create its tables.
#[cfg(feature = "sqlite")]
pub fn initialize_sqlite(db_path: &str) -> Result<sqlite::SqliteStore> {
    // Create parent directories if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = rusqlite::Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    // WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(sqlite::SqliteStore::new(conn))
}

/// Open an existing SQLite database (fails if it doesn't exist yet).
#[cfg(feature = "sqlite")]
pub fn open_sqlite(db_path: &str) -> Result<sqlite::SqliteStore> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `crossmodal init` first.",
            db_path
        );
    }

    let conn = rusqlite::Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Create anything an older database is missing
    schema::create_tables(&conn)?;

    Ok(sqlite::SqliteStore::new(conn))
}
