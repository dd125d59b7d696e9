pub mod entries;
pub mod models;
pub mod playlists;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = Pool<Sqlite>;

// Re-export commonly used types
pub use models::{Entry, NewEntry, Playlist};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> anyhow::Result<DbPool> {
    ensure_parent_dir(database_url)?;

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// SQLite will not create missing directories for a database file
fn ensure_parent_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    if file.is_empty() || file == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Run database migrations using SQLx's built-in migration tracking.
/// Migrations are tracked in the `_sqlx_migrations` table and only run once.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await?;
    Ok(())
}

/// Single-connection in-memory database with the schema applied
#[cfg(test)]
pub async fn memory_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}

/// Library statistics
pub struct Stats {
    pub total_entries: i64,
    pub total_favorites: i64,
    pub total_views: i64,
    pub total_playlists: i64,
}

/// Get library statistics
pub async fn get_stats(pool: &DbPool) -> anyhow::Result<Stats> {
    let totals: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN is_favorite THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(view_count), 0)
        FROM entries
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total_playlists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM playlists")
        .fetch_one(pool)
        .await?;

    Ok(Stats {
        total_entries: totals.0,
        total_favorites: totals.1,
        total_views: totals.2,
        total_playlists: total_playlists.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_stats() {
        let pool = memory_pool().await;
        let stats = get_stats(&pool).await.unwrap();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_favorites, 0);
        assert_eq!(stats.total_views, 0);
        assert_eq!(stats.total_playlists, 0);
    }

    #[tokio::test]
    async fn test_create_pool_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("nested/dir/kura.db");
        let url = format!("sqlite://{}", db_path.display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        assert!(db_path.exists());
    }
}
