//! Bounded SQLite connection pool (spec §5: design value 1..10 connections).

use r2d2_sqlite::SqliteConnectionManager;

use crate::error::StoreError;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Opens (or creates) the database at `path` and runs the schema migration.
///
/// `max_size` is clamped to the spec's 1..10 design range.
pub fn init_pool(path: &str, max_size: u32) -> Result<DbPool, StoreError> {
    let max_size = max_size.clamp(1, 10);
    let manager = if path == ":memory:" {
        SqliteConnectionManager::memory()
    } else {
        SqliteConnectionManager::file(path)
    }
    .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;"));

    let pool = r2d2::Pool::builder().max_size(max_size).build(manager)?;
    let conn = pool.get()?;
    crate::schema::migrate(&conn)?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_runs_schema() {
        let pool = init_pool(":memory:", 4).unwrap();
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn pool_size_is_clamped_to_design_range() {
        let pool = init_pool(":memory:", 50).unwrap();
        assert!(pool.max_size() <= 10);
        let pool = init_pool(":memory:", 0).unwrap();
        assert!(pool.max_size() >= 1);
    }
}
