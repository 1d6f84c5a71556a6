//! Collection and chunk CRUD (spec §4.3 operation table).

use chrono::Utc;
use chunk_model::{validate_collection_name, ChunkId, ChunkRecord, CollectionId};
use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::pool::DbPool;

pub struct ChunkRepo {
    pool: DbPool,
}

impl ChunkRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn create_collection(&self, name: &str, created_by: &str) -> Result<CollectionId, StoreError> {
        validate_collection_name(name)?;
        let conn = self.pool.get()?;
        let result = conn.execute(
            "INSERT INTO collections (name, created_by, created_at) VALUES (?1, ?2, ?3)",
            params![name, created_by, Utc::now().to_rfc3339()],
        );
        match result {
            Ok(_) => Ok(CollectionId(conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Err(StoreError::AlreadyExists(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn delete_collection(&self, id: CollectionId) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM collections WHERE id = ?1", params![id.0])?;
        Ok(())
    }

    pub fn collection_id_by_name(&self, name: &str) -> Result<Option<CollectionId>, StoreError> {
        let conn = self.pool.get()?;
        let id = conn
            .query_row("SELECT id FROM collections WHERE name = ?1", params![name], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id.map(CollectionId))
    }

    pub fn list_collections(&self) -> Result<Vec<(CollectionId, String, String)>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, name, created_by FROM collections ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| Ok((CollectionId(row.get(0)?), row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Collections a user can read: the collections owned by groups the user
    /// belongs to, plus any collection the user created (implicit grant).
    pub fn list_collections_for_user(&self, user_id: &str) -> Result<Vec<(CollectionId, String)>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT c.id, c.name
            FROM collections c
            WHERE c.created_by = ?1
               OR c.id IN (
                   SELECT cp.collection_id FROM collection_permissions cp
                   JOIN user_groups ug ON ug.group_id = cp.group_id
                   WHERE ug.user_id = ?1 AND cp.can_read = 1
               )
            ORDER BY c.name
            "#,
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| Ok((CollectionId(row.get(0)?), row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Atomic multi-row insert (spec §5 atomicity rule): all chunks land or
    /// none do.
    pub fn insert_chunks(&self, chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, collection_id, source, page, content, chunk_size, metadata_json, dense_vector, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for chunk in chunks {
                let metadata_json = serde_json::to_string(&chunk.metadata)?;
                let vector_blob = vector_to_blob(&chunk.dense_vector);
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.collection_id.0,
                    chunk.metadata.source,
                    chunk.metadata.page,
                    chunk.content,
                    chunk.metadata.chunk_size as i64,
                    metadata_json,
                    vector_blob,
                    chunk.created_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes every chunk with the given `source` inside `collection_id`.
    /// Idempotent: deleting a source that was already removed is not an error.
    pub fn delete_by_source(&self, collection_id: CollectionId, source: &str) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let n = conn.execute(
            "DELETE FROM chunks WHERE collection_id = ?1 AND source = ?2",
            params![collection_id.0, source],
        )?;
        Ok(n)
    }

    /// Distinct source names in a collection, optionally narrowed to those
    /// whose name contains `filter` (spec §4.3: `sources(collection_id, prefix?)`).
    pub fn sources(&self, collection_id: CollectionId, filter: Option<&str>) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT source FROM chunks WHERE collection_id = ?1 ORDER BY source",
        )?;
        let rows = stmt.query_map(params![collection_id.0], |row| row.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(match filter {
            Some(substr) => rows.into_iter().filter(|s| s.contains(substr)).collect(),
            None => rows,
        })
    }

    /// All chunks in `collection_id` whose source is one of `sources`,
    /// most recently inserted first.
    pub fn chunks_for_sources(&self, collection_id: CollectionId, sources: &[String]) -> Result<Vec<ChunkRecord>, StoreError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let placeholders = sources.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, collection_id, source, page, content, chunk_size, metadata_json, dense_vector, created_at
             FROM chunks WHERE collection_id = ? AND source IN ({placeholders}) ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(sources.len() + 1);
        bound.push(&collection_id.0);
        for source in sources {
            bound.push(source);
        }
        let rows = stmt.query_map(bound.as_slice(), row_to_chunk)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn source_exists(&self, collection_id: CollectionId, source: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection_id = ?1 AND source = ?2",
            params![collection_id.0, source],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn pages(&self, collection_id: CollectionId, source: &str) -> Result<Vec<u32>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT page FROM chunks WHERE collection_id = ?1 AND source = ?2 ORDER BY page",
        )?;
        let rows = stmt
            .query_map(params![collection_id.0, source], |row| row.get::<_, i64>(0).map(|p| p as u32))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_chunk_by_page(&self, collection_id: CollectionId, source: &str, page: u32) -> Result<Vec<ChunkRecord>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, collection_id, source, page, content, chunk_size, metadata_json, dense_vector, created_at
             FROM chunks WHERE collection_id = ?1 AND source = ?2 AND page = ?3",
        )?;
        let rows = stmt
            .query_map(params![collection_id.0, source, page], row_to_chunk)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(rows)
    }

    pub fn chunks_in_collections(&self, collection_ids: &[CollectionId]) -> Result<Vec<ChunkRecord>, StoreError> {
        if collection_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let placeholders = collection_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, collection_id, source, page, content, chunk_size, metadata_json, dense_vector, created_at
             FROM chunks WHERE collection_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids: Vec<i64> = collection_ids.iter().map(|c| c.0).collect();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), row_to_chunk)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(rows)
    }

    pub fn chunk_by_id(&self, id: ChunkId) -> Result<Option<ChunkRecord>, StoreError> {
        let conn = self.pool.get()?;
        let rec = conn
            .query_row(
                "SELECT id, collection_id, source, page, content, chunk_size, metadata_json, dense_vector, created_at
                 FROM chunks WHERE id = ?1",
                params![id.to_string()],
                row_to_chunk,
            )
            .optional()?;
        Ok(rec)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(ffi_err, _) if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub(crate) fn vector_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn blob_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    let id_str: String = row.get(0)?;
    let collection_id: i64 = row.get(1)?;
    let metadata_json: String = row.get(6)?;
    let vector_blob: Vec<u8> = row.get(7)?;
    let created_at: String = row.get(8)?;

    let id = uuid::Uuid::parse_str(&id_str)
        .map(ChunkId)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
    let metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(ChunkRecord {
        id,
        collection_id: CollectionId(collection_id),
        content: row.get(4)?,
        metadata,
        dense_vector: blob_to_vector(&vector_blob),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_model::ChunkMetadata;

    fn repo() -> ChunkRepo {
        ChunkRepo::new(crate::pool::init_pool(":memory:", 4).unwrap())
    }

    fn chunk(collection_id: CollectionId, source: &str, page: u32) -> ChunkRecord {
        ChunkRecord {
            id: ChunkId::new(),
            collection_id,
            content: "hello world".into(),
            metadata: ChunkMetadata::new(source, page, 11),
            dense_vector: vec![0.1, 0.2, 0.3],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_fetch_roundtrips_vector() {
        let repo = repo();
        let cid = repo.create_collection("docs", "alice").unwrap();
        let c = chunk(cid, "a.pdf", 1);
        let chunk_id = c.id;
        repo.insert_chunks(&[c]).unwrap();
        let fetched = repo.chunk_by_id(chunk_id).unwrap().unwrap();
        assert_eq!(fetched.dense_vector, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn delete_by_source_is_idempotent() {
        let repo = repo();
        let cid = repo.create_collection("docs", "alice").unwrap();
        repo.insert_chunks(&[chunk(cid, "a.pdf", 1)]).unwrap();
        assert_eq!(repo.delete_by_source(cid, "a.pdf").unwrap(), 1);
        assert_eq!(repo.delete_by_source(cid, "a.pdf").unwrap(), 0);
    }

    #[test]
    fn list_collections_for_user_includes_creator_implicit_grant() {
        let repo = repo();
        let cid = repo.create_collection("mine", "alice").unwrap();
        let listed = repo.list_collections_for_user("alice").unwrap();
        assert_eq!(listed, vec![(cid, "mine".to_string())]);
        assert!(repo.list_collections_for_user("bob").unwrap().is_empty());
    }

    #[test]
    fn create_collection_rejects_duplicate_names() {
        let repo = repo();
        repo.create_collection("mine", "alice").unwrap();
        let err = repo.create_collection("mine", "bob").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(name) if name == "mine"));
    }

    #[test]
    fn sources_filters_by_substring() {
        let repo = repo();
        let cid = repo.create_collection("docs", "alice").unwrap();
        repo.insert_chunks(&[chunk(cid, "brief.pdf", 1), chunk(cid, "notes.txt", 1)]).unwrap();

        assert_eq!(repo.sources(cid, Some("brief")).unwrap(), vec!["brief.pdf".to_string()]);
        assert_eq!(repo.sources(cid, None).unwrap(), vec!["brief.pdf".to_string(), "notes.txt".to_string()]);
        assert!(repo.sources(cid, Some("nonexistent")).unwrap().is_empty());
    }

    #[test]
    fn chunks_for_sources_returns_only_matching_sources() {
        let repo = repo();
        let cid = repo.create_collection("docs", "alice").unwrap();
        repo.insert_chunks(&[chunk(cid, "brief.pdf", 1), chunk(cid, "notes.txt", 1)]).unwrap();

        let chunks = repo.chunks_for_sources(cid, &["brief.pdf".to_string()]).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.source, "brief.pdf");
    }
}
