//! Persistence layer for the RAG corpus service (component C3).
//!
//! Owns the single bounded SQLite connection pool (spec §5), the collection
//! and chunk tables, the ACL tables queried by the `identity` crate, and the
//! hybrid lexical+dense-vector search used by the retriever (C5).

pub mod error;
pub mod lexical;
pub mod pool;
pub mod repo;
pub mod schema;
pub mod search;
pub mod vector;

pub use error::StoreError;
pub use lexical::{LexicalIndex, LexicalMatch};
pub use pool::{init_pool, DbPool};
pub use repo::ChunkRepo;
pub use schema::{ADMIN_GROUP_ID, DEFAULT_GROUP_ID};
pub use search::{hybrid_search, SearchHit};
