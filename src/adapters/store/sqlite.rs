//! SQLite-backed document engine.
//!
//! All collections share one `documents` table. The `AUTOINCREMENT` primary
//! key provides the insertion-order id and is never reused after deletes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};

use crate::domain::{Document, DocumentId, Filter, StoreError, StoredDocument, Update};
use crate::ports::DocumentEngine;

/// Ids per `DELETE ... IN (...)` statement, under SQLite's bound-parameter limit
const DELETE_CHUNK: usize = 900;

/// Document engine persisting JSON bodies into SQLite
#[derive(Clone)]
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEngine {
    /// Open (or create) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection_id ON documents(collection, id);
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&mut conn.lock()))
            .await
            .map_err(|e| StoreError::Backend(format!("storage task failed: {e}")))?
    }
}

fn to_id(raw: i64) -> Result<DocumentId, StoreError> {
    u64::try_from(raw)
        .map(DocumentId::new)
        .map_err(|_| StoreError::Backend(format!("negative document id: {raw}")))
}

fn to_raw(id: DocumentId) -> Result<i64, StoreError> {
    i64::try_from(id.get()).map_err(|_| StoreError::Backend(format!("document id out of range: {id}")))
}

/// Matching documents in id order; stops after `limit` matches when given
fn scan(
    conn: &Connection,
    collection: &str,
    filter: &Filter,
    limit: Option<usize>,
) -> Result<Vec<StoredDocument>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, body FROM documents
         WHERE collection = ?1 AND (?2 IS NULL OR id = ?2)
         ORDER BY id ASC",
    )?;
    let pinned = filter.id().map(to_raw).transpose()?;
    let mut rows = stmt.query(params![collection, pinned])?;

    let mut found = Vec::new();
    while let Some(row) = rows.next()? {
        let id = to_id(row.get(0)?)?;
        let text: String = row.get(1)?;
        let body: Document = serde_json::from_str(&text)?;
        if filter.matches(id, &body) {
            found.push(StoredDocument { id, body });
            if limit.is_some_and(|l| found.len() >= l) {
                break;
            }
        }
    }
    Ok(found)
}

#[async_trait]
impl DocumentEngine for SqliteEngine {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError> {
        let collection = collection.to_string();
        let body = serde_json::to_string(&document)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
                params![collection, body],
            )?;
            to_id(conn.last_insert_rowid())
        })
        .await
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    async fn oldest_ids(&self, collection: &str, limit: u64) -> Result<Vec<DocumentId>, StoreError> {
        let collection = collection.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM documents WHERE collection = ?1 ORDER BY id ASC LIMIT ?2",
            )?;
            let raw = stmt
                .query_map(params![collection, limit], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            raw.into_iter().map(to_id).collect()
        })
        .await
    }

    async fn delete_many(&self, collection: &str, ids: &[DocumentId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let collection = collection.to_string();
        let raw = ids.iter().copied().map(to_raw).collect::<Result<Vec<_>, _>>()?;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0u64;
            for chunk in raw.chunks(DELETE_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "DELETE FROM documents WHERE collection = ? AND id IN ({placeholders})"
                );
                let params = std::iter::once(&collection as &dyn ToSql)
                    .chain(chunk.iter().map(|id| id as &dyn ToSql));
                deleted += tx.execute(&sql, params_from_iter(params))? as u64;
            }
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.run(move |conn| scan(conn, &collection, &filter, None)).await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<StoredDocument>, StoreError> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.run(move |conn| Ok(scan(conn, &collection, &filter, Some(1))?.into_iter().next()))
            .await
    }

    async fn update_one(&self, collection: &str, filter: &Filter, update: &Update) -> Result<u64, StoreError> {
        update.validate()?;
        let collection = collection.to_string();
        let filter = filter.clone();
        let update = update.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut doc) = scan(&tx, &collection, &filter, Some(1))?.into_iter().next() else {
                return Ok(0);
            };
            update.apply(&mut doc.body);
            let body = serde_json::to_string(&doc.body)?;
            let modified = tx.execute(
                "UPDATE documents SET body = ?1 WHERE id = ?2",
                params![body, to_raw(doc.id)?],
            )?;
            tx.commit()?;
            Ok(modified as u64)
        })
        .await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let Some(doc) = scan(&tx, &collection, &filter, Some(1))?.into_iter().next() else {
                return Ok(0);
            };
            let deleted = tx.execute("DELETE FROM documents WHERE id = ?1", params![to_raw(doc.id)?])?;
            tx.commit()?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            let one: Option<i64> = conn
                .query_row("SELECT 1", [], |row| row.get(0))
                .optional()?;
            match one {
                Some(1) => Ok(()),
                _ => Err(StoreError::Backend("unexpected ping result".to_string())),
            }
        })
        .await
    }
}
