mod memory;
mod sqlite;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::domain::StoreError;
use crate::ports::DocumentEngine;

pub use memory::MemoryEngine;
pub use sqlite::SqliteEngine;

/// Open the engine named by `url`.
///
/// `memory://` keeps documents in process, `sqlite::memory:` uses a private
/// in-memory SQLite database, and `sqlite://<dir>` stores `<dir>/<database>.sqlite3`.
pub fn connect(url: &str, database: &str) -> Result<Arc<dyn DocumentEngine>, StoreError> {
    if url == "memory://" {
        info!("Using in-process document engine");
        return Ok(Arc::new(MemoryEngine::new()));
    }

    if url == "sqlite::memory:" {
        info!("Using in-memory SQLite document engine");
        return Ok(Arc::new(SqliteEngine::in_memory()?));
    }

    if let Some(dir) = url.strip_prefix("sqlite://") {
        if dir.is_empty() || database.trim().is_empty() {
            return Err(StoreError::UnsupportedUrl(format!(
                "{url} (database directory and name are required)"
            )));
        }
        let path = Path::new(dir).join(format!("{database}.sqlite3"));
        info!("Opening SQLite document engine at {}", path.display());
        return Ok(Arc::new(SqliteEngine::open(path)?));
    }

    Err(StoreError::UnsupportedUrl(url.to_string()))
}
