use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{Document, DocumentId, Filter, StoreError, StoredDocument, Update};
use crate::ports::DocumentEngine;

type Collection = BTreeMap<DocumentId, Document>;

/// In-process document engine keyed by insertion order
pub struct MemoryEngine {
    collections: RwLock<HashMap<String, Collection>>,
    next_id: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn first_match(collection: &Collection, filter: &Filter) -> Option<DocumentId> {
        collection
            .iter()
            .find(|(id, body)| filter.matches(**id, body))
            .map(|(id, _)| *id)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentEngine for MemoryEngine {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError> {
        let id = DocumentId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id, document);
        Ok(id)
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map_or(0, |c| c.len() as u64))
    }

    async fn oldest_ids(&self, collection: &str, limit: u64) -> Result<Vec<DocumentId>, StoreError> {
        let collections = self.collections.read();
        let ids = collections
            .get(collection)
            .map(|c| {
                c.keys()
                    .take(usize::try_from(limit).unwrap_or(usize::MAX))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn delete_many(&self, collection: &str, ids: &[DocumentId]) -> Result<u64, StoreError> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let deleted = ids.iter().filter_map(|id| docs.remove(id)).count();
        Ok(deleted as u64)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read();
        let found = collections
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(id, body)| filter.matches(**id, body))
                    .map(|(id, body)| StoredDocument {
                        id: *id,
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(found)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<StoredDocument>, StoreError> {
        let collections = self.collections.read();
        Ok(collections.get(collection).and_then(|c| {
            Self::first_match(c, filter).and_then(|id| {
                c.get(&id).map(|body| StoredDocument {
                    id,
                    body: body.clone(),
                })
            })
        }))
    }

    async fn update_one(&self, collection: &str, filter: &Filter, update: &Update) -> Result<u64, StoreError> {
        update.validate()?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match Self::first_match(docs, filter).and_then(|id| docs.get_mut(&id)) {
            Some(body) => {
                update.apply(body);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match Self::first_match(docs, filter) {
            Some(id) => {
                docs.remove(&id);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_ids_are_increasing_across_collections() {
        let engine = MemoryEngine::new();
        let a = engine.insert_one("a", doc(json!({"n": 1}))).await.unwrap();
        let b = engine.insert_one("b", doc(json!({"n": 2}))).await.unwrap();
        let c = engine.insert_one("a", doc(json!({"n": 3}))).await.unwrap();
        assert!(a < b && b < c);
        assert_eq!(engine.count("a").await.unwrap(), 2);
        assert_eq!(engine.count("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oldest_ids_and_delete_many() {
        let engine = MemoryEngine::new();
        let mut ids = Vec::new();
        for n in 0..4 {
            ids.push(engine.insert_one("c", doc(json!({"n": n}))).await.unwrap());
        }

        let oldest = engine.oldest_ids("c", 2).await.unwrap();
        assert_eq!(oldest, ids[..2]);

        assert_eq!(engine.delete_many("c", &oldest).await.unwrap(), 2);
        assert_eq!(engine.delete_many("c", &oldest).await.unwrap(), 0);
        let remaining: Vec<_> = engine
            .find("c", &Filter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(remaining, ids[2..]);
    }

    #[tokio::test]
    async fn test_update_and_delete_first_match_only() {
        let engine = MemoryEngine::new();
        engine.insert_one("c", doc(json!({"city": "Oslo", "v": 1}))).await.unwrap();
        engine.insert_one("c", doc(json!({"city": "Oslo", "v": 2}))).await.unwrap();

        let filter = Filter::all().field_eq("city", "Oslo");
        let modified = engine
            .update_one("c", &filter, &Update::new().set("v", 10))
            .await
            .unwrap();
        assert_eq!(modified, 1);

        let first = engine.find_one("c", &filter).await.unwrap().unwrap();
        assert_eq!(first.body.get("v"), Some(&json!(10)));

        assert_eq!(engine.delete_one("c", &filter).await.unwrap(), 1);
        let left = engine.find("c", &filter).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].body.get("v"), Some(&json!(2)));
    }
}
