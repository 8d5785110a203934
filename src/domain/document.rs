use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::StoreError;

/// A caller-owned JSON object
pub type Document = Map<String, Value>;

/// Engine-assigned identifier; ascending order is insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document as read back from an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub body: Document,
}

/// Equality filter over dotted field paths, optionally pinned to one id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    id: Option<DocumentId>,
    fields: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: DocumentId) -> Self {
        Self {
            id: Some(id),
            fields: Vec::new(),
        }
    }

    /// Add an equality test; `path` may use dots to reach nested fields
    pub fn field_eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((path.into(), value.into()));
        self
    }

    pub fn id(&self) -> Option<DocumentId> {
        self.id
    }

    pub fn matches(&self, id: DocumentId, body: &Document) -> bool {
        if self.id.is_some_and(|wanted| wanted != id) {
            return false;
        }
        self.fields
            .iter()
            .all(|(path, expected)| lookup(body, path) == Some(expected))
    }
}

fn lookup<'a>(body: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = body.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Field-level modification applied to the first matching document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
    unset: Vec<String>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Parse a Mongo-style update document (`{"$set": {..}, "$unset": {..}}`)
    pub fn from_value(value: &Value) -> Result<Self, StoreError> {
        let ops = value
            .as_object()
            .ok_or_else(|| StoreError::InvalidUpdate("update must be an object".to_string()))?;

        let mut update = Self::new();
        for (op, args) in ops {
            let args = args.as_object().ok_or_else(|| {
                StoreError::InvalidUpdate(format!("arguments of {op} must be an object"))
            })?;
            match op.as_str() {
                "$set" => {
                    for (field, value) in args {
                        update = update.set(field.clone(), value.clone());
                    }
                }
                "$unset" => {
                    for field in args.keys() {
                        update = update.unset(field.clone());
                    }
                }
                other => {
                    return Err(StoreError::InvalidUpdate(format!(
                        "unsupported operator: {other}"
                    )))
                }
            }
        }
        update.validate()?;
        Ok(update)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.set.is_empty() && self.unset.is_empty() {
            return Err(StoreError::InvalidUpdate("update has no operations".to_string()));
        }
        Ok(())
    }

    pub fn apply(&self, body: &mut Document) {
        for (field, value) in &self.set {
            body.insert(field.clone(), value.clone());
        }
        for field in &self.unset {
            body.remove(field);
        }
    }
}

/// Immutable retention configuration for one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    limit: u64,
    batch_size: u64,
}

impl RetentionPolicy {
    pub const DEFAULT_LIMIT: u64 = 400_000;
    pub const DEFAULT_BATCH_SIZE: u64 = 1_000;

    pub fn new(limit: u64, batch_size: u64) -> Result<Self, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidPolicy("limit must be at least 1".to_string()));
        }
        if batch_size == 0 {
            return Err(StoreError::InvalidPolicy(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self { limit, batch_size })
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Advisory sizing for periodic cleanup; a retention pass never caps on it
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Number of documents a retention pass must evict at `count`
    pub fn excess(&self, count: u64) -> u64 {
        count.saturating_sub(self.limit)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }
}
