//! Document store collaborator.
//!
//! Entities and the codec only ever use these four primitives on a
//! collection handle; query execution lives elsewhere.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use bson::{Bson, Document};

use crate::core::StoreResult;

pub use memory::{MemoryCollection, MemoryStore};

pub trait DocumentStore: Send + Sync {
    /// Returns the handle for `name`, creating the collection if needed.
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>>;
}

pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Replaces the document whose `_id` equals `id`, or inserts it.
    fn upsert_by_id(&self, id: &Bson, document: Document) -> StoreResult<WriteOutcome>;

    fn delete_by_id(&self, id: &Bson) -> StoreResult<bool>;

    fn find_by_id(&self, id: &Bson) -> StoreResult<Option<Document>>;

    /// Creates the index if absent and returns its name.
    fn create_index(&self, spec: &IndexSpec) -> StoreResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    Ascending,
    Descending,
}

impl IndexOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub order: IndexOrder,
}

impl IndexKey {
    pub fn new(field: impl Into<String>, order: IndexOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// Index definition: fields with ordering, uniqueness and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
}

impl IndexSpec {
    /// Named `<field>_<order>` per key, e.g. `email_1` or `age_-1_name_1`.
    pub fn new(keys: Vec<IndexKey>) -> Self {
        let name = keys
            .iter()
            .map(|key| format!("{}_{}", key.field, key.order.as_i32()))
            .collect::<Vec<_>>()
            .join("_");
        Self {
            name,
            keys,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Key document in the `{ field: 1 | -1 }` form.
    pub fn key_document(&self) -> Document {
        let mut document = Document::new();
        for key in &self.keys {
            document.insert(key.field.clone(), key.order.as_i32());
        }
        document
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.key_document())?;
        if self.unique {
            write!(f, " unique")?;
        }
        Ok(())
    }
}

/// Stable text key of an identity value, used for id lookups.
pub fn id_key(id: &Bson) -> String {
    id.clone().into_relaxed_extjson().to_string()
}
