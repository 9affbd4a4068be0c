use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use bson::{Bson, Document};
use log::debug;

use crate::core::naming::ID_FIELD;
use crate::core::{StoreError, StoreResult};
use crate::store::{id_key, DocumentCollection, DocumentStore, IndexSpec, WriteOutcome};

fn lock_error<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Backend(format!("lock poisoned: {}", err))
}

/// In-process document store.
///
/// Keeps documents in insertion order per collection, enforces unique
/// indexes and counts writes, which makes it the reference backend for
/// tests and embedders.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed handle, for inspecting counters.
    pub fn memory_collection(&self, name: &str) -> StoreResult<Arc<MemoryCollection>> {
        if let Some(collection) = self.collections.read().map_err(lock_error)?.get(name) {
            return Ok(Arc::clone(collection));
        }
        let mut collections = self.collections.write().map_err(lock_error)?;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)));
        Ok(Arc::clone(collection))
    }

    pub fn collection_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map_err(lock_error)?
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>> {
        let collection: Arc<dyn DocumentCollection> = self.memory_collection(name)?;
        Ok(collection)
    }
}

#[derive(Default)]
struct CollectionState {
    next_sequence: u64,
    documents: BTreeMap<u64, Document>,
    positions: HashMap<String, u64>,
    indexes: Vec<IndexSpec>,
}

impl CollectionState {
    fn index_key(spec: &IndexSpec, document: &Document) -> String {
        spec.keys
            .iter()
            .map(|key| id_key(document.get(&key.field).unwrap_or(&Bson::Null)))
            .collect::<Vec<_>>()
            .join("|")
    }

    fn check_unique(&self, collection: &str, key: &str, document: &Document) -> StoreResult<()> {
        let own = self.positions.get(key);
        for spec in self.indexes.iter().filter(|spec| spec.unique) {
            let candidate = Self::index_key(spec, document);
            let clash = self.documents.iter().any(|(sequence, existing)| {
                Some(sequence) != own && Self::index_key(spec, existing) == candidate
            });
            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    index: spec.name.clone(),
                    key: candidate,
                });
            }
        }
        Ok(())
    }
}

pub struct MemoryCollection {
    name: String,
    state: RwLock<CollectionState>,
    writes: AtomicUsize,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CollectionState::default()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Upserts and deletes that changed the collection.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn document_count(&self) -> StoreResult<usize> {
        Ok(self.state.read().map_err(lock_error)?.documents.len())
    }

    pub fn documents(&self) -> StoreResult<Vec<Document>> {
        Ok(self
            .state
            .read()
            .map_err(lock_error)?
            .documents
            .values()
            .cloned()
            .collect())
    }

    pub fn indexes(&self) -> StoreResult<Vec<IndexSpec>> {
        Ok(self.state.read().map_err(lock_error)?.indexes.clone())
    }
}

impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert_by_id(&self, id: &Bson, document: Document) -> StoreResult<WriteOutcome> {
        let key = id_key(id);
        let document = if document.get(ID_FIELD) == Some(id) {
            document
        } else {
            let mut with_id = Document::new();
            with_id.insert(ID_FIELD, id.clone());
            for (field, value) in document {
                if field != ID_FIELD {
                    with_id.insert(field, value);
                }
            }
            with_id
        };

        let mut state = self.state.write().map_err(lock_error)?;
        state.check_unique(&self.name, &key, &document)?;

        let outcome = match state.positions.get(&key).copied() {
            Some(sequence) => {
                state.documents.insert(sequence, document);
                WriteOutcome::Updated
            }
            None => {
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                state.documents.insert(sequence, document);
                state.positions.insert(key.clone(), sequence);
                WriteOutcome::Inserted
            }
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!("{:?} {} in '{}'", outcome, key, self.name);
        Ok(outcome)
    }

    fn delete_by_id(&self, id: &Bson) -> StoreResult<bool> {
        let key = id_key(id);
        let mut state = self.state.write().map_err(lock_error)?;
        let Some(sequence) = state.positions.remove(&key) else {
            return Ok(false);
        };
        state.documents.remove(&sequence);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn find_by_id(&self, id: &Bson) -> StoreResult<Option<Document>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .positions
            .get(&id_key(id))
            .and_then(|sequence| state.documents.get(sequence))
            .cloned())
    }

    fn create_index(&self, spec: &IndexSpec) -> StoreResult<String> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.indexes.iter().any(|existing| existing.name == spec.name) {
            return Ok(spec.name.clone());
        }
        if spec.unique {
            let mut seen = HashMap::new();
            for document in state.documents.values() {
                let key = CollectionState::index_key(spec, document);
                if seen.insert(key.clone(), ()).is_some() {
                    return Err(StoreError::DuplicateKey {
                        collection: self.name.clone(),
                        index: spec.name.clone(),
                        key,
                    });
                }
            }
        }
        state.indexes.push(spec.clone());
        debug!("Created index {} on '{}'", spec, self.name);
        Ok(spec.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IndexKey, IndexOrder};
    use bson::doc;

    #[test]
    fn test_upsert_inserts_then_updates() {
        let store = MemoryStore::new();
        let people = store.collection("people").unwrap();
        let id = Bson::Int64(1);

        assert_eq!(
            people.upsert_by_id(&id, doc! { "_id": 1_i64, "name": "Ann" }).unwrap(),
            WriteOutcome::Inserted
        );
        assert_eq!(
            people.upsert_by_id(&id, doc! { "_id": 1_i64, "name": "Bea" }).unwrap(),
            WriteOutcome::Updated
        );

        let found = people.find_by_id(&id).unwrap().unwrap();
        assert_eq!(found.get_str("name").unwrap(), "Bea");

        let typed = store.memory_collection("people").unwrap();
        assert_eq!(typed.write_count(), 2);
        assert_eq!(typed.document_count().unwrap(), 1);
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        let people = store.collection("people").unwrap();
        people.upsert_by_id(&Bson::Int32(7), doc! { "name": "Ann" }).unwrap();

        assert!(people.delete_by_id(&Bson::Int32(7)).unwrap());
        assert!(!people.delete_by_id(&Bson::Int32(7)).unwrap());
        assert!(people.find_by_id(&Bson::Int32(7)).unwrap().is_none());
    }

    #[test]
    fn test_upsert_puts_id_first() {
        let store = MemoryStore::new();
        let people = store.collection("people").unwrap();
        people.upsert_by_id(&Bson::Int32(7), doc! { "name": "Ann" }).unwrap();

        let found = people.find_by_id(&Bson::Int32(7)).unwrap().unwrap();
        assert_eq!(found.keys().next().map(String::as_str), Some("_id"));
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let store = MemoryStore::new();
        let people = store.collection("people").unwrap();
        let spec = IndexSpec::new(vec![IndexKey::new("email", IndexOrder::Ascending)]).unique();
        assert_eq!(people.create_index(&spec).unwrap(), "email_1");

        people
            .upsert_by_id(&Bson::Int32(1), doc! { "_id": 1, "email": "a@x" })
            .unwrap();
        // Re-saving the same document does not clash with itself
        people
            .upsert_by_id(&Bson::Int32(1), doc! { "_id": 1, "email": "a@x" })
            .unwrap();

        let err = people
            .upsert_by_id(&Bson::Int32(2), doc! { "_id": 2, "email": "a@x" })
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(people.find_by_id(&Bson::Int32(2)).unwrap(), None);
    }
}
