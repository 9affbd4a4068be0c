//! Entry point tying a store, the registries and configuration together.

pub mod config;

use std::fmt;
use std::sync::Arc;

use bson::Document;
use log::debug;

use crate::codec::{self, CodecMode, CodecRegistry};
use crate::core::{AccessError, ContainerRegistry, ContractRef, Result, Value};
use crate::entity::{Entity, TypedEntity};
use crate::schema::{self, EntityContract, EntitySchema};
use crate::store::{DocumentCollection, DocumentStore};

pub use config::SessionConfig;

struct SessionInner {
    store: Option<Arc<dyn DocumentStore>>,
    containers: Arc<ContainerRegistry>,
    codecs: Arc<CodecRegistry>,
    config: SessionConfig,
}

/// Factory and codec front for entities.
///
/// Cheap to clone; every entity keeps the session it was created by.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use docbind::{MemoryStore, Session};
///
/// let session = Session::new(Arc::new(MemoryStore::new()));
/// assert!(session.store().is_some());
/// assert!(Session::detached().store().is_none());
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::builder().store(store).build()
    }

    /// Session with no store: entities can be built, encoded and decoded
    /// but not saved, deleted or loaded.
    pub fn detached() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn store(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.inner.store.as_ref()
    }

    pub fn containers(&self) -> &Arc<ContainerRegistry> {
        &self.inner.containers
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.inner.codecs
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn collection_name(&self, schema: &EntitySchema) -> String {
        match &self.inner.config.collection_prefix {
            Some(prefix) => format!("{}{}", prefix, schema.collection()),
            None => schema.collection().to_string(),
        }
    }

    pub(crate) fn collection_for(
        &self,
        schema: &EntitySchema,
        operation: &str,
    ) -> Result<Arc<dyn DocumentCollection>> {
        let store = self.store().ok_or_else(|| AccessError::NoStoreBinding {
            entity: schema.name().to_string(),
            operation: operation.to_string(),
        })?;
        Ok(store.collection(&self.collection_name(schema))?)
    }

    pub fn schema<C: EntityContract>(&self) -> Result<Arc<EntitySchema>> {
        schema::schema_of::<C>()
    }

    // Typed factories

    /// Store-free instance; persistence operations fail on it.
    pub fn instantiate<T: TypedEntity>(&self) -> Result<T> {
        self.instantiate_entity(ContractRef::of::<T>()).map(T::from_entity)
    }

    pub fn create<T: TypedEntity>(&self) -> Result<T> {
        self.create_entity(ContractRef::of::<T>()).map(T::from_entity)
    }

    /// Store-bound instance holding only `id`; the rest loads on first access.
    pub fn create_lazy<T: TypedEntity>(&self, id: impl Into<Value>) -> Result<T> {
        self.create_lazy_entity(ContractRef::of::<T>(), id.into())
            .map(T::from_entity)
    }

    pub fn load<T: TypedEntity>(&self, id: impl Into<Value>) -> Result<Option<T>> {
        Ok(self
            .load_entity(ContractRef::of::<T>(), id.into())?
            .map(T::from_entity))
    }

    pub fn decode<T: TypedEntity>(&self, document: &Document) -> Result<T> {
        self.decode_entity(ContractRef::of::<T>(), document)
            .map(T::from_entity)
    }

    /// Parses document text and decodes it.
    pub fn parse<T: TypedEntity>(&self, text: &str) -> Result<T> {
        self.decode(&self.parse_document(text)?)
    }

    // Untyped factories

    pub fn instantiate_entity(&self, contract: ContractRef) -> Result<Entity> {
        let schema = schema::schema_for(contract)?;
        Ok(Entity::build(schema, self.clone(), false))
    }

    pub fn create_entity(&self, contract: ContractRef) -> Result<Entity> {
        let schema = schema::schema_for(contract)?;
        if self.store().is_none() {
            return Err(AccessError::NoStoreBinding {
                entity: schema.name().to_string(),
                operation: "create".to_string(),
            }
            .into());
        }
        Ok(Entity::build(schema, self.clone(), true))
    }

    pub fn create_lazy_entity(&self, contract: ContractRef, id: Value) -> Result<Entity> {
        let schema = schema::schema_for(contract)?;
        self.collection_for(&schema, "create a lazy instance of")?;
        Entity::lazy(schema, self.clone(), None, id)
    }

    pub fn load_entity(&self, contract: ContractRef, id: Value) -> Result<Option<Entity>> {
        let schema = schema::schema_for(contract)?;
        let collection = self.collection_for(&schema, "load")?;
        let id = codec::encode_scalar(&id, self.codecs())?;
        let Some(document) = collection.find_by_id(&id)? else {
            debug!("No {} with id {} in '{}'", schema.name(), id, collection.name());
            return Ok(None);
        };
        let entity = codec::decode_entity(self, contract, &document)?;
        entity.record_saved(document);
        Ok(Some(entity))
    }

    pub fn decode_entity(&self, contract: ContractRef, document: &Document) -> Result<Entity> {
        codec::decode_entity(self, contract, document)
    }

    // Codec front

    /// Encodes for wire transfer; marks the instance persisted.
    pub fn encode(&self, entity: &Entity) -> Result<Document> {
        codec::encode_entity(entity, CodecMode::Encode)
    }

    /// Document text of `entity`, without touching its persisted state.
    pub fn render(&self, entity: &Entity) -> Result<String> {
        let document = codec::encode_entity(entity, CodecMode::Render)?;
        codec::text::render_document(&document, self.config().pretty_render)
    }

    pub fn parse_document(&self, text: &str) -> Result<Document> {
        codec::text::parse_document(text)
    }

    /// Creates the indexes declared on `C`, returning their names.
    pub fn ensure_indexes<C: EntityContract>(&self) -> Result<Vec<String>> {
        self.ensure_indexes_for(ContractRef::of::<C>())
    }

    pub fn ensure_indexes_for(&self, contract: ContractRef) -> Result<Vec<String>> {
        let schema = schema::schema_for(contract)?;
        let collection = self.collection_for(&schema, "create indexes for")?;
        let mut names = Vec::with_capacity(schema.indexes().len());
        for spec in schema.indexes() {
            names.push(collection.create_index(spec)?);
        }
        Ok(names)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("bound", &self.inner.store.is_some())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[derive(Default)]
pub struct SessionBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    containers: Option<Arc<ContainerRegistry>>,
    codecs: Option<Arc<CodecRegistry>>,
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Shares a container registry between sessions.
    pub fn containers(mut self, containers: Arc<ContainerRegistry>) -> Self {
        self.containers = Some(containers);
        self
    }

    pub fn codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = Some(codecs);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                store: self.store,
                containers: self.containers.unwrap_or_default(),
                codecs: self.codecs.unwrap_or_default(),
                config: self.config,
            }),
        }
    }
}
