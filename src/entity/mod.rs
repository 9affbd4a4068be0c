//! Live entity instances.
//!
//! An [`Entity`] is a shared handle on the backing state of one record.
//! Every read and write goes through the schema of its contract: unknown
//! names, type mismatches, constraint failures, sealed instances and
//! immutable properties are all rejected here.

mod dispatch;
pub(crate) mod equality;
pub mod field_value;
mod lifecycle;

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bson::Document;
use im::OrdMap;

use crate::core::naming::ID_FIELD;
use crate::core::{AccessError, ContractRef, Error, Result, Value, Violations};
use crate::schema::{EntitySchema, PropertyDescriptor};
use crate::session::Session;

pub use field_value::{FieldValue, TypedEntity};

pub(crate) type DataMap = OrdMap<String, Value>;

pub(crate) struct EntityState {
    /// Keyed by external name. An absent key is unset; an explicit null
    /// compares and hashes like an absent key.
    pub(crate) data: DataMap,
    pub(crate) sealed: bool,
    pub(crate) persisted: bool,
    pub(crate) lazy: bool,
    /// Document written by the last effective save.
    pub(crate) last_saved: Option<Document>,
}

struct EntityInner {
    schema: Arc<EntitySchema>,
    session: Session,
    bound: bool,
    /// Collection the record was read from, when a reference named one
    /// other than the session's collection for the schema.
    collection: Option<String>,
    state: RwLock<EntityState>,
    saving: AtomicBool,
}

/// Handle on one entity instance. Clones share the same state.
///
/// A single instance must not be mutated from several threads at once.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    pub(crate) fn build(schema: Arc<EntitySchema>, session: Session, bound: bool) -> Self {
        Self::with_state(schema, session, bound, None, DataMap::new(), false)
    }

    /// Bound instance for a record stored in `collection`.
    pub(crate) fn build_in(
        schema: Arc<EntitySchema>,
        session: Session,
        collection: Option<String>,
    ) -> Self {
        Self::with_state(schema, session, true, collection, DataMap::new(), false)
    }

    /// Id-only instance of a stored record; the rest loads on first access.
    pub(crate) fn lazy(
        schema: Arc<EntitySchema>,
        session: Session,
        collection: Option<String>,
        id: Value,
    ) -> Result<Self> {
        let identity = schema.identity();
        let id = identity.value_type().coerce(id).map_err(|found| {
            Error::casting(identity.external_name(), identity.value_type(), found.type_name())
        })?;
        if id.is_null() {
            return Err(AccessError::MissingIdentity {
                entity: schema.name().to_string(),
            }
            .into());
        }

        let mut data = DataMap::new();
        data.insert(ID_FIELD.to_string(), id);
        let bound = session.store().is_some();
        let entity = Self::with_state(schema, session, bound, collection, data, true);
        entity.write_state().persisted = true;
        Ok(entity)
    }

    fn with_state(
        schema: Arc<EntitySchema>,
        session: Session,
        bound: bool,
        collection: Option<String>,
        data: DataMap,
        lazy: bool,
    ) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                schema,
                session,
                bound,
                collection,
                state: RwLock::new(EntityState {
                    data,
                    sealed: false,
                    persisted: false,
                    lazy,
                    last_saved: None,
                }),
                saving: AtomicBool::new(false),
            }),
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.inner.schema
    }

    pub fn contract(&self) -> ContractRef {
        self.inner.schema.contract()
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Whether persistence operations are available.
    pub fn is_bound(&self) -> bool {
        self.inner.bound
    }

    /// Collection holding this instance's record.
    pub fn collection_name(&self) -> String {
        match &self.inner.collection {
            Some(collection) => collection.clone(),
            None => self.inner.session.collection_name(&self.inner.schema),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.read_state().sealed
    }

    pub fn is_persisted(&self) -> bool {
        self.read_state().persisted
    }

    pub fn is_lazy(&self) -> bool {
        self.read_state().lazy
    }

    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn saving_flag(&self) -> &AtomicBool {
        &self.inner.saving
    }

    // A panic while holding the lock leaves the data itself consistent:
    // every write is a single map insert or flag store.
    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, EntityState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, EntityState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current identity value, without loading a lazy instance.
    pub fn id(&self) -> Option<Value> {
        self.read_state()
            .data
            .get(ID_FIELD)
            .filter(|id| !id.is_null())
            .cloned()
    }

    pub(crate) fn raw_data(&self) -> DataMap {
        self.read_state().data.clone()
    }

    /// Materialized copy of the data map.
    pub(crate) fn snapshot(&self) -> Result<DataMap> {
        self.materialize()?;
        Ok(self.raw_data())
    }

    pub(crate) fn describe(&self) -> String {
        match self.id() {
            Some(id) => format!("{}({})", self.contract().name(), id),
            None => format!("{}(unsaved)", self.contract().name()),
        }
    }

    fn resolve(&self, name: &str) -> Result<usize> {
        self.inner.schema.property_index(name).ok_or_else(|| {
            AccessError::UnknownProperty {
                entity: self.contract().name().to_string(),
                property: name.to_string(),
            }
            .into()
        })
    }

    fn property(&self, index: usize) -> &PropertyDescriptor {
        &self.inner.schema.properties()[index]
    }

    /// Reads a property by external or internal name.
    ///
    /// Unset primitive properties read as their zero value, other unset
    /// properties as [`Value::Null`].
    pub fn get(&self, name: &str) -> Result<Value> {
        let index = self.resolve(name)?;
        self.get_at(index)
    }

    pub(crate) fn get_at(&self, index: usize) -> Result<Value> {
        let property = self.property(index);
        if !property.is_identity() {
            self.materialize()?;
        }
        if let Some(computer) = property.computer() {
            return computer.compute(self);
        }

        let state = self.read_state();
        Ok(match state.data.get(property.external_name()) {
            Some(value) => value.clone(),
            None => property.value_type().zero_value().unwrap_or(Value::Null),
        })
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.resolve(name)?;
        self.set_at(index, value.into())
    }

    pub(crate) fn set_at(&self, index: usize, value: Value) -> Result<()> {
        let property = self.property(index);
        if property.is_computed() {
            return Err(AccessError::Computed {
                property: property.external_name().to_string(),
            }
            .into());
        }
        if !property.is_identity() {
            self.materialize()?;
        }
        self.check_mutable(property)?;

        let value = property.value_type().coerce(value).map_err(|found| {
            Error::casting(property.external_name(), property.value_type(), found.type_name())
        })?;
        check_constraints(property, &value)?;

        self.write_state()
            .data
            .insert(property.external_name().to_string(), value);
        Ok(())
    }

    /// Appends to a container property, creating the container from the
    /// session's default registry when the property is unset.
    ///
    /// A container argument appends each of its items.
    pub fn add(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.resolve(name)?;
        self.add_at(index, value.into())
    }

    pub(crate) fn add_at(&self, index: usize, value: Value) -> Result<()> {
        let property = self.property(index);
        if property.is_computed() {
            return Err(AccessError::Computed {
                property: property.external_name().to_string(),
            }
            .into());
        }
        let value_type = property.value_type();
        let (Some(kind), Some(element)) = (value_type.container_kind(), value_type.element_type())
        else {
            return Err(AccessError::NotAContainer {
                property: property.external_name().to_string(),
            }
            .into());
        };
        self.materialize()?;
        self.check_mutable(property)?;

        let existing = self.read_state().data.get(property.external_name()).cloned();
        let mut container = match existing {
            Some(Value::Container(container)) => container,
            _ => self.session().containers().instantiate(kind)?,
        };

        let incoming = match value {
            Value::Container(items) if element.container_kind().is_none() => items.into_items(),
            single => vec![single],
        };
        for item in incoming {
            let item = element.coerce(item).map_err(|found| {
                Error::casting(property.external_name(), element, found.type_name())
            })?;
            container.push(item)?;
        }

        let value = Value::Container(container);
        check_constraints(property, &value)?;
        self.write_state()
            .data
            .insert(property.external_name().to_string(), value);
        Ok(())
    }

    fn check_mutable(&self, property: &PropertyDescriptor) -> Result<()> {
        let state = self.read_state();
        if state.sealed {
            return Err(AccessError::Sealed {
                entity: self.contract().name().to_string(),
                property: property.external_name().to_string(),
            }
            .into());
        }
        if property.is_immutable() && state.persisted {
            return Err(AccessError::Immutable {
                entity: self.contract().name().to_string(),
                property: property.external_name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Irreversibly blocks `set` and `add`.
    pub fn seal(&self) {
        self.write_state().sealed = true;
    }

    /// Encodes for wire transfer (see [`Session::encode`]).
    pub fn to_document(&self) -> Result<Document> {
        self.session().encode(self)
    }

    /// Document text of this instance; never marks it persisted.
    pub fn render(&self) -> Result<String> {
        self.session().render(self)
    }
}

fn check_constraints(property: &PropertyDescriptor, value: &Value) -> Result<()> {
    let violations = property.check(value);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AccessError::ConstraintViolation(Violations(violations)).into())
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("Entity")
            .field("contract", &self.contract().name())
            .field("id", &state.data.get(ID_FIELD))
            .field("persisted", &state.persisted)
            .field("sealed", &state.sealed)
            .field("lazy", &state.lazy)
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "{} <unrenderable: {}>", self.describe(), err),
        }
    }
}
