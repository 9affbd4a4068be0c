use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bson::{oid::ObjectId, Document};
use log::{debug, info, warn};

use crate::codec::{self, CodecMode};
use crate::core::naming::ID_FIELD;
use crate::core::{AccessError, Result, Value, ValueType, Violations};
use crate::entity::Entity;
use crate::store::{id_key, DocumentCollection};

/// Marks an instance as being saved for the duration of one save.
struct SavingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SavingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Entity {
    /// Writes this instance to its collection.
    ///
    /// Returns `false` when nothing was written: the instance was already
    /// being saved further up a cascade, or its document is unchanged
    /// since the last save.
    pub fn save(&self) -> Result<bool> {
        let collection = self.bound_collection("save")?;
        self.materialize()?;

        let Some(_guard) = SavingGuard::acquire(self.saving_flag()) else {
            info!("{} is already being saved, skipping nested save", self.describe());
            return Ok(false);
        };

        if self.session().config().validate_on_save {
            self.validate()?;
        }
        let id = self.ensure_identity()?;

        let was_persisted = self.is_persisted();
        let document = match codec::encode_entity(self, CodecMode::Save) {
            Ok(document) => document,
            Err(err) => {
                self.write_state().persisted = was_persisted;
                return Err(err);
            }
        };

        if self.session().config().dirty_tracking
            && self.read_state().last_saved.as_ref() == Some(&document)
        {
            debug!("{} unchanged since last save", self.describe());
            return Ok(false);
        }

        let id = codec::encode_scalar(&id, self.session().codecs())?;
        if let Err(err) = collection.upsert_by_id(&id, document.clone()) {
            self.write_state().persisted = was_persisted;
            return Err(err.into());
        }

        let mut state = self.write_state();
        state.persisted = true;
        state.last_saved = Some(document);
        debug!("Saved {} {} to '{}'", self.contract().name(), id_key(&id), collection.name());
        Ok(true)
    }

    fn bound_collection(&self, operation: &str) -> Result<Arc<dyn DocumentCollection>> {
        if !self.is_bound() {
            return Err(AccessError::NoStoreBinding {
                entity: self.contract().name().to_string(),
                operation: operation.to_string(),
            }
            .into());
        }
        let store = self.session().store().ok_or_else(|| AccessError::NoStoreBinding {
            entity: self.contract().name().to_string(),
            operation: operation.to_string(),
        })?;
        Ok(store.collection(&self.collection_name())?)
    }

    /// Removes the stored record; `false` if there was nothing to remove.
    pub fn delete(&self) -> Result<bool> {
        let collection = self.bound_collection("delete")?;
        let Some(id) = self.id() else {
            return Ok(false);
        };
        let id = codec::encode_scalar(&id, self.session().codecs())?;
        let removed = collection.delete_by_id(&id)?;
        self.write_state().last_saved = None;
        Ok(removed)
    }

    /// Fetches a fresh instance of the same contract by id.
    pub fn load(&self, id: impl Into<Value>) -> Result<Option<Entity>> {
        self.session().load_entity(self.contract(), id.into())
    }

    /// Reports every violated constraint at once.
    pub fn validate(&self) -> Result<()> {
        self.materialize()?;
        let state = self.read_state();
        let mut violations = Vec::new();
        for property in self.schema().validated() {
            let value = state
                .data
                .get(property.external_name())
                .cloned()
                .or_else(|| property.value_type().zero_value())
                .unwrap_or(Value::Null);
            violations.extend(property.check(&value));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AccessError::ConstraintViolation(Violations(violations)).into())
        }
    }

    /// Returns the identity, generating one for a synthetic `_id`.
    pub(crate) fn ensure_identity(&self) -> Result<Value> {
        if let Some(id) = self.id() {
            return Ok(id);
        }
        let schema = self.schema();
        if schema.has_explicit_identity() || schema.identity().value_type() != &ValueType::ObjectId
        {
            return Err(AccessError::MissingIdentity {
                entity: self.contract().name().to_string(),
            }
            .into());
        }

        let id = Value::ObjectId(ObjectId::new());
        self.write_state()
            .data
            .insert(ID_FIELD.to_string(), id.clone());
        debug!("Generated id {} for {}", id, self.contract().name());
        Ok(id)
    }

    /// Loads the full record behind a lazy instance. No-op otherwise.
    pub(crate) fn materialize(&self) -> Result<()> {
        if !self.is_lazy() {
            return Ok(());
        }
        let (Some(id), true) = (self.id(), self.is_bound()) else {
            debug!("{} has no store to load from, keeping id only", self.describe());
            self.write_state().lazy = false;
            return Ok(());
        };

        let collection = self.bound_collection("load")?;
        let id = codec::encode_scalar(&id, self.session().codecs())?;
        match collection.find_by_id(&id)? {
            Some(document) => {
                codec::decode_into(self, &document)?;
                self.record_saved(document);
            }
            None => {
                warn!(
                    "Lazy {} not found in '{}', keeping id only",
                    self.describe(),
                    collection.name()
                );
                self.write_state().lazy = false;
            }
        }
        Ok(())
    }

    /// Marks the instance as matching `document` in the store.
    pub(crate) fn record_saved(&self, document: Document) {
        let mut state = self.write_state();
        state.persisted = true;
        state.last_saved = Some(document);
    }

    pub(crate) fn mark_persisted(&self) {
        self.write_state().persisted = true;
    }

    /// Merges decoded properties and clears the lazy flag.
    pub(crate) fn apply_decoded(&self, decoded: Vec<(String, Value)>) {
        let mut state = self.write_state();
        for (name, value) in decoded {
            state.data.insert(name, value);
        }
        state.persisted = true;
        state.lazy = false;
    }
}
