use std::collections::HashMap;
use std::sync::Arc;

use bson::{Bson, Document};
use log::{debug, warn};

use crate::codec::{decode_scalar, REF_COLLECTION_FIELD, REF_ID_FIELD};
use crate::core::naming::ID_FIELD;
use crate::core::{
    AccessError, CodecError, Container, ContainerKind, ContractRef, Error, Result, Value,
    ValueType,
};
use crate::entity::Entity;
use crate::schema::{schema_for, PropertyDescriptor, ReferenceMode, ReferenceTag};
use crate::session::Session;
use crate::store::id_key;

fn malformed(property: &PropertyDescriptor, reason: impl Into<String>) -> Error {
    CodecError::MalformedReference {
        property: property.external_name().to_string(),
        reason: reason.into(),
    }
    .into()
}

pub(crate) struct Decoder<'a> {
    session: &'a Session,
    /// Instances already produced in this pass, by collection and id key.
    resolved: HashMap<(String, String), Entity>,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self {
            session,
            resolved: HashMap::new(),
        }
    }

    pub(crate) fn decode_new(
        &mut self,
        contract: ContractRef,
        document: &Document,
    ) -> Result<Entity> {
        let schema = schema_for(contract)?;
        let entity = Entity::build(schema, self.session.clone(), self.session.store().is_some());
        self.decode_into(&entity, document)?;
        Ok(entity)
    }

    pub(crate) fn decode_into(&mut self, entity: &Entity, document: &Document) -> Result<()> {
        let schema = Arc::clone(entity.schema());
        if let Some(id) = document.get(ID_FIELD) {
            let key = (entity.collection_name(), id_key(id));
            self.resolved.entry(key).or_insert_with(|| entity.clone());
        }

        let mut decoded = Vec::with_capacity(document.len());
        for (field, bson) in document {
            let Some(property) = schema.by_external(field) else {
                debug!("Skipping unknown field '{}' of {}", field, schema.name());
                continue;
            };
            if property.is_transient() || property.is_computed() {
                continue;
            }
            if let Some(value) = self.decode_property(property, bson)? {
                decoded.push((property.external_name().to_string(), value));
            }
        }
        entity.apply_decoded(decoded);
        Ok(())
    }

    fn decode_property(
        &mut self,
        property: &PropertyDescriptor,
        bson: &Bson,
    ) -> Result<Option<Value>> {
        if let Bson::Null = bson {
            // Leaving a primitive unset reads back as its zero value
            return Ok((!property.value_type().is_primitive()).then_some(Value::Null));
        }
        let Some(tag) = property.reference() else {
            return self.decode_value(property.external_name(), property.value_type(), bson);
        };

        match property.value_type() {
            ValueType::Entity(target) => {
                self.decode_reference(property, *target, tag, bson).map(Some)
            }
            ValueType::Container(kind, element) => {
                let (ValueType::Entity(target), Bson::Array(items)) = (element.as_ref(), bson)
                else {
                    warn!(
                        "Skipping '{}': expected an array of references, found {:?}",
                        property.external_name(),
                        bson.element_type()
                    );
                    return Ok(None);
                };
                let mut container = self.container_for(*kind)?;
                for item in items {
                    container.push(self.decode_reference(property, *target, tag, item)?)?;
                }
                Ok(Some(Value::Container(container)))
            }
            _ => Ok(None),
        }
    }

    fn decode_value(
        &mut self,
        name: &str,
        value_type: &ValueType,
        bson: &Bson,
    ) -> Result<Option<Value>> {
        match (value_type, bson) {
            (_, Bson::Null) => Ok(Some(Value::Null)),
            (ValueType::Enum(enum_type), Bson::String(symbol)) => enum_type
                .value_of(symbol)
                .map(|value| Some(Value::Enum(value)))
                .ok_or_else(|| {
                    CodecError::UnknownEnumSymbol {
                        enum_name: enum_type.name.to_string(),
                        symbol: symbol.clone(),
                    }
                    .into()
                }),
            (ValueType::Entity(contract), Bson::Document(embedded)) => {
                self.decode_new(*contract, embedded).map(|entity| Some(Value::Entity(entity)))
            }
            (ValueType::Container(kind, element), Bson::Array(items)) => {
                let mut container = self.container_for(*kind)?;
                for item in items {
                    if let Some(value) = self.decode_value(name, element, item)? {
                        container.push(value)?;
                    }
                }
                Ok(Some(Value::Container(container)))
            }
            (ValueType::Custom(type_name), bson) => {
                let codec = self.session.codecs().require(type_name)?;
                codec.decode(bson).map(Some)
            }
            (value_type, bson) => match decode_scalar(value_type, bson) {
                Some(value) => Ok(Some(value)),
                None => {
                    warn!(
                        "Skipping '{}': cannot read {:?} as {}",
                        name,
                        bson.element_type(),
                        value_type
                    );
                    Ok(None)
                }
            },
        }
    }

    fn decode_reference(
        &mut self,
        property: &PropertyDescriptor,
        target: ContractRef,
        tag: ReferenceTag,
        bson: &Bson,
    ) -> Result<Value> {
        let target_schema = schema_for(target)?;
        let default_collection = self.session.collection_name(&target_schema);
        let (collection, id_bson) = match tag.mode {
            ReferenceMode::Simple => (default_collection.clone(), bson.clone()),
            ReferenceMode::Structured => {
                let Bson::Document(reference) = bson else {
                    let reason = format!("expected a document, found {:?}", bson.element_type());
                    return Err(malformed(property, reason));
                };
                let Some(Bson::String(collection)) = reference.get(REF_COLLECTION_FIELD) else {
                    let reason = format!("missing string '{}'", REF_COLLECTION_FIELD);
                    return Err(malformed(property, reason));
                };
                let Some(id) = reference.get(REF_ID_FIELD) else {
                    return Err(malformed(property, format!("missing '{}'", REF_ID_FIELD)));
                };
                (collection.clone(), id.clone())
            }
        };
        let home = (collection != default_collection).then(|| collection.clone());
        if id_bson == Bson::Null {
            return Ok(Value::Null);
        }

        let key = (collection, id_key(&id_bson));
        if let Some(existing) = self.resolved.get(&key) {
            return Ok(Value::Entity(existing.clone()));
        }

        let identity = target_schema.identity();
        let Some(id) = decode_scalar(identity.value_type(), &id_bson) else {
            return Err(malformed(
                property,
                format!("id {} is not a {}", id_bson, identity.value_type()),
            ));
        };

        let fetched = if tag.is_lazy() {
            None
        } else {
            self.fetch(&key.0, &id_bson)?
        };
        let entity = match fetched {
            Some(document) => {
                let entity = Entity::build_in(target_schema, self.session.clone(), home);
                self.resolved.insert(key, entity.clone());
                self.decode_into(&entity, &document)?;
                entity.record_saved(document);
                entity
            }
            None => {
                let entity = Entity::lazy(target_schema, self.session.clone(), home, id)?;
                self.resolved.insert(key, entity.clone());
                entity
            }
        };
        Ok(Value::Entity(entity))
    }

    /// Immediate references fall back to lazy instances when there is no
    /// store or no stored target.
    fn fetch(&self, collection: &str, id: &Bson) -> Result<Option<Document>> {
        let Some(store) = self.session.store() else {
            debug!("No store to resolve {} in '{}', keeping it lazy", id, collection);
            return Ok(None);
        };
        let found = store.collection(collection)?.find_by_id(id)?;
        if found.is_none() {
            warn!("Referenced id {} not found in '{}'", id, collection);
        }
        Ok(found)
    }

    /// Registry default, or the natural implementation of `kind` when the
    /// registry has none.
    fn container_for(&self, kind: ContainerKind) -> Result<Container> {
        match self.session.containers().default_for(kind) {
            Ok(implementation) => Ok(Container::new(implementation)),
            Err(Error::Access(AccessError::NoContainerDefault { .. })) => {
                Ok(Container::new(kind.natural_impl()))
            }
            Err(err) => Err(err),
        }
    }
}
