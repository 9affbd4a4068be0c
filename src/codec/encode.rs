use std::collections::HashSet;

use bson::{Bson, Document};
use log::{debug, info};

use crate::codec::{encode_scalar, CodecMode, REF_COLLECTION_FIELD, REF_ID_FIELD};
use crate::core::{Error, Result, Value};
use crate::entity::{DataMap, Entity};
use crate::schema::{PropertyDescriptor, ReferenceMode, ReferenceTag};
use crate::session::Session;

pub(crate) struct Encoder<'a> {
    session: &'a Session,
    mode: CodecMode,
    visited: HashSet<usize>,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(session: &'a Session, mode: CodecMode) -> Self {
        Self {
            session,
            mode,
            visited: HashSet::new(),
        }
    }

    pub(crate) fn encode_root(mut self, entity: &Entity) -> Result<Document> {
        Ok(self.encode_entity(entity)?.unwrap_or_default())
    }

    /// `None` when `entity` was already encoded in this traversal.
    fn encode_entity(&mut self, entity: &Entity) -> Result<Option<Document>> {
        if !self.visited.insert(entity.address()) {
            info!("{} already encoded in this document, omitting it", entity.describe());
            return Ok(None);
        }

        let data = self.snapshot(entity)?;
        if self.mode.marks_persisted() {
            entity.mark_persisted();
        }

        let mut document = Document::new();
        for property in entity.schema().properties() {
            if property.is_transient() || property.is_computed() {
                continue;
            }
            let Some(value) = data.get(property.external_name()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if let Some(bson) = self.encode_property(property, value)? {
                document.insert(property.external_name(), bson);
            }
        }
        Ok(Some(document))
    }

    fn snapshot(&self, entity: &Entity) -> Result<DataMap> {
        // Rendering an unbound lazy instance shows what is known locally
        if self.mode == CodecMode::Render && entity.is_lazy() && !entity.is_bound() {
            return Ok(entity.raw_data());
        }
        entity.snapshot()
    }

    fn encode_property(
        &mut self,
        property: &PropertyDescriptor,
        value: &Value,
    ) -> Result<Option<Bson>> {
        let Some(tag) = property.reference() else {
            return self.encode_value(value);
        };
        match value {
            Value::Entity(target) => self.encode_reference(target, tag).map(Some),
            Value::Container(items) => {
                let mut array = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Entity(target) => array.push(self.encode_reference(target, tag)?),
                        Value::Null => array.push(Bson::Null),
                        other => {
                            return Err(Error::casting(
                                property.external_name(),
                                property.value_type(),
                                other.type_name(),
                            ))
                        }
                    }
                }
                Ok(Some(Bson::Array(array)))
            }
            other => Err(Error::casting(
                property.external_name(),
                property.value_type(),
                other.type_name(),
            )),
        }
    }

    fn encode_value(&mut self, value: &Value) -> Result<Option<Bson>> {
        match value {
            Value::Entity(embedded) => Ok(self.encode_entity(embedded)?.map(Bson::Document)),
            Value::Container(items) => {
                let mut array = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(bson) = self.encode_value(item)? {
                        array.push(bson);
                    }
                }
                Ok(Some(Bson::Array(array)))
            }
            scalar => encode_scalar(scalar, self.session.codecs()).map(Some),
        }
    }

    fn encode_reference(&mut self, target: &Entity, tag: ReferenceTag) -> Result<Bson> {
        if self.mode == CodecMode::Save
            && self.session.config().cascade_saves
            && target.is_bound()
            && !target.is_lazy()
        {
            debug!("Cascading save to referenced {}", target.describe());
            target.save()?;
        }

        let id = match target.id() {
            Some(id) => id,
            None if self.mode == CodecMode::Render => Value::Null,
            None => target.ensure_identity()?,
        };
        let id = encode_scalar(&id, self.session.codecs())?;

        Ok(match tag.mode {
            ReferenceMode::Simple => id,
            ReferenceMode::Structured => {
                let mut reference = Document::new();
                reference.insert(REF_COLLECTION_FIELD, target.collection_name());
                reference.insert(REF_ID_FIELD, id);
                Bson::Document(reference)
            }
        })
    }
}
