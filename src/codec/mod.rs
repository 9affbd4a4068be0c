//! Conversion between entity graphs and BSON documents.
//!
//! Encoding walks the graph once, omitting nodes already visited, so
//! cycles terminate. Decoding is best-effort: unknown fields and wire
//! type mismatches are logged and skipped. Unknown enum symbols, missing
//! codecs and malformed references are errors.

mod decode;
mod encode;
pub mod registry;
pub mod text;

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{CodecError, ContractRef, Primitive, Result, Value, ValueType};
use crate::entity::Entity;
use crate::session::Session;

pub use registry::{CodecRegistry, ScalarCodec};

/// Collection field of a structured reference.
pub const REF_COLLECTION_FIELD: &str = "$ref";
/// Identity field of a structured reference.
pub const REF_ID_FIELD: &str = "$id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    /// Store write: cascades saves and generates missing reference ids.
    Save,
    /// Wire transfer: generates missing reference ids.
    Encode,
    /// Display: leaves every instance untouched.
    Render,
}

impl CodecMode {
    pub fn marks_persisted(self) -> bool {
        !matches!(self, Self::Render)
    }
}

pub fn encode_entity(entity: &Entity, mode: CodecMode) -> Result<Document> {
    encode::Encoder::new(entity.session(), mode).encode_root(entity)
}

pub fn decode_entity(
    session: &Session,
    contract: ContractRef,
    document: &Document,
) -> Result<Entity> {
    decode::Decoder::new(session).decode_new(contract, document)
}

/// Decodes `document` into an existing instance, merging its properties.
pub fn decode_into(entity: &Entity, document: &Document) -> Result<()> {
    decode::Decoder::new(entity.session()).decode_into(entity, document)
}

/// Wire form of a scalar value. Entities and containers are not scalars.
pub fn encode_scalar(value: &Value, codecs: &CodecRegistry) -> Result<Bson> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Int(i) => Bson::Int32(*i),
        Value::Long(l) => Bson::Int64(*l),
        Value::Double(d) => Bson::Double(*d),
        Value::String(s) => Bson::String(s.clone()),
        Value::ObjectId(id) => Bson::ObjectId(*id),
        Value::Uuid(id) => Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: id.as_bytes().to_vec(),
        }),
        Value::Timestamp(ts) => Bson::DateTime(bson::DateTime::from_millis(ts.timestamp_millis())),
        Value::Enum(e) => Bson::String(e.symbol().to_string()),
        Value::Document(document) => Bson::Document(document.clone()),
        Value::Custom(scalar) => codecs.require(scalar.scalar_type_name())?.encode(&**scalar)?,
        Value::Entity(entity) => {
            return Err(CodecError::NoCodec {
                type_name: entity.contract().name().to_string(),
            }
            .into())
        }
        Value::Container(_) => {
            return Err(CodecError::NoCodec {
                type_name: "container".to_string(),
            }
            .into())
        }
    })
}

/// Reads a built-in scalar of `value_type`, widening numerics.
///
/// `None` when the wire type does not fit.
pub fn decode_scalar(value_type: &ValueType, bson: &Bson) -> Option<Value> {
    match (value_type, bson) {
        (ValueType::Primitive(primitive) | ValueType::Boxed(primitive), bson) => {
            decode_primitive(*primitive, bson)
        }
        (ValueType::String, Bson::String(s)) => Some(Value::String(s.clone())),
        (ValueType::ObjectId, Bson::ObjectId(id)) => Some(Value::ObjectId(*id)),
        (ValueType::Uuid, Bson::Binary(binary))
            if matches!(binary.subtype, BinarySubtype::Uuid | BinarySubtype::UuidOld) =>
        {
            Uuid::from_slice(&binary.bytes).ok().map(Value::Uuid)
        }
        (ValueType::Uuid, Bson::String(text)) => Uuid::parse_str(text).ok().map(Value::Uuid),
        (ValueType::Timestamp, Bson::DateTime(ts)) => {
            DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()).map(Value::Timestamp)
        }
        (ValueType::Document, Bson::Document(document)) => Some(Value::Document(document.clone())),
        _ => None,
    }
}

fn decode_primitive(primitive: Primitive, bson: &Bson) -> Option<Value> {
    match (primitive, bson) {
        (Primitive::Bool, Bson::Boolean(b)) => Some(Value::Bool(*b)),
        (Primitive::Int, Bson::Int32(i)) => Some(Value::Int(*i)),
        (Primitive::Int, Bson::Int64(l)) => i32::try_from(*l).ok().map(Value::Int),
        (Primitive::Long, Bson::Int32(i)) => Some(Value::Long(i64::from(*i))),
        (Primitive::Long, Bson::Int64(l)) => Some(Value::Long(*l)),
        (Primitive::Double, Bson::Double(d)) => Some(Value::Double(*d)),
        (Primitive::Double, Bson::Int32(i)) => Some(Value::Double(f64::from(*i))),
        (Primitive::Double, Bson::Int64(l)) => Some(Value::Double(*l as f64)),
        _ => None,
    }
}
