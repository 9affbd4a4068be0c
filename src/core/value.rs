use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bson::oid::ObjectId;
use bson::Document;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::container::Container;
use crate::core::error::{AccessError, Error, Result};
use crate::core::types::EnumValue;
use crate::entity::Entity;

/// Application-defined scalar stored through a registered codec.
///
/// Implemented for every `Debug + PartialEq + Hash` type, so wrapping a
/// value is just `Value::custom(money)`.
pub trait CustomScalar: Any + Send + Sync + fmt::Debug {
    fn scalar_type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn eq_scalar(&self, other: &dyn CustomScalar) -> bool;
    fn hash_scalar(&self, state: &mut dyn Hasher);
}

impl<T> CustomScalar for T
where
    T: Any + Send + Sync + fmt::Debug + PartialEq + Hash,
{
    fn scalar_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_scalar(&self, other: &dyn CustomScalar) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn hash_scalar(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }
}

/// In-memory value of an entity property.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    ObjectId(ObjectId),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Enum(EnumValue),
    Entity(Entity),
    Container(Container),
    Document(Document),
    Custom(Arc<dyn CustomScalar>),
}

impl Value {
    pub fn custom<T: CustomScalar>(scalar: T) -> Self {
        Self::Custom(Arc::new(scalar))
    }

    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Greater),
            (_, Value::Null) => Ok(Ordering::Less),

            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Ok(a.cmp(b)),
            (Value::Int(a), Value::Long(b)) => Ok(i64::from(*a).cmp(b)),
            (Value::Long(a), Value::Int(b)) => Ok(a.cmp(&i64::from(*b))),
            (Value::Double(_), _) | (_, Value::Double(_))
                if self.as_f64().is_some() && other.as_f64().is_some() =>
            {
                let (a, b) = (self.as_f64().unwrap_or(0.0), other.as_f64().unwrap_or(0.0));
                // NaN sorts after every number and equal to itself
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ok(Ordering::Equal),
                    (true, false) => Ok(Ordering::Greater),
                    (false, true) => Ok(Ordering::Less),
                    (false, false) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
                }
            }

            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::ObjectId(a), Value::ObjectId(b)) => Ok(a.bytes().cmp(&b.bytes())),
            (Value::Uuid(a), Value::Uuid(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            (Value::Enum(a), Value::Enum(b)) if a.enum_type() == b.enum_type() => {
                Ok(a.ordinal().cmp(&b.ordinal()))
            }

            _ => Err(Error::Access(AccessError::Unordered {
                left: self.type_name().to_string(),
                right: other.type_name().to_string(),
            })),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::String(_) => "String",
            Self::ObjectId(_) => "ObjectId",
            Self::Uuid(_) => "Uuid",
            Self::Timestamp(_) => "Timestamp",
            Self::Enum(e) => e.enum_type().name,
            Self::Entity(e) => e.contract().name(),
            Self::Container(_) => "container",
            Self::Document(_) => "Document",
            Self::Custom(c) => c.scalar_type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i64::from(*i)),
            Self::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(f64::from(*i)),
            Self::Long(l) => Some(*l as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Self::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn downcast_custom<T: CustomScalar + Clone>(&self) -> Option<T> {
        match self {
            Self::Custom(c) => c.as_any().downcast_ref::<T>().cloned(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::entity::equality::values_equal(self, other, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Long(l) => write!(f, "{}", l),
            Self::Double(d) => write!(f, "{}", d),
            Self::String(s) => write!(f, "'{}'", s),
            Self::ObjectId(id) => write!(f, "ObjectId({})", id),
            Self::Uuid(id) => write!(f, "{}", id),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Enum(e) => write!(f, "{}", e.symbol()),
            Self::Entity(e) => match e.id() {
                Some(id) => write!(f, "{}({})", e.contract().name(), id),
                None => write!(f, "{}(unsaved)", e.contract().name()),
            },
            Self::Container(c) => {
                let items: Vec<String> = c.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Document(doc) => write!(f, "{}", doc),
            Self::Custom(c) => write!(f, "{:?}", c),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<Entity> for Value {
    fn from(e: Entity) -> Self {
        Value::Entity(e)
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Container(c)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
