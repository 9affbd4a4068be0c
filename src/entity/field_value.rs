//! Bridges between Rust types and [`Value`].
//!
//! Accessor signatures declared through the `entity` macro are mapped to
//! [`ValueType`]s with [`FieldValue::value_type`], and typed wrappers move
//! values in and out of entities with the other two methods.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::hash::Hash;

use bson::oid::ObjectId;
use bson::Document;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{Container, ContainerImpl, ContainerKind, Primitive, Value, ValueType};
use crate::entity::Entity;
use crate::schema::EntityContract;

pub trait FieldValue: Sized {
    fn value_type() -> ValueType;

    fn into_value(self) -> Value;

    /// Hands the value back when it does not convert.
    fn from_value(value: Value) -> Result<Self, Value>;
}

/// Typed wrapper generated for an entity contract.
pub trait TypedEntity: EntityContract + Sized {
    fn from_entity(entity: Entity) -> Self;

    fn entity(&self) -> &Entity;

    fn into_entity(self) -> Entity;
}

macro_rules! scalar_field {
    ($ty:ty, $value_type:expr, $variant:ident) => {
        impl FieldValue for $ty {
            fn value_type() -> ValueType {
                $value_type
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

scalar_field!(bool, ValueType::Primitive(Primitive::Bool), Bool);
scalar_field!(i32, ValueType::Primitive(Primitive::Int), Int);
scalar_field!(String, ValueType::String, String);
scalar_field!(ObjectId, ValueType::ObjectId, ObjectId);
scalar_field!(Uuid, ValueType::Uuid, Uuid);
scalar_field!(DateTime<Utc>, ValueType::Timestamp, Timestamp);
scalar_field!(Document, ValueType::Document, Document);

impl FieldValue for i64 {
    fn value_type() -> ValueType {
        ValueType::Primitive(Primitive::Long)
    }

    fn into_value(self) -> Value {
        Value::Long(self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Long(l) => Ok(l),
            Value::Int(i) => Ok(i64::from(i)),
            other => Err(other),
        }
    }
}

impl FieldValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Primitive(Primitive::Double)
    }

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Double(d) => Ok(d),
            other => other.as_f64().ok_or(other),
        }
    }
}

/// Nullable: `Option<i32>` maps to a boxed int.
impl<T: FieldValue> FieldValue for Option<T> {
    fn value_type() -> ValueType {
        match T::value_type() {
            ValueType::Primitive(primitive) => ValueType::Boxed(primitive),
            other => other,
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, FieldValue::into_value)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Unset containers read as empty ones.
fn items_of<T: FieldValue>(value: Value) -> Result<Vec<T>, Value> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Container(container) => container
            .into_items()
            .into_iter()
            .map(T::from_value)
            .collect(),
        other => Err(other),
    }
}

fn container_of<T: FieldValue>(
    implementation: ContainerImpl,
    items: impl IntoIterator<Item = T>,
) -> Value {
    let items = items.into_iter().map(FieldValue::into_value).collect();
    Value::Container(Container::from_raw(implementation, items))
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::container(ContainerKind::List, T::value_type())
    }

    fn into_value(self) -> Value {
        container_of(ContainerImpl::ArrayList, self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        items_of(value)
    }
}

impl<T: FieldValue> FieldValue for VecDeque<T> {
    fn value_type() -> ValueType {
        ValueType::container(ContainerKind::Queue, T::value_type())
    }

    fn into_value(self) -> Value {
        container_of(ContainerImpl::ArrayDeque, self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        items_of(value).map(VecDeque::from)
    }
}

impl<T: FieldValue + Eq + Hash> FieldValue for HashSet<T> {
    fn value_type() -> ValueType {
        ValueType::container(ContainerKind::Set, T::value_type())
    }

    fn into_value(self) -> Value {
        container_of(ContainerImpl::HashSet, self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        items_of(value).map(|items| items.into_iter().collect())
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn value_type() -> ValueType {
        ValueType::container(ContainerKind::SortedSet, T::value_type())
    }

    fn into_value(self) -> Value {
        container_of(ContainerImpl::TreeSet, self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        items_of(value).map(|items| items.into_iter().collect())
    }
}
