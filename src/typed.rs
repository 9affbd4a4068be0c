//! Support code for the `entity` and `EntityEnum` macros.

use crate::compute::Computer;
use crate::core::{AccessError, ContractRef, EntityEnum, EnumValue, Error, Result, Value, ValueType};
use crate::entity::{Entity, FieldValue, TypedEntity};

/// Converts an accessor result to its declared Rust type.
///
/// A null result for a non-optional type is reported as unset.
pub fn cast<T: FieldValue>(accessor: &str, value: Value) -> Result<T> {
    T::from_value(value).map_err(|rejected| match rejected {
        Value::Null => AccessError::Unset {
            property: accessor.to_string(),
        }
        .into(),
        other => Error::casting(accessor, T::value_type(), other.type_name()),
    })
}

/// Adapts a typed closure into a computed-property [`Computer`].
pub fn computed<E, T, F>(compute: F) -> impl Computer + 'static
where
    E: TypedEntity,
    T: FieldValue,
    F: Fn(&E) -> Result<T> + Send + Sync + 'static,
{
    move |entity: &Entity| compute(&E::from_entity(entity.clone())).map(FieldValue::into_value)
}

pub fn entity_value_type<E: TypedEntity>() -> ValueType {
    ValueType::Entity(ContractRef::of::<E>())
}

pub fn entity_from_value<E: TypedEntity>(value: Value) -> std::result::Result<E, Value> {
    match value {
        Value::Entity(entity) if entity.contract() == ContractRef::of::<E>() => {
            Ok(E::from_entity(entity))
        }
        other => Err(other),
    }
}

pub fn enum_value_type<E: EntityEnum>() -> ValueType {
    ValueType::Enum(E::enum_type())
}

pub fn enum_into_value<E: EntityEnum>(value: &E) -> Value {
    Value::Enum(EnumValue::of(value))
}

pub fn enum_from_value<E: EntityEnum>(value: Value) -> std::result::Result<E, Value> {
    match value {
        Value::Enum(found) if std::ptr::eq(found.enum_type(), E::enum_type()) => {
            E::from_symbol(found.symbol()).ok_or(Value::Enum(found))
        }
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_reports_unset_and_mismatch() {
        assert_eq!(cast::<i32>("get_age", Value::Int(4)).unwrap(), 4);
        assert_eq!(cast::<Option<i32>>("get_age", Value::Null).unwrap(), None);

        assert!(matches!(
            cast::<String>("get_name", Value::Null),
            Err(Error::Access(AccessError::Unset { .. }))
        ));
        assert!(matches!(
            cast::<String>("get_name", Value::Int(1)),
            Err(Error::Access(AccessError::Casting { .. }))
        ));
    }
}
