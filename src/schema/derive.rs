use std::collections::{HashMap, HashSet};

use log::debug;

use crate::core::naming::{self, AccessorKind, ID_FIELD, RESERVED_PREFIX};
use crate::core::{ContractRef, Error, Result, SchemaError, ValueType};
use crate::schema::constraint::CompiledConstraint;
use crate::schema::contract::{Accessor, Contract, Returns};
use crate::schema::{AccessorBinding, EntitySchema, PropertyDescriptor};
use crate::store::{IndexKey, IndexOrder, IndexSpec};

type DeriveResult<T> = std::result::Result<T, SchemaError>;

enum Writer<'a> {
    Setter(&'a Accessor, String),
    Adder(&'a Accessor, String),
}

pub(crate) fn derive(contract: ContractRef) -> Result<EntitySchema> {
    derive_schema(contract).map_err(|source| Error::schema(contract.name(), source))
}

fn derive_schema(contract_ref: ContractRef) -> DeriveResult<EntitySchema> {
    build_schema(contract_ref, contract_ref.contract())
}

fn build_schema(contract_ref: ContractRef, contract: Contract) -> DeriveResult<EntitySchema> {
    let mut properties = Vec::new();
    let mut getters: Vec<Option<String>> = Vec::new();
    let mut external_names = HashSet::new();
    let mut internal_names = HashSet::new();
    let mut writers = Vec::new();
    let mut accessors = HashMap::new();
    let mut indexes = Vec::new();

    for accessor in &contract.accessors {
        match naming::classify(&accessor.name) {
            AccessorKind::Getter { property, boolean } => {
                let descriptor = describe_getter(accessor, property, boolean)?;
                if !external_names.insert(descriptor.external_name.clone()) {
                    return Err(SchemaError::DuplicateName {
                        name: descriptor.external_name,
                    });
                }
                if !internal_names.insert(descriptor.internal_name.clone()) {
                    return Err(SchemaError::DuplicateName {
                        name: descriptor.internal_name,
                    });
                }
                if let Some(tag) = &accessor.tags.index {
                    let order = if tag.descending {
                        IndexOrder::Descending
                    } else {
                        IndexOrder::Ascending
                    };
                    let mut spec = IndexSpec::new(vec![IndexKey::new(
                        descriptor.external_name.clone(),
                        order,
                    )]);
                    if tag.unique {
                        spec = spec.unique();
                    }
                    if let Some(name) = &tag.name {
                        spec = spec.named(name.clone());
                    }
                    indexes.push(spec);
                }
                getters.push(Some(accessor.name.clone()));
                properties.push(descriptor);
            }
            AccessorKind::Setter { property } => writers.push(Writer::Setter(accessor, property)),
            AccessorKind::Adder { property } => writers.push(Writer::Adder(accessor, property)),
            AccessorKind::Lifecycle(lifecycle) => {
                accessors.insert(accessor.name.clone(), AccessorBinding::Lifecycle(lifecycle));
            }
            AccessorKind::Unknown => {
                return Err(SchemaError::NonConforming {
                    accessor: accessor.name.clone(),
                });
            }
        }
    }

    let explicit_identity = properties.iter().any(|p| p.identity);
    if !explicit_identity {
        properties.insert(0, synthetic_identity());
        getters.insert(0, None);
    }

    let mut by_external = HashMap::new();
    let mut by_internal = HashMap::new();
    for (index, property) in properties.iter().enumerate() {
        by_external.insert(property.external_name.clone(), index);
        by_internal.insert(property.internal_name.clone(), index);
    }
    for (index, getter) in getters.into_iter().enumerate() {
        if let Some(name) = getter {
            accessors.insert(name, AccessorBinding::Get(index));
        }
    }

    // A synthesized identity has no declared getter to pair a writer with.
    let declared = |index: &usize| explicit_identity || *index != 0;

    for writer in writers {
        let (name, binding) = match writer {
            Writer::Setter(accessor, fragment) => {
                if accessor.params.len() != 1 {
                    return Err(SchemaError::SetterArity {
                        accessor: accessor.name.clone(),
                    });
                }
                let fluent = fluent_return(&accessor.returns, contract_ref).ok_or_else(|| {
                    SchemaError::SetterReturn {
                        accessor: accessor.name.clone(),
                    }
                })?;
                let index = by_internal
                    .get(&fragment)
                    .copied()
                    .filter(declared)
                    .filter(|index| properties[*index].value_type == accessor.params[0])
                    .ok_or_else(|| SchemaError::SetterWithoutGetter {
                        accessor: accessor.name.clone(),
                    })?;
                let property = &mut properties[index];
                if property.computed.is_some() {
                    return Err(SchemaError::SetterOnComputed {
                        accessor: accessor.name.clone(),
                        property: property.external_name.clone(),
                    });
                }
                property.setter_fluent = Some(fluent);
                (
                    accessor.name.clone(),
                    AccessorBinding::Set {
                        property: index,
                        fluent,
                    },
                )
            }
            Writer::Adder(accessor, fragment) => {
                if accessor.params.len() != 1 {
                    return Err(SchemaError::AdderArity {
                        accessor: accessor.name.clone(),
                    });
                }
                let fluent = fluent_return(&accessor.returns, contract_ref).ok_or_else(|| {
                    SchemaError::AdderReturn {
                        accessor: accessor.name.clone(),
                    }
                })?;
                let index = by_internal
                    .get(&fragment)
                    .copied()
                    .filter(declared)
                    .ok_or_else(|| SchemaError::AdderWithoutGetter {
                        accessor: accessor.name.clone(),
                    })?;
                let property = &mut properties[index];
                let Some(element) = property.value_type.element_type() else {
                    return Err(SchemaError::AdderOnNonContainer {
                        accessor: accessor.name.clone(),
                        property: property.external_name.clone(),
                    });
                };
                if *element != accessor.params[0] {
                    return Err(SchemaError::AdderElementMismatch {
                        accessor: accessor.name.clone(),
                        property: property.external_name.clone(),
                        expected: element.to_string(),
                        found: accessor.params[0].to_string(),
                    });
                }
                property.adder_fluent = Some(fluent);
                (
                    accessor.name.clone(),
                    AccessorBinding::Add {
                        property: index,
                        fluent,
                    },
                )
            }
        };
        accessors.insert(name, binding);
    }

    let identity = properties.iter().position(|p| p.identity).unwrap_or(0);
    let validated = properties
        .iter()
        .enumerate()
        .filter(|(_, p)| p.has_constraints())
        .map(|(index, _)| index)
        .collect();
    let collection = contract
        .collection
        .clone()
        .unwrap_or_else(|| naming::decapitalize(contract_ref.name()));

    debug!(
        "Derived schema for {} ({} properties, collection '{}')",
        contract_ref.name(),
        properties.len(),
        collection
    );

    Ok(EntitySchema {
        contract: contract_ref,
        collection,
        properties,
        by_external,
        by_internal,
        accessors,
        validated,
        identity,
        explicit_identity,
        indexes,
    })
}

fn describe_getter(
    accessor: &Accessor,
    internal_name: String,
    boolean: bool,
) -> DeriveResult<PropertyDescriptor> {
    let non_conforming = || SchemaError::NonConforming {
        accessor: accessor.name.clone(),
    };
    if !accessor.params.is_empty() {
        return Err(non_conforming());
    }
    let Returns::Value(value_type) = &accessor.returns else {
        return Err(non_conforming());
    };
    if boolean && !value_type.is_bool() {
        return Err(non_conforming());
    }

    let tags = &accessor.tags;
    let external_name = match &tags.name {
        Some(name) => name.clone(),
        None if tags.identity || naming::is_identity_name(&internal_name) => ID_FIELD.to_string(),
        None => internal_name.clone(),
    };
    if external_name.starts_with(RESERVED_PREFIX) && external_name != ID_FIELD {
        return Err(SchemaError::ReservedPrefix {
            name: external_name,
            prefix: RESERVED_PREFIX,
        });
    }
    let identity = external_name == ID_FIELD;

    if tags.reference.is_some() && value_type.entity_target().is_none() {
        return Err(SchemaError::InvalidReferenceTarget {
            property: external_name,
            value_type: value_type.to_string(),
        });
    }
    if tags.immutable && !value_type.supports_immutable() {
        return Err(SchemaError::InvalidImmutableType {
            property: external_name,
            value_type: value_type.to_string(),
        });
    }

    let constraints = tags
        .constraints
        .iter()
        .map(|constraint| CompiledConstraint::compile(&external_name, value_type, constraint))
        .collect::<DeriveResult<Vec<_>>>()?;

    Ok(PropertyDescriptor {
        external_name,
        internal_name,
        value_type: value_type.clone(),
        transient: tags.transient,
        computed: tags.computed.clone(),
        immutable: tags.immutable || identity,
        identity,
        reference: tags.reference,
        constraints,
        setter_fluent: None,
        adder_fluent: None,
    })
}

fn fluent_return(returns: &Returns, contract: ContractRef) -> Option<bool> {
    match returns {
        Returns::Void => Some(false),
        Returns::SelfType => Some(true),
        Returns::Value(ValueType::Entity(target)) if *target == contract => Some(true),
        Returns::Value(_) => None,
    }
}

fn synthetic_identity() -> PropertyDescriptor {
    PropertyDescriptor {
        external_name: ID_FIELD.to_string(),
        internal_name: "id".to_string(),
        value_type: ValueType::ObjectId,
        transient: false,
        computed: None,
        immutable: true,
        identity: true,
        reference: None,
        constraints: Vec::new(),
        setter_fluent: None,
        adder_fluent: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContainerKind, Primitive};
    use crate::schema::contract::{ContractBuilder, EntityContract, ReferenceTag};

    struct Person;

    impl EntityContract for Person {
        const NAME: &'static str = "Person";

        fn contract() -> Contract {
            Contract::builder()
                .accessor(Accessor::getter("getName", ValueType::String))
                .accessor(Accessor::setter("setName", ValueType::String).returns_self())
                .accessor(Accessor::getter("is_active", ValueType::Primitive(Primitive::Bool)))
                .accessor(Accessor::getter(
                    "get_tags",
                    ValueType::container(ContainerKind::List, ValueType::String),
                ))
                .accessor(Accessor::adder("add_tags", ValueType::String))
                .accessor(Accessor::new("save"))
                .build()
        }
    }

    struct Probe;

    impl EntityContract for Probe {
        const NAME: &'static str = "Probe";

        fn contract() -> Contract {
            Contract::default()
        }
    }

    fn derive_bad(accessors: Vec<Accessor>) -> SchemaError {
        let contract = accessors
            .into_iter()
            .fold(Contract::builder(), ContractBuilder::accessor)
            .build();
        build_schema(ContractRef::of::<Probe>(), contract).unwrap_err()
    }

    #[test]
    fn test_derives_properties_in_order() {
        let schema = derive_schema(ContractRef::of::<Person>()).unwrap();

        let names: Vec<_> = schema.properties().iter().map(|p| p.external_name()).collect();
        assert_eq!(names, vec!["_id", "name", "active", "tags"]);
        assert!(!schema.has_explicit_identity());
        assert_eq!(schema.collection(), "person");
        assert_eq!(schema.identity().value_type(), &ValueType::ObjectId);
        assert_eq!(schema.property("name").unwrap().setter_fluent(), Some(true));
        assert_eq!(schema.property("tags").unwrap().adder_fluent(), Some(false));
        assert_eq!(schema.accessor("getName"), Some(AccessorBinding::Get(1)));
        assert!(matches!(
            schema.accessor("save"),
            Some(AccessorBinding::Lifecycle(naming::Lifecycle::Save))
        ));
    }

    #[test]
    fn test_rejects_non_conforming_accessor() {
        let err = derive_bad(vec![Accessor::getter("compute", ValueType::String)]);
        assert!(matches!(err, SchemaError::NonConforming { .. }));

        let err = derive_bad(vec![Accessor::getter("is_name", ValueType::String)]);
        assert!(matches!(err, SchemaError::NonConforming { .. }));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = derive_bad(vec![
            Accessor::getter("get_name", ValueType::String),
            Accessor::getter("getName", ValueType::String),
        ]);
        assert_eq!(
            err,
            SchemaError::DuplicateName {
                name: "name".to_string()
            }
        );

        let err = derive_bad(vec![
            Accessor::getter("get_first", ValueType::String).named("label"),
            Accessor::getter("get_second", ValueType::String).named("label"),
        ]);
        assert!(matches!(err, SchemaError::DuplicateName { .. }));
    }

    #[test]
    fn test_identity_naming() {
        let err = derive_bad(vec![
            Accessor::getter("get_secret", ValueType::String).named("_secret"),
        ]);
        assert!(matches!(err, SchemaError::ReservedPrefix { .. }));

        let err = derive_bad(vec![
            Accessor::getter("getId", ValueType::Primitive(Primitive::Long)),
            Accessor::getter("get_key", ValueType::String).identity(),
        ]);
        assert_eq!(
            err,
            SchemaError::DuplicateName {
                name: ID_FIELD.to_string()
            }
        );
    }

    #[test]
    fn test_setter_rules() {
        let err = derive_bad(vec![Accessor::setter("set_name", ValueType::String)]);
        assert!(matches!(err, SchemaError::SetterWithoutGetter { .. }));

        let err = derive_bad(vec![
            Accessor::getter("get_name", ValueType::String),
            Accessor::setter("set_name", ValueType::Primitive(Primitive::Int)),
        ]);
        assert!(matches!(err, SchemaError::SetterWithoutGetter { .. }));

        let err = derive_bad(vec![
            Accessor::getter("get_name", ValueType::String),
            Accessor::new("set_name"),
        ]);
        assert!(matches!(err, SchemaError::SetterArity { .. }));

        let err = derive_bad(vec![
            Accessor::getter("get_name", ValueType::String),
            Accessor::setter("set_name", ValueType::String).returns(ValueType::String),
        ]);
        assert!(matches!(err, SchemaError::SetterReturn { .. }));

        let err = derive_bad(vec![
            Accessor::getter("get_name", ValueType::String)
                .computed(|_: &crate::entity::Entity| {
                    Ok::<_, Error>(crate::core::Value::Null)
                }),
            Accessor::setter("set_name", ValueType::String),
        ]);
        assert!(matches!(err, SchemaError::SetterOnComputed { .. }));
    }

    #[test]
    fn test_adder_rules() {
        let err = derive_bad(vec![
            Accessor::getter("get_name", ValueType::String),
            Accessor::adder("add_name", ValueType::String),
        ]);
        assert!(matches!(err, SchemaError::AdderOnNonContainer { .. }));

        let err = derive_bad(vec![
            Accessor::getter(
                "get_scores",
                ValueType::container(ContainerKind::List, ValueType::Primitive(Primitive::Int)),
            ),
            Accessor::adder("add_scores", ValueType::String),
        ]);
        assert!(matches!(err, SchemaError::AdderElementMismatch { .. }));

        let err = derive_bad(vec![Accessor::adder("add_scores", ValueType::String)]);
        assert!(matches!(err, SchemaError::AdderWithoutGetter { .. }));
    }

    #[test]
    fn test_tag_validation() {
        let err = derive_bad(vec![
            Accessor::getter("get_name", ValueType::String).reference(ReferenceTag::default()),
        ]);
        assert!(matches!(err, SchemaError::InvalidReferenceTarget { .. }));

        let err = derive_bad(vec![
            Accessor::getter("get_payload", ValueType::Document).immutable(),
        ]);
        assert!(matches!(err, SchemaError::InvalidImmutableType { .. }));
    }
}
