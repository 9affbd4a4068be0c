mod common;

use common::{Department, Holder, Person, Status};
use docbind::{
    Accessor, Contract, ContractRef, EntityContract, Error, IndexTag, Primitive, ReferenceMode,
    ReferenceTiming, SchemaError, Session, ValueType, entity, schema_of,
};

#[test]
fn test_person_schema_shape() {
    let schema = schema_of::<Person>().unwrap();

    assert_eq!(schema.name(), "Person");
    assert_eq!(schema.collection(), "people");
    assert!(schema.has_explicit_identity());
    assert_eq!(schema.identity().internal_name(), "id");
    assert_eq!(
        schema.identity().value_type(),
        &ValueType::Primitive(Primitive::Long)
    );

    let names: Vec<&str> = schema.properties().iter().map(|p| p.external_name()).collect();
    assert_eq!(
        names,
        vec![
            "_id", "name", "age", "nickname", "status", "tags", "active", "ssn", "scratch",
            "label", "mail"
        ]
    );

    let email = schema.by_internal("email").unwrap();
    assert_eq!(email.external_name(), "mail");
    assert!(schema.property("mail").is_some());
    assert!(schema.property("email").is_some());

    assert!(schema.property("scratch").unwrap().is_transient());
    assert!(schema.property("label").unwrap().is_computed());
    assert!(schema.property("ssn").unwrap().is_immutable());
    assert!(schema.identity().is_immutable());
    assert_eq!(schema.property("name").unwrap().setter_fluent(), Some(true));
    assert_eq!(schema.property("nickname").unwrap().setter_fluent(), Some(false));
    assert_eq!(schema.property("tags").unwrap().adder_fluent(), Some(true));
    assert_eq!(
        schema.property("status").unwrap().value_type(),
        &ValueType::Enum(<Status as docbind::EntityEnum>::enum_type())
    );
}

#[test]
fn test_synthetic_identity_and_default_collection() {
    let schema = schema_of::<Holder>().unwrap();

    assert_eq!(schema.collection(), "holder");
    assert!(!schema.has_explicit_identity());
    assert_eq!(schema.identity().external_name(), "_id");
    assert_eq!(schema.identity().value_type(), &ValueType::ObjectId);

    let names: Vec<&str> = schema.properties().iter().map(|p| p.external_name()).collect();
    assert_eq!(names, vec!["_id", "string"]);
}

#[test]
fn test_reference_tags_and_indexes() {
    let schema = schema_of::<Department>().unwrap();

    let head = schema.property("head").unwrap().reference().unwrap();
    assert_eq!(head.timing, ReferenceTiming::Immediate);
    assert_eq!(head.mode, ReferenceMode::Structured);

    let members = schema.property("members").unwrap().reference().unwrap();
    assert!(members.is_lazy());
    assert_eq!(members.mode, ReferenceMode::Simple);

    let people = schema_of::<Person>().unwrap();
    assert_eq!(people.indexes().len(), 1);
    assert_eq!(people.indexes()[0].name, "mail_1");
    assert!(people.indexes()[0].unique);
}

#[test]
fn test_schema_is_cached() {
    let first = schema_of::<Person>().unwrap();
    let second = Session::detached().schema::<Person>().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[entity]
pub trait Clash {
    fn get_name(&self) -> String;
    fn getName(&self) -> String;
}

#[test]
fn test_duplicate_property_name_is_fatal() {
    let session = Session::detached();
    for _ in 0..2 {
        let err = session.instantiate::<Clash>().unwrap_err();
        match err {
            Error::Schema { contract, source } => {
                assert_eq!(contract, "Clash");
                assert_eq!(
                    source,
                    SchemaError::DuplicateName {
                        name: "name".to_string()
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[entity]
pub trait Fetcher {
    fn fetch_all(&self) -> Vec<String>;
}

#[entity]
pub trait Orphan {
    fn set_label(&self, label: String);
}

#[entity]
pub trait Mismatch {
    fn get_scores(&self) -> Vec<i32>;
    fn add_scores(&self, score: String);
}

#[test]
fn test_non_conforming_contracts() {
    let session = Session::detached();

    assert!(matches!(
        session.instantiate::<Fetcher>(),
        Err(Error::Schema {
            source: SchemaError::NonConforming { .. },
            ..
        })
    ));
    assert!(matches!(
        session.instantiate::<Orphan>(),
        Err(Error::Schema {
            source: SchemaError::SetterWithoutGetter { .. },
            ..
        })
    ));
    assert!(matches!(
        session.instantiate::<Mismatch>(),
        Err(Error::Schema {
            source: SchemaError::AdderElementMismatch { .. },
            ..
        })
    ));
}

/// Hand-written contract, without the attribute macro.
struct Sensor;

impl EntityContract for Sensor {
    const NAME: &'static str = "Sensor";

    fn contract() -> Contract {
        Contract::builder()
            .collection("sensors")
            .accessor(Accessor::getter("getSerial", ValueType::String).identity())
            .accessor(
                Accessor::getter("getReading", ValueType::Primitive(Primitive::Double))
                    .index(IndexTag {
                        unique: false,
                        descending: true,
                        name: None,
                    }),
            )
            .accessor(Accessor::setter("setReading", ValueType::Primitive(Primitive::Double)))
            .build()
    }
}

#[test]
fn test_builder_contract() {
    let schema = docbind::schema_for(ContractRef::of::<Sensor>()).unwrap();

    assert_eq!(schema.collection(), "sensors");
    assert_eq!(schema.identity().external_name(), "_id");
    assert_eq!(schema.identity().internal_name(), "serial");
    assert_eq!(schema.indexes()[0].name, "reading_-1");

    let sensor = Session::detached()
        .instantiate_entity(ContractRef::of::<Sensor>())
        .unwrap();
    sensor.set("reading", 3).unwrap();
    assert_eq!(sensor.get("reading").unwrap(), docbind::Value::Double(3.0));
}

struct BadPattern;

impl EntityContract for BadPattern {
    const NAME: &'static str = "BadPattern";

    fn contract() -> Contract {
        Contract::builder()
            .accessor(
                Accessor::getter("get_code", ValueType::String)
                    .constraint(docbind::Constraint::pattern("([a-z")),
            )
            .build()
    }
}

#[test]
fn test_invalid_constraint_fails_derivation() {
    let err = docbind::schema_for(ContractRef::of::<BadPattern>()).unwrap_err();
    assert!(matches!(
        err,
        Error::Schema {
            source: SchemaError::InvalidConstraint { .. },
            ..
        }
    ));
}
