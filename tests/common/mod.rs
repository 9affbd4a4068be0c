#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use docbind::{
    Bson, CustomScalar, Error, FieldValue, MemoryStore, Result, ScalarCodec, Session, Value,
    ValueType, entity, EntityEnum,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EntityEnum)]
pub enum Status {
    Active,
    Suspended,
    Closed,
}

#[entity(collection = "people")]
pub trait Person {
    #[entity(id)]
    fn get_id(&self) -> i64;
    fn set_id(&self, id: i64) -> Self;

    #[validate(length(min = 2, max = 40))]
    #[validate(pattern = "[A-Z].*")]
    fn get_name(&self) -> String;
    fn set_name(&self, name: String) -> Self;

    #[validate(min = 0, max = 150)]
    fn get_age(&self) -> i32;
    fn set_age(&self, age: i32) -> Self;

    fn get_nickname(&self) -> Option<String>;
    fn set_nickname(&self, nickname: Option<String>);

    fn get_status(&self) -> Option<Status>;
    fn set_status(&self, status: Option<Status>);

    fn get_tags(&self) -> Vec<String>;
    fn add_tags(&self, tag: String) -> Self;

    fn is_active(&self) -> bool;
    fn set_active(&self, active: bool);

    #[entity(immutable)]
    fn get_ssn(&self) -> Option<String>;
    fn set_ssn(&self, ssn: Option<String>);

    #[entity(transient)]
    fn get_scratch(&self) -> Option<String>;
    fn set_scratch(&self, scratch: Option<String>);

    #[entity(computed = |p: &Person| Ok(format!("{} ({})", p.get_name()?, p.get_age()?)))]
    fn get_label(&self) -> String;

    #[entity(name = "mail")]
    #[index(unique)]
    #[validate(pattern = "[^@]+@[^@]+")]
    fn get_email(&self) -> Option<String>;
    fn set_email(&self, email: Option<String>);
}

#[entity(collection = "departments")]
pub trait Department {
    fn get_title(&self) -> String;
    fn set_title(&self, title: String) -> Self;

    #[reference(immediate, structured)]
    fn get_head(&self) -> Option<Person>;
    fn set_head(&self, head: Option<Person>) -> Self;

    #[reference]
    fn get_members(&self) -> Vec<Person>;
    fn add_members(&self, member: Person) -> Self;

    fn save(&self) -> bool;
    fn delete(&self) -> bool;
}

/// Embeds another node by value.
#[entity]
pub trait Node {
    fn get_label(&self) -> String;
    fn set_label(&self, label: String) -> Self;

    fn get_next(&self) -> Option<Node>;
    fn set_next(&self, next: Option<Node>) -> Self;
}

#[entity]
pub trait Author {
    fn get_name(&self) -> String;
    fn set_name(&self, name: String) -> Self;

    #[reference]
    fn get_partner(&self) -> Option<Author>;
    fn set_partner(&self, partner: Option<Author>) -> Self;
}

#[entity(collection = "accounts")]
pub trait Account {
    #[validate(not_null)]
    fn get_owner(&self) -> Option<String>;
    fn set_owner(&self, owner: Option<String>) -> Self;

    #[validate(not_null, message = "plan is required")]
    fn get_plan(&self) -> Option<String>;
    fn set_plan(&self, plan: Option<String>) -> Self;
}

#[entity]
pub trait Holder {
    fn getString(&self) -> String;
    fn setString(&self, string: String) -> Self;
}

#[entity]
pub trait Scoreboard {
    fn get_scores(&self) -> BTreeSet<i32>;
    fn add_scores(&self, score: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cents(pub i64);

impl FieldValue for Cents {
    fn value_type() -> ValueType {
        ValueType::Custom(std::any::type_name::<Cents>())
    }

    fn into_value(self) -> Value {
        Value::custom(self)
    }

    fn from_value(value: Value) -> std::result::Result<Self, Value> {
        value.downcast_custom::<Cents>().ok_or(value)
    }
}

pub struct CentsCodec;

impl ScalarCodec for CentsCodec {
    fn encode(&self, value: &dyn CustomScalar) -> Result<Bson> {
        match value.as_any().downcast_ref::<Cents>() {
            Some(cents) => Ok(Bson::Int64(cents.0)),
            None => Err(Error::Config(format!("not cents: {:?}", value))),
        }
    }

    fn decode(&self, bson: &Bson) -> Result<Value> {
        match bson {
            Bson::Int64(cents) => Ok(Value::custom(Cents(*cents))),
            Bson::Int32(cents) => Ok(Value::custom(Cents(i64::from(*cents)))),
            other => Err(Error::Config(format!("not cents: {}", other))),
        }
    }
}

#[entity(collection = "invoices")]
pub trait Invoice {
    fn get_number(&self) -> String;
    fn set_number(&self, number: String) -> Self;

    fn get_total(&self) -> Option<Cents>;
    fn set_total(&self, total: Option<Cents>) -> Self;
}

pub fn store_session() -> (Arc<MemoryStore>, Session) {
    let store = Arc::new(MemoryStore::new());
    let session = Session::new(store.clone());
    (store, session)
}

pub fn person(session: &Session, id: i64, name: &str, age: i32) -> Person {
    session
        .create::<Person>()
        .unwrap()
        .set_id(id)
        .unwrap()
        .set_name(name.to_string())
        .unwrap()
        .set_age(age)
        .unwrap()
}
