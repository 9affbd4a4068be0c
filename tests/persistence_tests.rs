mod common;

use std::sync::Arc;

use common::{Account, Person, person, store_session};
use docbind::{
    AccessError, Error, MemoryStore, Session, SessionConfig, StoreError, Violations, doc,
};

#[test]
fn test_double_save_writes_once() {
    let (store, session) = store_session();
    let ann = person(&session, 1, "Ann", 31);

    assert!(ann.save().unwrap());
    assert!(!ann.save().unwrap());

    let people = store.memory_collection("people").unwrap();
    assert_eq!(people.write_count(), 1);
    assert_eq!(
        people.documents().unwrap(),
        vec![doc! { "_id": 1_i64, "name": "Ann", "age": 31 }]
    );

    ann.set_age(32).unwrap();
    assert!(ann.save().unwrap());
    assert_eq!(people.write_count(), 2);
    assert_eq!(people.document_count().unwrap(), 1);
}

#[test]
fn test_save_without_dirty_tracking_always_writes() {
    let store = Arc::new(MemoryStore::new());
    let session = Session::builder()
        .store(store.clone())
        .config(SessionConfig::new().dirty_tracking(false))
        .build();
    let ann = person(&session, 1, "Ann", 31);

    assert!(ann.save().unwrap());
    assert!(ann.save().unwrap());
    assert_eq!(store.memory_collection("people").unwrap().write_count(), 2);
}

#[test]
fn test_transient_and_computed_are_not_stored() {
    let (store, session) = store_session();
    let ann = person(&session, 1, "Ann", 31);
    ann.set_scratch(Some("draft".to_string())).unwrap();
    ann.save().unwrap();

    let stored = store.memory_collection("people").unwrap().documents().unwrap();
    assert!(!stored[0].contains_key("scratch"));
    assert!(!stored[0].contains_key("label"));
}

#[test]
fn test_load_round_trip() {
    let (store, session) = store_session();
    let ann = person(&session, 7, "Ann", 31);
    ann.add_tags("admin".to_string()).unwrap();
    ann.set_status(Some(common::Status::Active)).unwrap();
    ann.save().unwrap();

    let loaded = session.load::<Person>(7_i64).unwrap().unwrap();
    assert!(loaded.is_persisted());
    assert_eq!(loaded, ann);
    assert_eq!(loaded.get_tags().unwrap(), vec!["admin"]);
    assert_eq!(loaded.get_status().unwrap(), Some(common::Status::Active));

    // A freshly loaded instance is clean
    assert!(!loaded.save().unwrap());
    assert_eq!(store.memory_collection("people").unwrap().write_count(), 1);

    assert!(session.load::<Person>(8_i64).unwrap().is_none());
    let again = ann.load(7_i64).unwrap().unwrap();
    assert!(again.equals(&ann));
}

#[test]
fn test_delete() {
    let (store, session) = store_session();
    let ann = person(&session, 1, "Ann", 31);

    assert!(!ann.delete().unwrap());
    ann.save().unwrap();
    assert!(ann.delete().unwrap());
    assert!(!ann.delete().unwrap());
    assert!(session.load::<Person>(1_i64).unwrap().is_none());

    // Saving again after a delete writes the record back
    assert!(ann.save().unwrap());
    assert_eq!(store.memory_collection("people").unwrap().document_count().unwrap(), 1);
}

#[test]
fn test_identity_is_required_or_generated() {
    let (store, session) = store_session();

    let anonymous = session.create::<Person>().unwrap();
    assert!(matches!(
        anonymous.save(),
        Err(Error::Access(AccessError::MissingIdentity { .. }))
    ));

    let account = session
        .create::<Account>()
        .unwrap()
        .set_owner(Some("ann".to_string()))
        .unwrap()
        .set_plan(Some("basic".to_string()))
        .unwrap();
    assert!(account.id().is_none());
    assert!(account.save().unwrap());
    let id = account.id().unwrap();
    assert!(matches!(id, docbind::Value::ObjectId(_)));

    let stored = store.memory_collection("accounts").unwrap().documents().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].get_object_id("_id").is_ok());
}

#[test]
fn test_save_validates_every_property() {
    let (store, session) = store_session();
    let account = session.create::<Account>().unwrap();

    let violations = match account.save() {
        Err(Error::Access(AccessError::ConstraintViolation(Violations(violations)))) => violations,
        other => panic!("expected a constraint violation, got {other:?}"),
    };
    let summary: Vec<(&str, &str)> = violations
        .iter()
        .map(|v| (v.property.as_str(), v.message.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![("owner", "must not be null"), ("plan", "plan is required")]
    );
    assert_eq!(store.memory_collection("accounts").unwrap().write_count(), 0);
    assert!(!account.is_persisted());

    let lenient = Session::builder()
        .store(store.clone())
        .config(SessionConfig::new().validate_on_save(false))
        .build();
    assert!(lenient.create::<Account>().unwrap().save().unwrap());
}

#[test]
fn test_unique_index_rejects_duplicates() {
    let (store, session) = store_session();
    assert_eq!(session.ensure_indexes::<Person>().unwrap(), vec!["mail_1"]);
    assert_eq!(store.memory_collection("people").unwrap().indexes().unwrap().len(), 1);

    let ann = person(&session, 1, "Ann", 31);
    ann.set_email(Some("shared@example.com".to_string())).unwrap();
    ann.save().unwrap();

    let bea = person(&session, 2, "Bea", 28);
    bea.set_email(Some("shared@example.com".to_string())).unwrap();
    assert!(matches!(
        bea.save(),
        Err(Error::Store(StoreError::DuplicateKey { .. }))
    ));
    assert!(!bea.is_persisted());

    bea.set_email(Some("bea@example.com".to_string())).unwrap();
    assert!(bea.save().unwrap());
}

#[test]
fn test_lazy_instance_loads_on_first_access() {
    let (_store, session) = store_session();
    person(&session, 7, "Ann", 31).save().unwrap();

    let lazy = session.create_lazy::<Person>(7_i64).unwrap();
    assert!(lazy.is_lazy());
    assert_eq!(lazy.get_id().unwrap(), 7);
    assert!(lazy.is_lazy());

    assert_eq!(lazy.get_name().unwrap(), "Ann");
    assert!(!lazy.is_lazy());
    assert_eq!(lazy.get_age().unwrap(), 31);
}

#[test]
fn test_lazy_instance_with_missing_record() {
    let (_store, session) = store_session();

    let lazy = session.create_lazy::<Person>(99_i64).unwrap();
    assert!(matches!(
        lazy.get_name(),
        Err(Error::Access(AccessError::Unset { .. }))
    ));
    assert!(!lazy.is_lazy());
    assert_eq!(lazy.get_id().unwrap(), 99);
}

#[test]
fn test_persistence_needs_a_store() {
    let detached = Session::detached();
    assert!(matches!(
        detached.create::<Person>(),
        Err(Error::Access(AccessError::NoStoreBinding { .. }))
    ));
    assert!(matches!(
        detached.load::<Person>(1_i64),
        Err(Error::Access(AccessError::NoStoreBinding { .. }))
    ));

    let loose = detached.instantiate::<Person>().unwrap().set_id(1).unwrap();
    assert!(matches!(
        loose.save(),
        Err(Error::Access(AccessError::NoStoreBinding { .. }))
    ));

    // Store-backed sessions still hand out unbound instances on request
    let (_store, session) = store_session();
    let unbound = session.instantiate::<Person>().unwrap().set_id(1).unwrap();
    assert!(!unbound.is_bound());
    assert!(matches!(
        unbound.delete(),
        Err(Error::Access(AccessError::NoStoreBinding { .. }))
    ));
}

#[test]
fn test_collection_prefix() {
    let store = Arc::new(MemoryStore::new());
    let session = Session::builder()
        .store(store.clone())
        .config(SessionConfig::new().collection_prefix("app_"))
        .build();

    person(&session, 1, "Ann", 31).save().unwrap();
    assert_eq!(store.collection_names().unwrap(), vec!["app_people"]);
}

#[test]
fn test_sealed_instance_can_still_be_saved() {
    let (_store, session) = store_session();
    let ann = person(&session, 1, "Ann", 31);
    ann.seal();

    assert!(ann.save().unwrap());
    assert!(ann.is_sealed());
}
