mod common;

use common::{Node, Person, Status};
use docbind::{AccessError, Error, Session, Value, Violations};

fn detached_person(session: &Session) -> Person {
    session
        .instantiate::<Person>()
        .unwrap()
        .set_id(1)
        .unwrap()
        .set_name("Ann".to_string())
        .unwrap()
        .set_age(31)
        .unwrap()
}

#[test]
fn test_set_then_get() {
    let session = Session::detached();
    let person = detached_person(&session);

    assert_eq!(person.get_id().unwrap(), 1);
    assert_eq!(person.get_name().unwrap(), "Ann");
    assert_eq!(person.get_age().unwrap(), 31);

    person.set_nickname(Some("annie".to_string())).unwrap();
    person.set_status(Some(Status::Suspended)).unwrap();
    person.set_active(true).unwrap();
    assert_eq!(person.get_nickname().unwrap().as_deref(), Some("annie"));
    assert_eq!(person.get_status().unwrap(), Some(Status::Suspended));
    assert!(person.is_active().unwrap());

    person.set_nickname(None).unwrap();
    assert_eq!(person.get_nickname().unwrap(), None);
}

#[test]
fn test_unset_reads_zero_or_null() {
    let session = Session::detached();
    let person = session.instantiate::<Person>().unwrap();

    assert_eq!(person.get_age().unwrap(), 0);
    assert!(!person.is_active().unwrap());
    assert_eq!(person.get_nickname().unwrap(), None);
    assert!(person.get_tags().unwrap().is_empty());

    assert_eq!(person.get("age").unwrap(), Value::Int(0));
    assert_eq!(person.get("name").unwrap(), Value::Null);
    assert!(matches!(
        person.get_name(),
        Err(Error::Access(AccessError::Unset { .. }))
    ));
}

#[test]
fn test_untyped_access_by_either_name() {
    let session = Session::detached();
    let person = detached_person(&session);

    person.set("email", "ann@example.com").unwrap();
    assert_eq!(person.get("mail").unwrap(), Value::from("ann@example.com"));
    assert_eq!(person.get_email().unwrap().as_deref(), Some("ann@example.com"));

    // Int widens into the long identity
    person.set("id", 7).unwrap();
    assert_eq!(person.get("_id").unwrap(), Value::Long(7));

    assert!(matches!(
        person.get("salary"),
        Err(Error::Access(AccessError::UnknownProperty { .. }))
    ));
    assert!(matches!(
        person.set("age", "old"),
        Err(Error::Access(AccessError::Casting { .. }))
    ));
    assert!(matches!(
        person.set("age", Value::Null),
        Err(Error::Access(AccessError::Casting { .. }))
    ));
}

#[test]
fn test_add_appends_to_default_container() {
    let session = Session::detached();
    let person = detached_person(&session);

    person
        .add_tags("admin".to_string())
        .unwrap()
        .add_tags("ops".to_string())
        .unwrap();
    assert_eq!(person.get_tags().unwrap(), vec!["admin", "ops"]);

    match person.get("tags").unwrap() {
        Value::Container(tags) => {
            assert_eq!(tags.implementation(), docbind::ContainerImpl::ArrayList)
        }
        other => panic!("expected a container, got {other:?}"),
    }

    assert!(matches!(
        person.add("name", "x"),
        Err(Error::Access(AccessError::NotAContainer { .. }))
    ));
}

#[test]
fn test_computed_property() {
    let session = Session::detached();
    let person = detached_person(&session);

    assert_eq!(person.get_label().unwrap(), "Ann (31)");
    person.set_age(32).unwrap();
    assert_eq!(person.get_label().unwrap(), "Ann (32)");

    assert!(matches!(
        person.set("label", "x"),
        Err(Error::Access(AccessError::Computed { .. }))
    ));
}

#[test]
fn test_seal_is_monotonic() {
    let session = Session::detached();
    let person = detached_person(&session);

    person.seal();
    assert!(person.is_sealed());
    assert!(matches!(
        person.set_name("Bea".to_string()),
        Err(Error::Access(AccessError::Sealed { .. }))
    ));
    assert!(matches!(
        person.add_tags("x".to_string()),
        Err(Error::Access(AccessError::Sealed { .. }))
    ));

    person.seal();
    assert!(person.is_sealed());
    assert_eq!(person.get_name().unwrap(), "Ann");
}

#[test]
fn test_constraint_violations_are_all_reported() {
    let session = Session::detached();
    let person = detached_person(&session);

    let violations = match person.set_name("x".to_string()) {
        Err(Error::Access(AccessError::ConstraintViolation(Violations(violations)))) => violations,
        other => panic!("expected a constraint violation, got {other:?}"),
    };
    let rules: Vec<&str> = violations.iter().map(|v| v.rule.as_str()).collect();
    assert_eq!(rules, vec!["length", "pattern"]);
    assert!(violations.iter().all(|v| v.property == "name"));

    assert_eq!(person.get_name().unwrap(), "Ann");

    assert!(matches!(
        person.set_age(200),
        Err(Error::Access(AccessError::ConstraintViolation(_)))
    ));
    assert!(matches!(
        person.set_email(Some("nobody".to_string())),
        Err(Error::Access(AccessError::ConstraintViolation(_)))
    ));
    person.set_email(None).unwrap();
}

#[test]
fn test_immutable_until_persisted() {
    let session = Session::detached();
    let person = detached_person(&session);

    person.set_ssn(Some("123".to_string())).unwrap();
    person.set_ssn(Some("456".to_string())).unwrap();
    person.set_id(2).unwrap();

    // Rendering leaves the instance untouched, encoding marks it persisted
    person.render().unwrap();
    assert!(!person.is_persisted());
    session.encode(&person).unwrap();
    assert!(person.is_persisted());

    assert!(matches!(
        person.set_ssn(Some("789".to_string())),
        Err(Error::Access(AccessError::Immutable { .. }))
    ));
    assert!(matches!(
        person.set_id(3),
        Err(Error::Access(AccessError::Immutable { .. }))
    ));
    person.set_name("Bea".to_string()).unwrap();
}

#[test]
fn test_equality_and_hash() {
    let session = Session::detached();
    let first = detached_person(&session);
    let second = detached_person(&session);
    first.add_tags("a".to_string()).unwrap();
    second.add_tags("a".to_string()).unwrap();

    assert!(first.equals(&second));
    assert_eq!(first, second);
    assert_eq!(first.hash_code(), second.hash_code());

    second.set_age(40).unwrap();
    assert_ne!(first, second);

    let other_id = detached_person(&session).set_id(99).unwrap();
    assert!(!first.equals(&other_id));

    // The whole data map takes part, transient values included
    second.set_age(31).unwrap();
    second.set_scratch(Some("draft".to_string())).unwrap();
    assert!(!first.equals(&second));
}

#[test]
fn test_cyclic_equality_terminates() {
    let session = Session::detached();
    let build = || {
        let a = session.instantiate::<Node>().unwrap().set_label("a".to_string()).unwrap();
        let b = session.instantiate::<Node>().unwrap().set_label("b".to_string()).unwrap();
        a.set_next(Some(b.clone())).unwrap();
        b.set_next(Some(a.clone())).unwrap();
        a
    };

    let left = build();
    let right = build();
    assert!(left.equals(&right));
    assert_eq!(left.hash_code(), right.hash_code());
    assert!(format!("{:?}", left).contains("Node"));
}

#[test]
fn test_invoke_by_name() {
    let session = Session::detached();
    let person = detached_person(&session);

    let chained = person.invoke("set_name", vec![Value::from("Cy")]).unwrap();
    assert!(matches!(chained, Value::Entity(ref e) if e.ptr_eq(&person)));
    assert_eq!(person.invoke("get_name", vec![]).unwrap(), Value::from("Cy"));
    assert_eq!(
        person.invoke("get", vec![Value::from("age")]).unwrap(),
        Value::Int(31)
    );

    assert!(matches!(
        person.invoke("get_name", vec![Value::Int(1)]),
        Err(Error::Access(AccessError::Arity { .. }))
    ));
    assert!(matches!(
        person.invoke("fly", vec![]),
        Err(Error::Access(AccessError::UnknownAccessor { .. }))
    ));
}
