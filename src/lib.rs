// ============================================================================
// docbind: typed entity contracts mapped onto document stores
// ============================================================================

extern crate self as docbind;

pub mod codec;
pub mod compute;
pub mod core;
pub mod entity;
pub mod prelude;
pub mod schema;
pub mod session;
pub mod store;

#[doc(hidden)]
pub mod typed;

pub use bson;
pub use bson::{doc, oid::ObjectId, Bson, Document};

// Contract and enum macros
pub use docbind_derive::{entity, EntityEnum};

// Re-export main types for convenience
pub use codec::{CodecMode, CodecRegistry, ScalarCodec};
pub use compute::Computer;
pub use crate::core::{
    AccessError, CodecError, Container, ContainerImpl, ContainerKind, ContainerRegistry,
    ContractRef, CustomScalar, EntityEnum, EnumType, EnumValue, Error, Primitive, Result,
    SchemaError, StoreError, Value, ValueType, Violation, Violations,
};
pub use entity::{Entity, FieldValue, TypedEntity};
pub use schema::{
    schema_for, schema_of, Accessor, Constraint, Contract, EntityContract, EntitySchema,
    IndexTag, PropertyDescriptor, ReferenceMode, ReferenceTag, ReferenceTiming,
};
pub use session::{Session, SessionBuilder, SessionConfig};
pub use store::{DocumentCollection, DocumentStore, MemoryCollection, MemoryStore};
