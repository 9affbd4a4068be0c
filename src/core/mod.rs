pub mod container;
pub mod error;
pub mod naming;
pub mod types;
pub mod value;

pub use container::{Container, ContainerImpl, ContainerKind, ContainerRegistry};
pub use error::{
    AccessError, CodecError, Error, Result, SchemaError, StoreError, StoreResult, Violation,
    Violations,
};
pub use naming::{ID_FIELD, Lifecycle, RESERVED_PREFIX};
pub use types::{ContractRef, EntityEnum, EnumType, EnumValue, Primitive, ValueType};
pub use value::{CustomScalar, Value};
