use std::fmt;
use thiserror::Error;

/// Failures raised while deriving an entity schema from its contract.
///
/// These are fatal for the contract type: every later attempt to use it
/// fails the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("method '{accessor}' does not conform to entity convention")]
    NonConforming { accessor: String },

    #[error("there is already a property with this name: '{name}'")]
    DuplicateName { name: String },

    #[error("setter '{accessor}' must take exactly one parameter")]
    SetterArity { accessor: String },

    #[error("setter '{accessor}' must return nothing or the entity itself")]
    SetterReturn { accessor: String },

    #[error("setter '{accessor}' has no matching getter")]
    SetterWithoutGetter { accessor: String },

    #[error("setter '{accessor}' is not allowed on computed property '{property}'")]
    SetterOnComputed { accessor: String, property: String },

    #[error("adder '{accessor}' must take exactly one parameter")]
    AdderArity { accessor: String },

    #[error("adder '{accessor}' must return nothing or the entity itself")]
    AdderReturn { accessor: String },

    #[error("adder '{accessor}' has no matching getter")]
    AdderWithoutGetter { accessor: String },

    #[error("adder '{accessor}' targets '{property}', which is not a container")]
    AdderOnNonContainer { accessor: String, property: String },

    #[error("adder '{accessor}' takes {found} but '{property}' holds {expected}")]
    AdderElementMismatch {
        accessor: String,
        property: String,
        expected: String,
        found: String,
    },

    #[error("property '{property}' of type {value_type} cannot be immutable")]
    InvalidImmutableType { property: String, value_type: String },

    #[error("reference '{property}' must point at an entity contract, found {value_type}")]
    InvalidReferenceTarget { property: String, value_type: String },

    #[error("property name '{name}' starts with the reserved prefix '{prefix}'")]
    ReservedPrefix { name: String, prefix: char },

    #[error("invalid constraint on '{property}': {reason}")]
    InvalidConstraint { property: String, reason: String },
}

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub property: String,
    pub rule: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.property, self.rule, self.message)
    }
}

/// Wrapper so a violation list renders as one diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&rendered)
    }
}

/// Failures raised by operations on a live entity instance.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("unknown property '{property}' on {entity}")]
    UnknownProperty { entity: String, property: String },

    #[error("unknown accessor '{accessor}' on {entity}")]
    UnknownAccessor { entity: String, accessor: String },

    #[error("{entity} is sealed: cannot modify '{property}'")]
    Sealed { entity: String, property: String },

    #[error("property '{property}' of {entity} is immutable once persisted")]
    Immutable { entity: String, property: String },

    #[error("property '{property}' is computed and cannot be modified")]
    Computed { property: String },

    #[error("cannot cast {found} to {expected} for '{property}'")]
    Casting {
        property: String,
        expected: String,
        found: String,
    },

    #[error("property '{property}' is not set")]
    Unset { property: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(Violations),

    #[error("{entity} has no store binding: cannot {operation}")]
    NoStoreBinding { entity: String, operation: String },

    #[error("{entity} requires an explicit identity before it can be saved")]
    MissingIdentity { entity: String },

    #[error("property '{property}' is not a container")]
    NotAContainer { property: String },

    #[error("no default implementation registered for container kind {kind}")]
    NoContainerDefault { kind: String },

    #[error("{implementation} is not a valid default for container kind {kind}")]
    InvalidContainerDefault { kind: String, implementation: String },

    #[error("cannot order {left} against {right} inside a sorted container")]
    Unordered { left: String, right: String },

    #[error("accessor '{accessor}' expects {expected} argument(s), got {found}")]
    Arity {
        accessor: String,
        expected: usize,
        found: usize,
    },
}

/// Failures raised while translating between entities and documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown symbol '{symbol}' for enum {enum_name}")]
    UnknownEnumSymbol { enum_name: String, symbol: String },

    #[error("no codec registered for scalar type {type_name}")]
    NoCodec { type_name: String },

    #[error("malformed reference in '{property}': {reason}")]
    MalformedReference { property: String, reason: String },

    #[error("invalid document text: {0}")]
    InvalidText(String),

    #[error("expected a document, found {0}")]
    NotADocument(String),
}

/// Failures reported by a document store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate key {key} for unique index '{index}' in '{collection}'")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid entity contract '{contract}': {source}")]
    Schema {
        contract: String,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid session configuration: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl Error {
    pub(crate) fn schema(contract: &str, source: SchemaError) -> Self {
        Self::Schema {
            contract: contract.to_string(),
            source,
        }
    }

    pub(crate) fn casting(property: &str, expected: impl ToString, found: impl ToString) -> Self {
        Self::Access(AccessError::Casting {
            property: property.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
