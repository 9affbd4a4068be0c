use std::fmt;
use std::sync::Arc;

use crate::compute::Computer;
use crate::core::ValueType;
use crate::schema::constraint::Constraint;

/// A type whose instances are entities.
///
/// Usually generated by `#[docbind::entity]`; implementing it by hand with
/// [`Contract::builder`] is equivalent.
pub trait EntityContract: 'static {
    /// Type name; the default collection name is derived from it.
    const NAME: &'static str;

    fn contract() -> Contract;
}

/// The declared accessor set of an entity contract.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    pub(crate) collection: Option<String>,
    pub(crate) accessors: Vec<Accessor>,
}

impl Contract {
    pub fn builder() -> ContractBuilder {
        ContractBuilder::default()
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }
}

#[derive(Debug, Default)]
pub struct ContractBuilder {
    contract: Contract,
}

impl ContractBuilder {
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.contract.collection = Some(name.into());
        self
    }

    pub fn accessor(mut self, accessor: Accessor) -> Self {
        self.contract.accessors.push(accessor);
        self
    }

    pub fn build(self) -> Contract {
        self.contract
    }
}

/// What an accessor hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returns {
    Void,
    /// The owning entity, for chaining.
    SelfType,
    Value(ValueType),
}

/// One declared accessor: name, signature and metadata tags.
#[derive(Debug, Clone)]
pub struct Accessor {
    pub name: String,
    pub params: Vec<ValueType>,
    pub returns: Returns,
    pub tags: Tags,
}

impl Accessor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Returns::Void,
            tags: Tags::default(),
        }
    }

    pub fn getter(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name).returns(value_type)
    }

    pub fn setter(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name).param(value_type)
    }

    pub fn adder(name: impl Into<String>, element_type: ValueType) -> Self {
        Self::new(name).param(element_type)
    }

    pub fn param(mut self, value_type: ValueType) -> Self {
        self.params.push(value_type);
        self
    }

    pub fn returns(mut self, value_type: ValueType) -> Self {
        self.returns = Returns::Value(value_type);
        self
    }

    pub fn returns_self(mut self) -> Self {
        self.returns = Returns::SelfType;
        self
    }

    // Tags

    pub fn named(mut self, external_name: impl Into<String>) -> Self {
        self.tags.name = Some(external_name.into());
        self
    }

    pub fn identity(mut self) -> Self {
        self.tags.identity = true;
        self
    }

    pub fn transient(mut self) -> Self {
        self.tags.transient = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.tags.immutable = true;
        self
    }

    pub fn computed<C: Computer + 'static>(mut self, computer: C) -> Self {
        self.tags.computed = Some(ComputedTag(Arc::new(computer)));
        self
    }

    pub fn reference(mut self, tag: ReferenceTag) -> Self {
        self.tags.reference = Some(tag);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.tags.constraints.push(constraint);
        self
    }

    pub fn index(mut self, tag: IndexTag) -> Self {
        self.tags.index = Some(tag);
        self
    }
}

/// Declarative metadata attached to an accessor.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    pub name: Option<String>,
    pub identity: bool,
    pub transient: bool,
    pub immutable: bool,
    pub computed: Option<ComputedTag>,
    pub reference: Option<ReferenceTag>,
    pub constraints: Vec<Constraint>,
    pub index: Option<IndexTag>,
}

#[derive(Clone)]
pub struct ComputedTag(pub Arc<dyn Computer>);

impl fmt::Debug for ComputedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputedTag(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceTiming {
    /// Resolved on first access.
    #[default]
    Lazy,
    /// Resolved while the owner is decoded.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    /// Only the referenced identity is stored.
    #[default]
    Simple,
    /// `{ "$ref": collection, "$id": id }` is stored.
    Structured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferenceTag {
    pub timing: ReferenceTiming,
    pub mode: ReferenceMode,
}

impl ReferenceTag {
    pub fn new(timing: ReferenceTiming, mode: ReferenceMode) -> Self {
        Self { timing, mode }
    }

    pub fn is_lazy(&self) -> bool {
        self.timing == ReferenceTiming::Lazy
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexTag {
    pub unique: bool,
    pub descending: bool,
    pub name: Option<String>,
}

impl IndexTag {
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }
}
