//! Entity schemas derived from accessor contracts.
//!
//! A schema is derived once per contract type and cached for the life of
//! the process (see [`schema_of`]). It is immutable after derivation.

pub mod cache;
pub mod constraint;
pub mod contract;
mod derive;

use std::collections::HashMap;
use std::sync::Arc;

use crate::compute::Computer;
use crate::core::{ContractRef, Lifecycle, Value, ValueType, Violation};
use crate::store::IndexSpec;

pub use cache::{schema_for, schema_of};
pub use constraint::{CompiledConstraint, Constraint, Rule};
pub use contract::{
    Accessor, ComputedTag, Contract, ContractBuilder, EntityContract, IndexTag, ReferenceMode,
    ReferenceTag, ReferenceTiming, Returns, Tags,
};

/// One declared property of an entity.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub(crate) external_name: String,
    pub(crate) internal_name: String,
    pub(crate) value_type: ValueType,
    pub(crate) transient: bool,
    pub(crate) computed: Option<ComputedTag>,
    pub(crate) immutable: bool,
    pub(crate) identity: bool,
    pub(crate) reference: Option<ReferenceTag>,
    pub(crate) constraints: Vec<CompiledConstraint>,
    pub(crate) setter_fluent: Option<bool>,
    pub(crate) adder_fluent: Option<bool>,
}

impl PropertyDescriptor {
    /// Wire and storage name.
    pub fn external_name(&self) -> &str {
        &self.external_name
    }

    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn element_type(&self) -> Option<&ValueType> {
        self.value_type.element_type()
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    pub(crate) fn computer(&self) -> Option<&Arc<dyn Computer>> {
        self.computed.as_ref().map(|tag| &tag.0)
    }

    /// Immutable once the owning instance has been persisted.
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub fn reference(&self) -> Option<ReferenceTag> {
        self.reference
    }

    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// `None` when no setter is declared.
    pub fn setter_fluent(&self) -> Option<bool> {
        self.setter_fluent
    }

    pub fn adder_fluent(&self) -> Option<bool> {
        self.adder_fluent
    }

    pub fn check(&self, value: &Value) -> Vec<Violation> {
        constraint::check_all(&self.external_name, &self.constraints, value)
    }
}

/// What a declared accessor name dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorBinding {
    Get(usize),
    Set { property: usize, fluent: bool },
    Add { property: usize, fluent: bool },
    Lifecycle(Lifecycle),
}

#[derive(Debug)]
pub struct EntitySchema {
    pub(crate) contract: ContractRef,
    pub(crate) collection: String,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) by_external: HashMap<String, usize>,
    pub(crate) by_internal: HashMap<String, usize>,
    pub(crate) accessors: HashMap<String, AccessorBinding>,
    pub(crate) validated: Vec<usize>,
    pub(crate) identity: usize,
    pub(crate) explicit_identity: bool,
    pub(crate) indexes: Vec<IndexSpec>,
}

impl EntitySchema {
    pub fn contract(&self) -> ContractRef {
        self.contract
    }

    pub fn name(&self) -> &'static str {
        self.contract.name()
    }

    /// Collection name before any session prefix is applied.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Properties in declaration order; a synthesized identity comes first.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Looks a property up by external name, then by internal name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.property_index(name).map(|index| &self.properties[index])
    }

    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.by_external
            .get(name)
            .or_else(|| self.by_internal.get(name))
            .copied()
    }

    pub fn by_external(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.by_external.get(name).map(|index| &self.properties[*index])
    }

    pub fn by_internal(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.by_internal.get(name).map(|index| &self.properties[*index])
    }

    pub fn identity(&self) -> &PropertyDescriptor {
        &self.properties[self.identity]
    }

    /// True only when the contract declares its own identity accessor.
    pub fn has_explicit_identity(&self) -> bool {
        self.explicit_identity
    }

    pub fn validated(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.validated.iter().map(|index| &self.properties[*index])
    }

    pub fn accessor(&self, name: &str) -> Option<AccessorBinding> {
        self.accessors.get(name).copied()
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }
}
