use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use crate::core::{ContractRef, Result};
use crate::schema::derive::derive;
use crate::schema::{EntityContract, EntitySchema};

lazy_static! {
    /// Process-wide schema cache keyed by contract type.
    static ref SCHEMAS: RwLock<HashMap<TypeId, Arc<EntitySchema>>> = RwLock::new(HashMap::new());
}

/// Returns the canonical schema of `contract`, deriving it on first use.
///
/// Derivation runs outside the lock. When two threads race on the same
/// contract the first insert wins and the loser's schema is discarded, so
/// every caller observes the same `Arc`. Failures are not cached.
pub fn schema_for(contract: ContractRef) -> Result<Arc<EntitySchema>> {
    if let Some(schema) = SCHEMAS.read()?.get(&contract.type_id()) {
        return Ok(Arc::clone(schema));
    }

    let derived = Arc::new(derive(contract)?);
    let mut schemas = SCHEMAS.write()?;
    Ok(Arc::clone(
        schemas.entry(contract.type_id()).or_insert(derived),
    ))
}

pub fn schema_of<C: EntityContract>() -> Result<Arc<EntitySchema>> {
    schema_for(ContractRef::of::<C>())
}
