use crate::core::{Result, Value};
use crate::entity::Entity;

/// Supplies the value of a computed property.
///
/// Computed properties are never stored, encoded or settable; every read
/// calls the computer with the owning instance.
pub trait Computer: Send + Sync {
    fn compute(&self, entity: &Entity) -> Result<Value>;
}

impl<F> Computer for F
where
    F: Fn(&Entity) -> Result<Value> + Send + Sync,
{
    fn compute(&self, entity: &Entity) -> Result<Value> {
        self(entity)
    }
}
