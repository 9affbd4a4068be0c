//! Structural equality and hashing over values and entity graphs.
//!
//! Entity comparison recurses through references, so the pairs already
//! under comparison are tracked to terminate on cycles.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bson::{Bson, Document};
use log::warn;

use crate::core::{Container, Result, Value};
use crate::entity::{DataMap, Entity};

type Visited = Vec<(usize, usize)>;

pub(crate) fn values_equal(left: &Value, right: &Value, visited: &mut Visited) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Long(a), Value::Long(b)) => a == b,
        (Value::Double(a), Value::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
        (Value::Uuid(a), Value::Uuid(b)) => a == b,
        (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
        (Value::Enum(a), Value::Enum(b)) => a == b,
        (Value::Document(a), Value::Document(b)) => a == b,
        (Value::Custom(a), Value::Custom(b)) => a.eq_scalar(&**b),
        (Value::Container(a), Value::Container(b)) => containers_equal(a, b, visited),
        (Value::Entity(a), Value::Entity(b)) => {
            entities_equal(a, b, visited).unwrap_or_else(|err| {
                warn!("Cannot compare {} with {}: {}", a.describe(), b.describe(), err);
                false
            })
        }
        _ => false,
    }
}

/// Sets compare as multisets, everything else pairwise in order.
pub(crate) fn containers_equal(left: &Container, right: &Container, visited: &mut Visited) -> bool {
    if left.len() != right.len() {
        return false;
    }
    if left.implementation().is_set() && right.implementation().is_set() {
        let mut matched = vec![false; right.len()];
        for item in left {
            let mut found = false;
            for (index, candidate) in right.iter().enumerate() {
                if !matched[index] && values_equal(item, candidate, visited) {
                    matched[index] = true;
                    found = true;
                    break;
                }
            }
            if !found {
                return false;
            }
        }
        true
    } else {
        for (a, b) in left.iter().zip(right.iter()) {
            if !values_equal(a, b, visited) {
                return false;
            }
        }
        true
    }
}

pub(crate) fn entities_equal(left: &Entity, right: &Entity, visited: &mut Visited) -> Result<bool> {
    if left.ptr_eq(right) {
        return Ok(true);
    }
    if left.contract() != right.contract() {
        return Ok(false);
    }
    // Distinct ids settle it without loading either side
    if let (Some(a), Some(b)) = (left.id(), right.id()) {
        if !values_equal(&a, &b, visited) {
            return Ok(false);
        }
    }

    let pair = (left.address(), right.address());
    if visited.contains(&pair) {
        return Ok(true);
    }
    visited.push(pair);

    let left = left.snapshot()?;
    let right = right.snapshot()?;
    Ok(maps_equal(&left, &right, visited))
}

/// An explicit null matches an absent key; encoding drops both.
fn maps_equal(left: &DataMap, right: &DataMap, visited: &mut Visited) -> bool {
    if present(left).count() != present(right).count() {
        return false;
    }
    for (name, value) in present(left) {
        match right.get(name) {
            Some(other) if values_equal(value, other, visited) => {}
            _ => return false,
        }
    }
    true
}

fn present(map: &DataMap) -> impl Iterator<Item = (&String, &Value)> {
    map.iter().filter(|(_, value)| !value.is_null())
}

/// Hash consistent with [`values_equal`]. Nested entities contribute only
/// their contract name and id.
pub(crate) fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Int(i) => i.hash(state),
        Value::Long(l) => l.hash(state),
        Value::Double(d) => canonical_bits(*d).hash(state),
        Value::String(s) => s.hash(state),
        Value::ObjectId(id) => id.bytes().hash(state),
        Value::Uuid(id) => id.hash(state),
        Value::Timestamp(ts) => ts.hash(state),
        Value::Enum(e) => {
            e.enum_type().name.hash(state);
            e.symbol().hash(state);
        }
        Value::Document(document) => hash_document(document, state),
        Value::Custom(scalar) => scalar.hash_scalar(state),
        Value::Entity(entity) => {
            entity.contract().name().hash(state);
            if let Some(id) = entity.id() {
                hash_value(&id, state);
            }
        }
        Value::Container(container) => {
            container.len().hash(state);
            if container.implementation().is_set() {
                let mut combined = 0u64;
                for item in container {
                    let mut item_state = DefaultHasher::new();
                    hash_value(item, &mut item_state);
                    combined = combined.wrapping_add(item_state.finish());
                }
                combined.hash(state);
            } else {
                for item in container {
                    hash_value(item, state);
                }
            }
        }
    }
}

/// Document equality ignores field order, so fields hash sorted by key.
fn hash_document<H: Hasher>(document: &Document, state: &mut H) {
    let mut fields: Vec<_> = document.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));
    fields.len().hash(state);
    for (key, bson) in fields {
        key.hash(state);
        hash_bson(bson, state);
    }
}

fn hash_bson<H: Hasher>(bson: &Bson, state: &mut H) {
    match bson {
        Bson::Document(document) => hash_document(document, state),
        Bson::Array(items) => {
            items.len().hash(state);
            for item in items {
                hash_bson(item, state);
            }
        }
        scalar => format!("{:?}", scalar).hash(state),
    }
}

fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

impl Entity {
    /// Structural equality over the full, materialized property maps.
    ///
    /// Instances of different contracts are never equal. A failed lazy
    /// load is logged and compares unequal.
    pub fn equals(&self, other: &Entity) -> bool {
        self.try_equals(other).unwrap_or_else(|err| {
            warn!("Cannot compare {} with {}: {}", self.describe(), other.describe(), err);
            false
        })
    }

    pub fn try_equals(&self, other: &Entity) -> Result<bool> {
        entities_equal(self, other, &mut Vec::new())
    }

    /// Hash over the materialized property map, consistent with [`equals`].
    ///
    /// [`equals`]: Entity::equals
    pub fn hash_code(&self) -> u64 {
        if let Err(err) = self.materialize() {
            warn!("Hashing {} without loading it: {}", self.describe(), err);
        }
        let mut state = DefaultHasher::new();
        self.contract().name().hash(&mut state);
        for (name, value) in present(&self.raw_data()) {
            name.hash(&mut state);
            hash_value(value, &mut state);
        }
        state.finish()
    }
}
