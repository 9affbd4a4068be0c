use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::core::error::{AccessError, Result};
use crate::core::value::Value;

/// Declared container contract of a multi-valued property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Collection,
    List,
    Set,
    SortedSet,
    Queue,
    Deque,
}

impl ContainerKind {
    /// Implementation used when decoding a kind the registry has no
    /// default for.
    pub fn natural_impl(self) -> ContainerImpl {
        match self {
            Self::Collection | Self::List => ContainerImpl::ArrayList,
            Self::Set => ContainerImpl::LinkedHashSet,
            Self::SortedSet => ContainerImpl::TreeSet,
            Self::Queue | Self::Deque => ContainerImpl::ArrayDeque,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collection => "Collection",
            Self::List => "List",
            Self::Set => "Set",
            Self::SortedSet => "SortedSet",
            Self::Queue => "Queue",
            Self::Deque => "Deque",
        };
        f.write_str(name)
    }
}

/// Concrete container behaviour backing a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerImpl {
    ArrayList,
    LinkedList,
    HashSet,
    LinkedHashSet,
    TreeSet,
    ArrayDeque,
}

impl ContainerImpl {
    pub fn satisfies(self, kind: ContainerKind) -> bool {
        match kind {
            ContainerKind::Collection => true,
            ContainerKind::List => matches!(self, Self::ArrayList | Self::LinkedList),
            ContainerKind::Set => self.is_set(),
            ContainerKind::SortedSet => matches!(self, Self::TreeSet),
            ContainerKind::Queue | ContainerKind::Deque => {
                matches!(self, Self::LinkedList | Self::ArrayDeque)
            }
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, Self::HashSet | Self::LinkedHashSet | Self::TreeSet)
    }
}

impl fmt::Display for ContainerImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ArrayList => "ArrayList",
            Self::LinkedList => "LinkedList",
            Self::HashSet => "HashSet",
            Self::LinkedHashSet => "LinkedHashSet",
            Self::TreeSet => "TreeSet",
            Self::ArrayDeque => "ArrayDeque",
        };
        f.write_str(name)
    }
}

/// Multi-valued property value.
///
/// Set implementations drop duplicates on insert; `TreeSet` additionally
/// keeps its items ordered by [`Value::compare`].
#[derive(Debug, Clone)]
pub struct Container {
    implementation: ContainerImpl,
    items: Vec<Value>,
}

impl Container {
    pub fn new(implementation: ContainerImpl) -> Self {
        Self {
            implementation,
            items: Vec::new(),
        }
    }

    pub fn from_items(
        implementation: ContainerImpl,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Self> {
        let mut container = Self::new(implementation);
        for item in items {
            container.push(item)?;
        }
        Ok(container)
    }

    /// Wraps items already unique and ordered for `implementation`.
    pub(crate) fn from_raw(implementation: ContainerImpl, items: Vec<Value>) -> Self {
        Self {
            implementation,
            items,
        }
    }

    pub fn implementation(&self) -> ContainerImpl {
        self.implementation
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    /// Appends `value`, returning false when a set already holds it.
    pub fn push(&mut self, value: Value) -> Result<bool> {
        match self.implementation {
            ContainerImpl::TreeSet => {
                let mut position = self.items.len();
                for (index, existing) in self.items.iter().enumerate() {
                    match value.compare(existing)? {
                        Ordering::Equal => return Ok(false),
                        Ordering::Less => {
                            position = index;
                            break;
                        }
                        Ordering::Greater => {}
                    }
                }
                self.items.insert(position, value);
                Ok(true)
            }
            implementation if implementation.is_set() => {
                if self.items.contains(&value) {
                    return Ok(false);
                }
                self.items.push(value);
                Ok(true)
            }
            _ => {
                self.items.push(value);
                Ok(true)
            }
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        crate::entity::equality::containers_equal(self, other, &mut Vec::new())
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Default implementation used when `add` meets a property with no
/// container yet.
///
/// Seeded with `Collection`, `List`, `Set` and `Queue`; other kinds fail
/// until registered.
#[derive(Debug)]
pub struct ContainerRegistry {
    defaults: RwLock<HashMap<ContainerKind, ContainerImpl>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        let defaults = HashMap::from([
            (ContainerKind::Collection, ContainerImpl::ArrayList),
            (ContainerKind::List, ContainerImpl::ArrayList),
            (ContainerKind::Set, ContainerImpl::LinkedHashSet),
            (ContainerKind::Queue, ContainerImpl::ArrayDeque),
        ]);
        Self {
            defaults: RwLock::new(defaults),
        }
    }

    pub fn empty() -> Self {
        Self {
            defaults: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_default(
        &self,
        kind: ContainerKind,
        implementation: ContainerImpl,
    ) -> Result<()> {
        if !implementation.satisfies(kind) {
            return Err(AccessError::InvalidContainerDefault {
                kind: kind.to_string(),
                implementation: implementation.to_string(),
            }
            .into());
        }
        self.defaults.write()?.insert(kind, implementation);
        Ok(())
    }

    pub fn unregister(&self, kind: ContainerKind) -> Result<Option<ContainerImpl>> {
        Ok(self.defaults.write()?.remove(&kind))
    }

    pub fn default_for(&self, kind: ContainerKind) -> Result<ContainerImpl> {
        self.defaults
            .read()?
            .get(&kind)
            .copied()
            .ok_or_else(|| {
                AccessError::NoContainerDefault {
                    kind: kind.to_string(),
                }
                .into()
            })
    }

    pub fn instantiate(&self, kind: ContainerKind) -> Result<Container> {
        self.default_for(kind).map(Container::new)
    }
}

impl Default for ContainerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
