use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::container::{Container, ContainerKind};
use crate::core::value::Value;
use crate::schema::{Contract, EntityContract};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int,
    Long,
    Double,
}

impl Primitive {
    pub fn zero_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Double => Value::Double(0.0),
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool)
    }

    fn coerce(self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (Self::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Self::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (Self::Long, Value::Int(i)) => Ok(Value::Long(i64::from(i))),
            (Self::Long, Value::Long(l)) => Ok(Value::Long(l)),
            (Self::Double, Value::Int(i)) => Ok(Value::Double(f64::from(i))),
            (Self::Double, Value::Long(l)) => Ok(Value::Double(l as f64)),
            (Self::Double, Value::Double(d)) => Ok(Value::Double(d)),
            (_, other) => Err(other),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "long"),
            Self::Double => write!(f, "double"),
        }
    }
}

/// Symbol table of an entity enum. One static instance exists per enum type.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub name: &'static str,
    pub symbols: &'static [&'static str],
}

impl EnumType {
    pub const fn new(name: &'static str, symbols: &'static [&'static str]) -> Self {
        Self { name, symbols }
    }

    pub fn value_of(&'static self, symbol: &str) -> Option<EnumValue> {
        self.symbols
            .iter()
            .find(|candidate| **candidate == symbol)
            .map(|found| EnumValue {
                enum_type: self,
                symbol: *found,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    enum_type: &'static EnumType,
    symbol: &'static str,
}

impl EnumValue {
    pub fn of<E: EntityEnum>(value: &E) -> Self {
        Self {
            enum_type: E::enum_type(),
            symbol: value.symbol(),
        }
    }

    pub fn enum_type(&self) -> &'static EnumType {
        self.enum_type
    }

    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    pub fn ordinal(&self) -> usize {
        self.enum_type
            .symbols
            .iter()
            .position(|s| *s == self.symbol)
            .unwrap_or(usize::MAX)
    }
}

/// Fieldless enums stored by symbolic name. Usually derived.
pub trait EntityEnum: Sized + 'static {
    fn enum_type() -> &'static EnumType;
    fn symbol(&self) -> &'static str;
    fn from_symbol(symbol: &str) -> Option<Self>;
}

/// Handle on an entity contract type that does not require its schema.
///
/// Entity-valued properties carry one of these, so contracts may refer to
/// each other (or themselves) without recursing during derivation.
#[derive(Clone, Copy)]
pub struct ContractRef {
    type_id: TypeId,
    name: &'static str,
    contract: fn() -> Contract,
}

impl ContractRef {
    pub fn of<C: EntityContract>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: C::NAME,
            contract: <C as EntityContract>::contract,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn contract(&self) -> Contract {
        (self.contract)()
    }
}

impl PartialEq for ContractRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ContractRef {}

impl Hash for ContractRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractRef({})", self.name)
    }
}

/// Declared type of a property or accessor parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Reads as the zero value when unset.
    Primitive(Primitive),
    /// Nullable primitive.
    Boxed(Primitive),
    String,
    ObjectId,
    Uuid,
    Timestamp,
    Enum(&'static EnumType),
    Entity(ContractRef),
    Container(ContainerKind, Box<ValueType>),
    Document,
    /// Application scalar encoded through a registered codec.
    Custom(&'static str),
}

impl ValueType {
    pub fn container(kind: ContainerKind, element: ValueType) -> Self {
        Self::Container(kind, Box::new(element))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            Self::Primitive(Primitive::Bool) | Self::Boxed(Primitive::Bool)
        )
    }

    pub fn is_numeric(&self) -> bool {
        match self {
            Self::Primitive(p) | Self::Boxed(p) => p.is_numeric(),
            _ => false,
        }
    }

    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            Self::Container(kind, _) => Some(*kind),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            Self::Container(_, element) => Some(element),
            _ => None,
        }
    }

    /// The referenced contract of an entity-valued or entity-container type.
    pub fn entity_target(&self) -> Option<ContractRef> {
        match self {
            Self::Entity(contract) => Some(*contract),
            Self::Container(_, element) => match element.as_ref() {
                Self::Entity(contract) => Some(*contract),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn supports_immutable(&self) -> bool {
        matches!(
            self,
            Self::Primitive(_)
                | Self::Boxed(_)
                | Self::String
                | Self::ObjectId
                | Self::Uuid
                | Self::Timestamp
        )
    }

    pub fn zero_value(&self) -> Option<Value> {
        match self {
            Self::Primitive(p) => Some(p.zero_value()),
            _ => None,
        }
    }

    /// Converts `value` to this type, widening numerics. Hands the value
    /// back unchanged when it does not fit.
    pub fn coerce(&self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (Self::Primitive(_), Value::Null) => Err(Value::Null),
            (_, Value::Null) => Ok(Value::Null),
            (Self::Primitive(p) | Self::Boxed(p), value) => p.coerce(value),
            (Self::String, Value::String(s)) => Ok(Value::String(s)),
            (Self::ObjectId, Value::ObjectId(id)) => Ok(Value::ObjectId(id)),
            (Self::Uuid, Value::Uuid(id)) => Ok(Value::Uuid(id)),
            (Self::Timestamp, Value::Timestamp(ts)) => Ok(Value::Timestamp(ts)),
            (Self::Document, Value::Document(doc)) => Ok(Value::Document(doc)),
            (Self::Enum(expected), Value::Enum(e)) if e.enum_type() == *expected => {
                Ok(Value::Enum(e))
            }
            (Self::Entity(expected), Value::Entity(e)) if e.contract() == *expected => {
                Ok(Value::Entity(e))
            }
            (Self::Custom(name), Value::Custom(scalar)) if scalar.scalar_type_name() == *name => {
                Ok(Value::Custom(scalar))
            }
            (Self::Container(kind, element), Value::Container(container)) => {
                if !container.implementation().satisfies(*kind) {
                    return Err(Value::Container(container));
                }
                let implementation = container.implementation();
                let mut items = Vec::with_capacity(container.len());
                for item in container.into_items() {
                    items.push(element.coerce(item)?);
                }
                Container::from_items(implementation, items)
                    .map(Value::Container)
                    .map_err(|_| Value::Null)
            }
            (_, other) => Err(other),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p),
            Self::Boxed(p) => write!(f, "Option<{}>", p),
            Self::String => write!(f, "String"),
            Self::ObjectId => write!(f, "ObjectId"),
            Self::Uuid => write!(f, "Uuid"),
            Self::Timestamp => write!(f, "Timestamp"),
            Self::Enum(t) => write!(f, "{}", t.name),
            Self::Entity(c) => write!(f, "{}", c.name()),
            Self::Container(kind, element) => write!(f, "{}<{}>", kind, element),
            Self::Document => write!(f, "Document"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}
