//! Accessor naming conventions.
//!
//! Both Rust (`get_first_name`) and camel (`getFirstName`) spellings are
//! understood. Either fragment is decapitalized, so `get_Name`, `getName`
//! and `get_name` all name `name`.

/// Storage name of the identity property.
pub const ID_FIELD: &str = "_id";

/// External names starting with this character are reserved.
pub const RESERVED_PREFIX: char = '_';

/// Operations every entity answers regardless of its declared properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Save,
    Delete,
    Seal,
    Load,
    Equals,
    HashCode,
    ToString,
    Get,
    Set,
}

impl Lifecycle {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "save" => Some(Self::Save),
            "delete" => Some(Self::Delete),
            "seal" => Some(Self::Seal),
            "load" => Some(Self::Load),
            "equals" => Some(Self::Equals),
            "hash_code" | "hashCode" => Some(Self::HashCode),
            "to_string" | "toString" => Some(Self::ToString),
            "get" => Some(Self::Get),
            "set" => Some(Self::Set),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Delete => "delete",
            Self::Seal => "seal",
            Self::Load => "load",
            Self::Equals => "equals",
            Self::HashCode => "hash_code",
            Self::ToString => "to_string",
            Self::Get => "get",
            Self::Set => "set",
        }
    }
}

/// What an accessor name declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessorKind {
    /// `get_x` / `getX`, or `is_x` / `isX` when `boolean` is set.
    Getter { property: String, boolean: bool },
    Setter { property: String },
    Adder { property: String },
    Lifecycle(Lifecycle),
    Unknown,
}

pub fn classify(name: &str) -> AccessorKind {
    if let Some(lifecycle) = Lifecycle::from_name(name) {
        return AccessorKind::Lifecycle(lifecycle);
    }
    if let Some(property) = property_fragment(name, "get") {
        return AccessorKind::Getter {
            property,
            boolean: false,
        };
    }
    if let Some(property) = property_fragment(name, "is") {
        return AccessorKind::Getter {
            property,
            boolean: true,
        };
    }
    if let Some(property) = property_fragment(name, "set") {
        return AccessorKind::Setter { property };
    }
    if let Some(property) = property_fragment(name, "add") {
        return AccessorKind::Adder { property };
    }
    AccessorKind::Unknown
}

fn property_fragment(name: &str, prefix: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    if let Some(snake) = rest.strip_prefix('_') {
        return (!snake.is_empty() && !snake.starts_with('_')).then(|| decapitalize(snake));
    }
    rest.chars()
        .next()
        .filter(|c| c.is_uppercase())
        .map(|_| decapitalize(rest))
}

/// Lowercases the first character unless the first two are both uppercase
/// (`Name` -> `name`, `URL` -> `URL`).
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
            name.to_string()
        }
        (Some(first), _) => first
            .to_lowercase()
            .chain(name.chars().skip(1))
            .collect(),
        (None, _) => String::new(),
    }
}

pub fn is_identity_name(internal: &str) -> bool {
    internal.eq_ignore_ascii_case("id")
}
