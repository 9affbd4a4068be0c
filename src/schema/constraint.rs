use regex::Regex;

use crate::core::{SchemaError, Value, ValueType, Violation};

/// Declared validation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    NotNull,
    Min(f64),
    Max(f64),
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Must match the whole string.
    Pattern(String),
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotNull => "not_null",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Length { .. } => "length",
            Self::Pattern(_) => "pattern",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub rule: Rule,
    pub message: Option<String>,
}

impl Constraint {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            message: None,
        }
    }

    pub fn not_null() -> Self {
        Self::new(Rule::NotNull)
    }

    pub fn min(bound: f64) -> Self {
        Self::new(Rule::Min(bound))
    }

    pub fn max(bound: f64) -> Self {
        Self::new(Rule::Max(bound))
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::new(Rule::Length { min, max })
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::new(Rule::Pattern(pattern.into()))
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone)]
enum CompiledRule {
    NotNull,
    Min(f64),
    Max(f64),
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    Pattern { source: String, regex: Regex },
}

/// A constraint checked against the declared property type at derivation.
#[derive(Debug, Clone)]
pub struct CompiledConstraint {
    rule: CompiledRule,
    message: Option<String>,
}

impl CompiledConstraint {
    pub(crate) fn compile(
        property: &str,
        value_type: &ValueType,
        constraint: &Constraint,
    ) -> Result<Self, SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidConstraint {
            property: property.to_string(),
            reason,
        };

        let rule = match &constraint.rule {
            Rule::NotNull => CompiledRule::NotNull,
            Rule::Min(bound) | Rule::Max(bound) => {
                if !value_type.is_numeric() {
                    return Err(invalid(format!(
                        "{} requires a numeric property, found {}",
                        constraint.rule.name(),
                        value_type
                    )));
                }
                if bound.is_nan() {
                    return Err(invalid(format!("{} bound is NaN", constraint.rule.name())));
                }
                match constraint.rule {
                    Rule::Min(_) => CompiledRule::Min(*bound),
                    _ => CompiledRule::Max(*bound),
                }
            }
            Rule::Length { min, max } => {
                if !matches!(value_type, ValueType::String | ValueType::Container(..)) {
                    return Err(invalid(format!(
                        "length requires a string or container property, found {}",
                        value_type
                    )));
                }
                if let (Some(min), Some(max)) = (min, max) {
                    if min > max {
                        return Err(invalid(format!("length min {} exceeds max {}", min, max)));
                    }
                }
                CompiledRule::Length {
                    min: *min,
                    max: *max,
                }
            }
            Rule::Pattern(source) => {
                if *value_type != ValueType::String {
                    return Err(invalid(format!(
                        "pattern requires a string property, found {}",
                        value_type
                    )));
                }
                let regex = Regex::new(&format!("^(?:{})$", source))
                    .map_err(|e| invalid(e.to_string()))?;
                CompiledRule::Pattern {
                    source: source.clone(),
                    regex,
                }
            }
        };

        Ok(Self {
            rule,
            message: constraint.message.clone(),
        })
    }

    fn rule_name(&self) -> &'static str {
        match self.rule {
            CompiledRule::NotNull => "not_null",
            CompiledRule::Min(_) => "min",
            CompiledRule::Max(_) => "max",
            CompiledRule::Length { .. } => "length",
            CompiledRule::Pattern { .. } => "pattern",
        }
    }

    /// Null only fails `not_null`; every other rule accepts it.
    pub fn check(&self, property: &str, value: &Value) -> Option<Violation> {
        let default_message = match (&self.rule, value) {
            (CompiledRule::NotNull, Value::Null) => Some("must not be null".to_string()),
            (_, Value::Null) | (CompiledRule::NotNull, _) => None,
            (CompiledRule::Min(bound), value) => value
                .as_f64()
                .filter(|v| v < bound)
                .map(|_| format!("must be at least {}", bound)),
            (CompiledRule::Max(bound), value) => value
                .as_f64()
                .filter(|v| v > bound)
                .map(|_| format!("must be at most {}", bound)),
            (CompiledRule::Length { min, max }, value) => {
                let length = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Container(c) => c.len(),
                    _ => return None,
                };
                let too_short = min.is_some_and(|min| length < min);
                let too_long = max.is_some_and(|max| length > max);
                (too_short || too_long).then(|| match (min, max) {
                    (Some(min), Some(max)) => {
                        format!("length must be between {} and {}", min, max)
                    }
                    (Some(min), None) => format!("length must be at least {}", min),
                    (None, Some(max)) => format!("length must be at most {}", max),
                    (None, None) => String::new(),
                })
            }
            (CompiledRule::Pattern { source, regex }, value) => match value {
                Value::String(s) if !regex.is_match(s) => {
                    Some(format!("must match pattern '{}'", source))
                }
                _ => None,
            },
        }?;

        Some(Violation {
            property: property.to_string(),
            rule: self.rule_name().to_string(),
            message: self.message.clone().unwrap_or(default_message),
        })
    }
}

/// Runs every constraint, collecting all violations.
pub(crate) fn check_all(
    property: &str,
    constraints: &[CompiledConstraint],
    value: &Value,
) -> Vec<Violation> {
    constraints
        .iter()
        .filter_map(|constraint| constraint.check(property, value))
        .collect()
}
