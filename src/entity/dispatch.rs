use crate::core::{AccessError, Error, Lifecycle, Result, Value};
use crate::entity::Entity;
use crate::schema::AccessorBinding;

/// Splits `args` into exactly `N` arguments.
fn take<const N: usize>(accessor: &str, args: Vec<Value>) -> Result<[Value; N]> {
    let found = args.len();
    <[Value; N]>::try_from(args).map_err(|_| {
        AccessError::Arity {
            accessor: accessor.to_string(),
            expected: N,
            found,
        }
        .into()
    })
}

impl Entity {
    /// Calls a declared accessor or lifecycle operation by name.
    ///
    /// Fluent setters and adders return the instance itself; `void`
    /// operations return [`Value::Null`].
    pub fn invoke(&self, accessor: &str, args: Vec<Value>) -> Result<Value> {
        let binding = self
            .schema()
            .accessor(accessor)
            .or_else(|| Lifecycle::from_name(accessor).map(AccessorBinding::Lifecycle))
            .ok_or_else(|| AccessError::UnknownAccessor {
                entity: self.contract().name().to_string(),
                accessor: accessor.to_string(),
            })?;

        match binding {
            AccessorBinding::Get(index) => {
                take::<0>(accessor, args)?;
                self.get_at(index)
            }
            AccessorBinding::Set { property, fluent } => {
                let [value] = take(accessor, args)?;
                self.set_at(property, value)?;
                Ok(self.chained(fluent))
            }
            AccessorBinding::Add { property, fluent } => {
                let [value] = take(accessor, args)?;
                self.add_at(property, value)?;
                Ok(self.chained(fluent))
            }
            AccessorBinding::Lifecycle(lifecycle) => {
                self.invoke_lifecycle(accessor, lifecycle, args)
            }
        }
    }

    fn invoke_lifecycle(
        &self,
        accessor: &str,
        lifecycle: Lifecycle,
        args: Vec<Value>,
    ) -> Result<Value> {
        match lifecycle {
            Lifecycle::Save => {
                take::<0>(accessor, args)?;
                self.save().map(Value::Bool)
            }
            Lifecycle::Delete => {
                take::<0>(accessor, args)?;
                self.delete().map(Value::Bool)
            }
            Lifecycle::Seal => {
                take::<0>(accessor, args)?;
                self.seal();
                Ok(Value::Null)
            }
            Lifecycle::Load => {
                let [id] = take(accessor, args)?;
                Ok(self.load(id)?.map_or(Value::Null, Value::Entity))
            }
            Lifecycle::Equals => {
                let [other] = take(accessor, args)?;
                Ok(Value::Bool(match other {
                    Value::Entity(other) => self.equals(&other),
                    _ => false,
                }))
            }
            Lifecycle::HashCode => {
                take::<0>(accessor, args)?;
                Ok(Value::Long(self.hash_code() as i64))
            }
            Lifecycle::ToString => {
                take::<0>(accessor, args)?;
                self.render().map(Value::String)
            }
            Lifecycle::Get => {
                let [name] = take(accessor, args)?;
                self.get(property_name(accessor, &name)?)
            }
            Lifecycle::Set => {
                let [name, value] = take(accessor, args)?;
                self.set(property_name(accessor, &name)?, value)?;
                Ok(Value::Null)
            }
        }
    }

    fn chained(&self, fluent: bool) -> Value {
        if fluent {
            Value::Entity(self.clone())
        } else {
            Value::Null
        }
    }
}

fn property_name<'a>(accessor: &str, name: &'a Value) -> Result<&'a str> {
    name.as_str()
        .ok_or_else(|| Error::casting(accessor, "String", name.type_name()))
}
