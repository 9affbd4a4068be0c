use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use bson::Bson;

use crate::core::{CodecError, CustomScalar, Result, Value};

/// Wire conversion for one application scalar type.
pub trait ScalarCodec: Send + Sync {
    fn encode(&self, value: &dyn CustomScalar) -> Result<Bson>;

    fn decode(&self, bson: &Bson) -> Result<Value>;
}

/// Codecs keyed by [`CustomScalar::scalar_type_name`].
#[derive(Default)]
pub struct CodecRegistry {
    codecs: RwLock<HashMap<&'static str, Arc<dyn ScalarCodec>>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: CustomScalar, C: ScalarCodec + 'static>(&self, codec: C) -> Result<()> {
        self.register_named(std::any::type_name::<T>(), codec)
    }

    pub fn register_named<C: ScalarCodec + 'static>(
        &self,
        type_name: &'static str,
        codec: C,
    ) -> Result<()> {
        self.codecs.write()?.insert(type_name, Arc::new(codec));
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Result<Option<Arc<dyn ScalarCodec>>> {
        Ok(self.codecs.read()?.get(type_name).cloned())
    }

    pub(crate) fn require(&self, type_name: &str) -> Result<Arc<dyn ScalarCodec>> {
        self.get(type_name)?.ok_or_else(|| {
            CodecError::NoCodec {
                type_name: type_name.to_string(),
            }
            .into()
        })
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = match self.codecs.read() {
            Ok(codecs) => codecs.keys().copied().collect(),
            Err(_) => Vec::new(),
        };
        names.sort_unstable();
        f.debug_struct("CodecRegistry").field("codecs", &names).finish()
    }
}
