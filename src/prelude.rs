//! Everything an application typically needs in one import.
//!
//! ```
//! use docbind::prelude::*;
//!
//! let session = Session::detached();
//! assert!(session.config().dirty_tracking);
//! ```

pub use crate::{
    doc, entity, Bson, Document, Entity, EntityContract, EntityEnum, Error, FieldValue,
    MemoryStore, ObjectId, Result, Session, SessionConfig, TypedEntity, Value,
};
