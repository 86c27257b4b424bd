//! Process-wide identity registry
//!
//! Classes and singletons cross the wire as encoded identity bytes; this
//! registry is the only place those bytes are turned back into live
//! objects. Registration is expected at startup, lookups afterwards, so
//! a readers/writer lock over a plain map is enough.

use crate::encoder::Encoder;
use ippc_core::{ClassSpec, PackResult, SingletonSpec, Value, ELLIPSIS, NOT_IMPLEMENTED};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// An object reachable through the registry.
#[derive(Debug, Clone)]
pub enum Registered {
    /// A user-declared class, keyed by packed module + qualified name.
    Class(Arc<ClassSpec>),
    /// A singleton, keyed by its packed name.
    Singleton(Arc<SingletonSpec>),
}

impl Registered {
    /// The value this registration denotes.
    pub fn to_value(&self) -> Value {
        match self {
            Registered::Class(class) => Value::Class(class.clone()),
            Registered::Singleton(singleton) => Value::Singleton(singleton.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Registered::Class(class) => {
                format!("<class '{}.{}'>", class.module(), class.qualname())
            }
            Registered::Singleton(singleton) => format!("'{}'", singleton.name()),
        }
    }
}

impl From<Arc<ClassSpec>> for Registered {
    fn from(class: Arc<ClassSpec>) -> Self {
        Registered::Class(class)
    }
}

impl From<Arc<SingletonSpec>> for Registered {
    fn from(singleton: Arc<SingletonSpec>) -> Self {
        Registered::Singleton(singleton)
    }
}

static REGISTRY: Lazy<RwLock<HashMap<Vec<u8>, Registered>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for singleton in [Arc::clone(&NOT_IMPLEMENTED), Arc::clone(&ELLIPSIS)] {
        let entry = Registered::Singleton(singleton);
        let key = identity_bytes(&entry).expect("bootstrap identity");
        map.insert(key, entry);
    }
    RwLock::new(map)
});

/// Encoded identity of a registrable object.
pub(crate) fn identity_bytes(entry: &Registered) -> PackResult<Vec<u8>> {
    let mut ident = Encoder::new();
    match entry {
        Registered::Class(class) => {
            ident.pack_text(class.module())?;
            ident.pack_text(class.qualname())?;
        }
        Registered::Singleton(singleton) => {
            ident.pack_text(singleton.name())?;
        }
    }
    Ok(ident.as_slice().to_vec())
}

/// Encoded identity of a singleton known only by name.
pub(crate) fn name_identity(name: &str) -> PackResult<Vec<u8>> {
    let mut ident = Encoder::new();
    ident.pack_text(name)?;
    Ok(ident.as_slice().to_vec())
}

/// Add an object to the registry. Re-registering the same identity
/// overwrites the previous entry; last writer wins.
pub fn register(entry: impl Into<Registered>) -> PackResult<()> {
    let entry = entry.into();
    let key = identity_bytes(&entry)?;
    log::debug!("registering {}", entry.describe());
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, entry);
    Ok(())
}

/// Resolve encoded identity bytes to the registered object.
pub fn lookup(identity: &[u8]) -> Option<Registered> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(identity)
        .cloned()
}
