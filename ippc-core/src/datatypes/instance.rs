//! Transmissible instances, classes and singletons
//!
//! Built-in kinds are handled by the codec directly; everything else
//! crosses the wire as an *instance* described by its reconstruction:
//! a registered class, the arguments handed to its constructor, and up
//! to three optional follow-up payloads (state, extend, update) applied
//! in that order on the receiving side.

use crate::datatypes::map::Map;
use crate::datatypes::value::Value;
use crate::error::PackResult;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

/// Outcome of an optional reconstruction capability.
///
/// `Unsupported` plays the role of a missing method: the decoder falls
/// back to the generic behaviour for that phase, or fails if there is
/// none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The object handled the payload itself.
    Applied,
    /// The object does not implement this capability.
    Unsupported,
}

/// What a transmissible object reports for encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// The object is a process-wide singleton, transmitted by name.
    Singleton(String),
    /// The object is rebuilt by calling a registered class constructor.
    Construct {
        /// Constructor resolved through the identity registry on decode.
        class: Arc<ClassSpec>,
        /// Positional constructor arguments.
        args: Vec<Value>,
        /// Payload for the `set_state` phase, if any.
        state: Option<Value>,
        /// Payload for the `extend` phase, if any.
        extend: Option<Value>,
        /// Payload for the `update` phase, if any.
        update: Option<Value>,
    },
}

impl Reduction {
    /// Shorthand for a plain `class(args...)` reconstruction.
    pub fn construct(class: Arc<ClassSpec>, args: Vec<Value>) -> Self {
        Reduction::Construct {
            class,
            args,
            state: None,
            extend: None,
            update: None,
        }
    }
}

/// Capability surface of a value the codec has no built-in handler for.
///
/// `reduce` is the only mandatory piece: it describes how to rebuild the
/// object elsewhere, or returns `None` for objects that must not cross
/// the wire. The remaining methods are the optional phase hooks; their
/// default bodies report [`Phase::Unsupported`] so implementers override
/// only what their type actually supports.
pub trait Transmissible: Send + Sync {
    /// Concrete type name, used in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Reconstruction recipe, or `None` if the object is not packable.
    fn reduce(&self) -> Option<Reduction>;

    /// Restore internal state (phase 2).
    fn set_state(&mut self, _state: &Value) -> PackResult<Phase> {
        Ok(Phase::Unsupported)
    }

    /// Append a sequence tail in place (phase 3).
    fn extend(&mut self, _tail: &Value) -> PackResult<Phase> {
        Ok(Phase::Unsupported)
    }

    /// Merge keyed items in bulk (phase 4).
    fn update(&mut self, _items: &Value) -> PackResult<Phase> {
        Ok(Phase::Unsupported)
    }

    /// Assign a single keyed item; the update-phase fallback feeds
    /// decoded `(key, value)` pairs through here one at a time.
    fn set_item(&mut self, _key: &Value, _value: &Value) -> PackResult<Phase> {
        Ok(Phase::Unsupported)
    }

    /// Attribute map used by the set_state fallback when the object has
    /// no `set_state` of its own and the state payload is a mapping.
    fn attrs_mut(&mut self) -> Option<&mut Map> {
        None
    }
}

/// A shared handle to a transmissible object.
///
/// Instances compare equal when their reductions do: two objects that
/// would rebuild identically are the same value as far as the wire is
/// concerned. Objects that refuse to reduce never compare equal.
#[derive(Clone)]
pub struct Instance(Arc<dyn Transmissible>);

impl Instance {
    /// Wrap a transmissible object.
    pub fn new<T: Transmissible + 'static>(obj: T) -> Self {
        Self(Arc::new(obj))
    }

    /// Wrap an already boxed object (the decoder's path).
    pub fn from_boxed(obj: Box<dyn Transmissible>) -> Self {
        Self(Arc::from(obj))
    }

    /// Concrete type name of the wrapped object.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Reconstruction recipe of the wrapped object.
    pub fn reduce(&self) -> Option<Reduction> {
        self.0.reduce()
    }

    /// Downcast-free access for callers that only need the trait.
    pub fn as_transmissible(&self) -> &dyn Transmissible {
        &*self.0
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.0.type_name())
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        match (self.0.reduce(), other.0.reduce()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Constructor signature: positional arguments in, fresh object out.
pub type Constructor = fn(&[Value]) -> PackResult<Box<dyn Transmissible>>;

/// A user-declared class, named by module path and qualified name.
///
/// The pair `(module, qualname)` is the class identity on the wire; two
/// specs with the same identity are the same class regardless of which
/// constructor they carry.
pub struct ClassSpec {
    module: String,
    qualname: String,
    construct: Constructor,
}

impl ClassSpec {
    /// Declare a class under `module`.`qualname` with its constructor.
    pub fn new(
        module: impl Into<String>,
        qualname: impl Into<String>,
        construct: Constructor,
    ) -> Arc<Self> {
        Arc::new(Self {
            module: module.into(),
            qualname: qualname.into(),
            construct,
        })
    }

    /// Module path of the declaring module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Qualified name within the module.
    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    /// Invoke the constructor.
    pub fn construct(&self, args: &[Value]) -> PackResult<Box<dyn Transmissible>> {
        (self.construct)(args)
    }
}

impl fmt::Debug for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class '{}.{}'>", self.module, self.qualname)
    }
}

impl PartialEq for ClassSpec {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.qualname == other.qualname
    }
}

/// A registered singleton, named by its reconstruction string.
#[derive(Debug, PartialEq, Eq)]
pub struct SingletonSpec {
    name: String,
}

impl SingletonSpec {
    /// Declare a singleton under `name`.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }

    /// The singleton's wire name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The "not implemented" singleton, pre-registered at codec startup.
pub static NOT_IMPLEMENTED: Lazy<Arc<SingletonSpec>> =
    Lazy::new(|| SingletonSpec::new("NotImplemented"));

/// The "ellipsis" singleton, pre-registered at codec startup.
pub static ELLIPSIS: Lazy<Arc<SingletonSpec>> = Lazy::new(|| SingletonSpec::new("Ellipsis"));
