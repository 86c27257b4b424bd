//! The closed sum of wire-transmissible values

use crate::datatypes::complex::Complex;
use crate::datatypes::instance::{ClassSpec, Instance, SingletonSpec};
use crate::datatypes::map::Map;
use crate::datatypes::set::Set;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// A value drawn from the codec's closed universe of kinds.
///
/// Every variant maps to exactly one tag family on the wire. Anything
/// outside this universe travels as an [`Instance`] carrying its own
/// reconstruction recipe.
#[derive(Debug, Clone)]
pub enum Value {
    /// The unit value
    Unit,
    /// Boolean
    Bool(bool),
    /// Signed integer, encoded at its narrowest width
    Int(i64),
    /// Unsigned integer above the signed 64-bit range
    UInt(u64),
    /// IEEE-754 double
    Float(f64),
    /// Complex number
    Complex(Complex),
    /// UTF-8 text
    Text(String),
    /// Immutable byte string
    Bytes(Bytes),
    /// Mutable byte sequence
    ByteArray(Vec<u8>),
    /// Ordered, fixed-shape sequence
    Tuple(Vec<Value>),
    /// Ordered, growable sequence
    List(Vec<Value>),
    /// Keyed mapping
    Map(Map),
    /// Unique set
    Set(Set),
    /// Immutable unique set
    FrozenSet(Set),
    /// A user-declared class, transmitted by identity
    Class(Arc<ClassSpec>),
    /// A registered singleton, transmitted by name
    Singleton(Arc<SingletonSpec>),
    /// An arbitrary object with a reconstruction recipe
    Instance(Instance),
}

impl Value {
    /// Short kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "int",
            Value::Float(_) => "float",
            Value::Complex(_) => "complex",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::ByteArray(_) => "bytearray",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Class(_) => "class",
            Value::Singleton(_) => "singleton",
            Value::Instance(_) => "instance",
        }
    }

    /// Whether this is the unit value.
    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Get the value as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a signed integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Get the value as a tuple.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Get the value as a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the value as a mapping.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            // The same number may arrive signed or unsigned depending on
            // which encoder produced it.
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => {
                u64::try_from(*a).map(|a| a == *b).unwrap_or(false)
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Complex(a), Value::Complex(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::FrozenSet(a), Value::FrozenSet(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Singleton(a), Value::Singleton(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::UInt(u),
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Value::Complex(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Value::Map(m)
    }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self {
        Value::Instance(i)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(v) => write!(f, "{}", v),
            Value::Complex(c) => write!(f, "{}", c),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => {
                write!(f, "b\"")?;
                for byte in b.iter() {
                    write!(f, "\\x{:02x}", byte)?;
                }
                write!(f, "\"")
            }
            Value::ByteArray(b) => {
                write!(f, "bytearray(")?;
                for byte in b {
                    write!(f, "\\x{:02x}", byte)?;
                }
                write!(f, ")")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => write!(f, "{}", map),
            Value::Set(set) => write!(f, "{}", set),
            Value::FrozenSet(set) => write!(f, "frozenset({})", set),
            Value::Class(class) => write!(f, "<class '{}.{}'>", class.module(), class.qualname()),
            Value::Singleton(s) => write!(f, "{}", s.name()),
            Value::Instance(i) => write!(f, "<{} instance>", i.type_name()),
        }
    }
}
