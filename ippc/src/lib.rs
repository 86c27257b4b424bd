//! ippc - compact self-describing wire codec for inter-process calls
//!
//! This library encodes a dynamic object graph into a flat byte stream
//! and back. It is the wire format of an inter-process call channel; the
//! stream transport around it lives elsewhere.
//!
//! # Architecture
//!
//! The workspace is organized as:
//!
//! - `ippc-core`: value model, reconstruction traits, error type
//! - `ippc-codec`: encoder, decoder, identity registry, framing
//!
//! # Usage
//!
//! ```
//! use ippc::{pack, unpack, Value};
//!
//! let value = Value::Tuple(vec![Value::Int(1), Value::Text("hi".into())]);
//! let bytes = pack(&value).unwrap();
//! assert_eq!(unpack(&bytes).unwrap(), value);
//! ```
//!
//! Classes and singletons must be registered before they are packed or
//! unpacked; the `NotImplemented` and `Ellipsis` singletons come
//! pre-registered.

// Re-export core types
pub use ippc_core::{
    ClassSpec, Complex, Instance, Map, PackError, PackResult, Phase, Reduction, Set,
    SingletonSpec, Transmissible, Value, ELLIPSIS, NOT_IMPLEMENTED,
};

// Re-export the public codec operations
pub use ippc_codec::{encode, pack, register, size, unpack, Registered, RECURSION_LIMIT};

// Re-export the codec internals for advanced callers
pub mod codec {
    pub use ippc_codec::*;
}

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_round_trip() {
        let value = Value::Map(
            [(Value::Text("n".into()), Value::Int(1))]
                .into_iter()
                .collect(),
        );
        assert_eq!(unpack(&pack(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
