//! Core types for the ippc wire codec
//!
//! This crate provides the dynamic value model, the reconstruction
//! capability traits, and the error type shared by the codec crates.

pub mod error;
pub mod datatypes;

pub use error::{PackError, PackResult};
pub use datatypes::{
    ClassSpec, Complex, Constructor, Instance, Map, Phase, Reduction, Set, SingletonSpec,
    Transmissible, Value, ELLIPSIS, NOT_IMPLEMENTED,
};
