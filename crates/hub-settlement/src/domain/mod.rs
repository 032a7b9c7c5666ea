//! # Domain Module
//!
//! Core domain types for the settlement core: identifiers, queue entries,
//! delayed packets, bindings, invariants, errors and the store key layout.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod keys;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
