//! # Ports Layer
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (API exposed to the block driver and queries)
//! - `outbound.rs` - Driven ports (collaborators required by the service)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
