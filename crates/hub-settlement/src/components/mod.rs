//! # Components
//!
//! The three owners of settlement state. Each component owns its key ranges
//! (see [`crate::domain::keys`]) and is the only code that reads or writes
//! them. Mutations go through a [`StagedWrites`](crate::staging::StagedWrites)
//! overlay; reads accept any [`StateReader`](crate::ports::StateReader).

pub mod client_binding;
pub mod cursor;
pub mod finalization_queue;
pub mod packet_lifecycle;

pub use client_binding::{BindOutcome, CanonicalClientBinding};
pub use cursor::{PacketCursor, ReadSource};
pub use finalization_queue::FinalizationQueue;
pub use packet_lifecycle::{load_packet, PacketLifecycleStore};

use crate::domain::SettlementResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn encode<T: Serialize>(value: &T) -> SettlementResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SettlementResult<T> {
    Ok(bincode::deserialize(bytes)?)
}
