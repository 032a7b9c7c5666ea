//! Outgoing settlement events
//!
//! Published to the [`SettlementEventSink`](crate::ports::SettlementEventSink)
//! only after the step that produced them has committed.

use crate::domain::{
    ClientId, Height, PacketKey, RollappId, SettlementOutcome, StateCommitmentRef, StateIndex,
};
use serde::{Deserialize, Serialize};

/// Event emitted by the settlement core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// A state commitment's dispute window elapsed and it was finalized.
    StateFinalized {
        commitment: StateCommitmentRef,
        creation_height: Height,
    },
    /// A delayed packet reached a terminal status.
    PacketSettled {
        key: PacketKey,
        rollapp_id: RollappId,
        counterparty_address: String,
        outcome: SettlementOutcome,
    },
    /// Queued state commitments of a rollapp were reverted on fraud.
    RollappReverted {
        rollapp_id: RollappId,
        from_state_index: StateIndex,
        reverted_refs: usize,
        reverted_packets: usize,
    },
    /// A rollapp was bound to its canonical client.
    ClientBound {
        rollapp_id: RollappId,
        client_id: ClientId,
    },
}

impl SettlementEvent {
    /// Short event name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateFinalized { .. } => "state_finalized",
            Self::PacketSettled { .. } => "packet_settled",
            Self::RollappReverted { .. } => "rollapp_reverted",
            Self::ClientBound { .. } => "client_bound",
        }
    }
}
