//! # Domain Entities
//!
//! Queue entries, delayed packets and canonical client bindings.

use super::errors::{SettlementError, SettlementResult};
use super::invariants::counterparty_address;
use super::value_objects::{
    ClientId, Height, PacketDirection, PacketKey, PacketStatus, RollappId, StateCommitmentRef,
    StateIndex,
};
use serde::{Deserialize, Serialize};

/// Pending state commitments submitted by one rollapp at one height.
///
/// Keyed by `(creation_height, rollapp_id)`. Never mixes rollapps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationQueueEntry {
    /// Height at which the refs were submitted.
    pub creation_height: Height,
    /// Rollapp that owns every ref in this entry.
    pub rollapp_id: RollappId,
    /// Refs in submission order.
    pub refs: Vec<StateCommitmentRef>,
}

impl FinalizationQueueEntry {
    /// Create an empty entry.
    pub fn new(creation_height: Height, rollapp_id: RollappId) -> Self {
        Self {
            creation_height,
            rollapp_id,
            refs: Vec::new(),
        }
    }

    /// Append a ref. Fails if the ref belongs to another rollapp.
    pub fn push(&mut self, commitment: StateCommitmentRef) -> SettlementResult<()> {
        if commitment.rollapp_id != self.rollapp_id {
            return Err(SettlementError::InvalidArgument(format!(
                "ref {} does not belong to queue entry of rollapp {}",
                commitment, self.rollapp_id
            )));
        }
        self.refs.push(commitment);
        Ok(())
    }

    /// State indexes in this entry.
    pub fn state_indexes(&self) -> Vec<StateIndex> {
        self.refs.iter().map(|r| r.state_index).collect()
    }

    /// True when the entry holds no refs.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// ICS-20 fungible token transfer payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPacketData {
    /// Token denomination.
    pub denom: String,
    /// Amount as a decimal string.
    pub amount: String,
    /// Sending address.
    pub sender: String,
    /// Receiving address.
    pub receiver: String,
    /// Optional memo.
    #[serde(default)]
    pub memo: String,
}

/// Parameters for creating a pending packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketParams {
    /// Channel on the hub side.
    pub channel_id: String,
    /// Packet sequence on that channel.
    pub sequence: u64,
    /// Packet direction.
    pub direction: PacketDirection,
    /// State commitment the packet was proven against.
    pub origin: StateCommitmentRef,
    /// Decoded transfer payload.
    pub payload: TransferPacketData,
}

/// One delayed cross-chain packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollappPacket {
    /// Unique key derived from channel, sequence and direction.
    pub key: PacketKey,
    /// Originating rollapp.
    pub rollapp_id: RollappId,
    /// Channel on the hub side.
    pub channel_id: String,
    /// Packet sequence.
    pub sequence: u64,
    /// Packet direction.
    pub direction: PacketDirection,
    /// Lifecycle status.
    pub status: PacketStatus,
    /// Party whose funds are at risk (receiver on recv, sender on ack/timeout).
    pub counterparty_address: String,
    /// State commitment whose outcome settles this packet.
    pub origin: StateCommitmentRef,
    /// Transfer payload.
    pub payload: TransferPacketData,
}

impl RollappPacket {
    /// Create a new PENDING packet.
    pub fn pending(params: PacketParams) -> Self {
        let key = PacketKey::derive(&params.channel_id, params.sequence, params.direction);
        let counterparty = counterparty_address(params.direction, &params.payload).to_string();
        Self {
            key,
            rollapp_id: params.origin.rollapp_id.clone(),
            channel_id: params.channel_id,
            sequence: params.sequence,
            direction: params.direction,
            status: PacketStatus::Pending,
            counterparty_address: counterparty,
            origin: params.origin,
            payload: params.payload,
        }
    }

    /// Transition to a new status.
    pub fn transition_to(&mut self, next: PacketStatus) -> SettlementResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(SettlementError::InvalidState {
                key: self.key.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Binding from a rollapp to the client that verifies its state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalBinding {
    /// Bound rollapp.
    pub rollapp_id: RollappId,
    /// Canonical verification client.
    pub client_id: ClientId,
}
