//! Genesis snapshot of settlement state.

use crate::domain::{
    invariant_entry_consistent, CanonicalBinding, FinalizationQueueEntry, PacketStatus,
    RollappPacket, SettlementError, SettlementResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Full settlement state: queue, packets and bindings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Queue entries in height then rollapp order.
    #[serde(default)]
    pub queue: Vec<FinalizationQueueEntry>,
    /// Packets in key order.
    #[serde(default)]
    pub packets: Vec<RollappPacket>,
    /// Bindings in rollapp order.
    #[serde(default)]
    pub bindings: Vec<CanonicalBinding>,
}

impl GenesisState {
    /// Check the snapshot is self-consistent.
    ///
    /// Refs are unique across the queue, each entry holds one rollapp, each
    /// `(height, rollapp)` appears once, packet keys are unique, PENDING
    /// packets point at a queued ref, and each rollapp has one binding.
    pub fn validate(&self) -> SettlementResult<()> {
        let mut slots = HashSet::new();
        let mut refs = HashSet::new();
        for entry in &self.queue {
            invariant_entry_consistent(entry)?;
            if entry.is_empty() {
                return Err(SettlementError::InvalidArgument(format!(
                    "empty queue entry ({}, {})",
                    entry.creation_height, entry.rollapp_id
                )));
            }
            if !slots.insert((entry.creation_height, entry.rollapp_id.clone())) {
                return Err(SettlementError::Conflict(format!(
                    "queue entry ({}, {}) listed twice",
                    entry.creation_height, entry.rollapp_id
                )));
            }
            for r in &entry.refs {
                if !refs.insert(r.clone()) {
                    return Err(SettlementError::Conflict(format!("ref {} queued twice", r)));
                }
            }
        }

        let mut keys = HashSet::new();
        for packet in &self.packets {
            if !keys.insert(packet.key) {
                return Err(SettlementError::Conflict(format!(
                    "packet {} listed twice",
                    packet.key
                )));
            }
            if packet.status == PacketStatus::Pending && !refs.contains(&packet.origin) {
                return Err(SettlementError::InvalidArgument(format!(
                    "pending packet {} tied to unqueued ref {}",
                    packet.key, packet.origin
                )));
            }
        }

        let mut bound = HashSet::new();
        for binding in &self.bindings {
            if !bound.insert(binding.rollapp_id.clone()) {
                return Err(SettlementError::Conflict(format!(
                    "rollapp {} bound twice",
                    binding.rollapp_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ClientId, ErrorKind, PacketDirection, PacketParams, RollappId, StateCommitmentRef,
        TransferPacketData,
    };

    fn entry(height: i64, rollapp: &str, idx: &[u64]) -> FinalizationQueueEntry {
        let mut e = FinalizationQueueEntry::new(height, RollappId::new(rollapp));
        for i in idx {
            e.push(StateCommitmentRef::new(rollapp, *i)).unwrap();
        }
        e
    }

    fn pending(origin: StateCommitmentRef) -> RollappPacket {
        RollappPacket::pending(PacketParams {
            channel_id: "channel-0".into(),
            sequence: 1,
            direction: PacketDirection::OnRecv,
            origin,
            payload: TransferPacketData {
                sender: "s".into(),
                receiver: "r".into(),
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_valid_genesis() {
        let genesis = GenesisState {
            queue: vec![entry(1, "ra", &[1, 2])],
            packets: vec![pending(StateCommitmentRef::new("ra", 2))],
            bindings: vec![CanonicalBinding {
                rollapp_id: RollappId::new("ra"),
                client_id: ClientId::new("c"),
            }],
        };
        assert!(genesis.validate().is_ok());
    }

    #[test]
    fn test_duplicate_ref_across_heights() {
        let genesis = GenesisState {
            queue: vec![entry(1, "ra", &[1]), entry(2, "ra", &[1])],
            ..Default::default()
        };
        assert_eq!(genesis.validate().unwrap_err().kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_orphan_pending_packet() {
        let genesis = GenesisState {
            packets: vec![pending(StateCommitmentRef::new("ra", 9))],
            ..Default::default()
        };
        assert_eq!(
            genesis.validate().unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
