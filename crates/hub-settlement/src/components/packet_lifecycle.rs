//! # Packet Lifecycle Store
//!
//! Owns delayed packets and their derived indices.
//!
//! Every packet is written with three index entries next to it:
//!
//! - by status: moved on every transition
//! - by counterparty address: written once, kept for the packet's lifetime
//! - by originating commitment: present while PENDING, used by
//!   [`PacketLifecycleStore::resolve_batch`]
//!
//! Index writes share the staged step of the primary write, so the indices
//! are always the exact projection of the packet map.

use super::cursor::{PacketCursor, ReadSource};
use super::{decode, encode};
use crate::domain::keys;
use crate::domain::{
    counterparty_address, PacketKey, PacketStatus, RollappPacket, SettlementError,
    SettlementOutcome, SettlementResult, StateCommitmentRef, ValidationLimits,
};
use crate::ports::StateReader;
use crate::staging::StagedWrites;
use tracing::{debug, info};

/// Load a packet by key, if present.
pub fn load_packet<R: StateReader + ?Sized>(
    reader: &R,
    key: &PacketKey,
) -> SettlementResult<Option<RollappPacket>> {
    reader
        .get(&keys::packet_key(key))?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn keys_under<R: StateReader + ?Sized>(reader: &R, prefix: &[u8]) -> SettlementResult<Vec<PacketKey>> {
    reader
        .prefix_scan(prefix)?
        .iter()
        .map(|(k, _)| keys::packet_key_suffix(k))
        .collect()
}

/// Owner of the packet map and its indices.
#[derive(Clone, Debug, Default)]
pub struct PacketLifecycleStore {
    limits: ValidationLimits,
}

impl PacketLifecycleStore {
    /// Store enforcing `limits` on incoming packets.
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    fn validate(&self, packet: &RollappPacket) -> SettlementResult<()> {
        self.limits.check_rollapp_id(&packet.rollapp_id)?;
        self.limits.check_address(&packet.counterparty_address)?;
        if packet.origin.rollapp_id != packet.rollapp_id {
            return Err(SettlementError::InvalidArgument(format!(
                "packet of {} tied to foreign commitment {}",
                packet.rollapp_id, packet.origin
            )));
        }
        if packet.key != PacketKey::derive(&packet.channel_id, packet.sequence, packet.direction) {
            return Err(SettlementError::InvalidArgument(format!(
                "packet key {} does not match {}/{}/{}",
                packet.key, packet.channel_id, packet.sequence, packet.direction
            )));
        }
        if packet.counterparty_address != counterparty_address(packet.direction, &packet.payload) {
            return Err(SettlementError::InvalidArgument(format!(
                "counterparty of {} packet {} does not follow direction policy",
                packet.direction, packet.key
            )));
        }
        Ok(())
    }

    fn write_indices<S: StateReader + ?Sized>(
        tx: &mut StagedWrites<'_, S>,
        packet: &RollappPacket,
    ) {
        tx.put(keys::status_index_key(packet.status, &packet.key), Vec::new());
        tx.put(
            keys::address_index_key(&packet.counterparty_address, &packet.key),
            Vec::new(),
        );
        if packet.status == PacketStatus::Pending {
            tx.put(
                keys::commitment_index_key(&packet.origin, &packet.key),
                Vec::new(),
            );
        }
    }

    /// Insert a new PENDING packet with its index entries.
    pub fn record_pending<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        packet: RollappPacket,
    ) -> SettlementResult<()> {
        if packet.status != PacketStatus::Pending {
            return Err(SettlementError::InvalidArgument(format!(
                "new packet {} must be PENDING, got {}",
                packet.key, packet.status
            )));
        }
        self.validate(&packet)?;
        self.insert(tx, packet)
    }

    fn insert<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        packet: RollappPacket,
    ) -> SettlementResult<()> {
        let primary = keys::packet_key(&packet.key);
        if tx.get(&primary)?.is_some() {
            return Err(SettlementError::Conflict(format!(
                "packet {} already recorded",
                packet.key
            )));
        }
        Self::write_indices(tx, &packet);
        tx.put(primary, encode(&packet)?);
        debug!(
            packet = %packet.key,
            rollapp_id = %packet.rollapp_id,
            status = %packet.status,
            "recorded packet"
        );
        Ok(())
    }

    /// Restore a packet in any status, e.g. from genesis.
    ///
    /// Terminal packets are stored as they are; they never re-enter the
    /// commitment join.
    pub fn restore<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        packet: RollappPacket,
    ) -> SettlementResult<()> {
        self.validate(&packet)?;
        self.insert(tx, packet)
    }

    fn transition<S: StateReader + ?Sized>(
        tx: &mut StagedWrites<'_, S>,
        key: &PacketKey,
        outcome: SettlementOutcome,
    ) -> SettlementResult<RollappPacket> {
        let mut packet = load_packet(&*tx, key)?
            .ok_or_else(|| SettlementError::NotFound(format!("packet {}", key)))?;
        let previous = packet.status;
        packet.transition_to(outcome.status())?;

        tx.delete(keys::status_index_key(previous, key));
        tx.put(keys::status_index_key(packet.status, key), Vec::new());
        tx.delete(keys::commitment_index_key(&packet.origin, key));
        tx.put(keys::packet_key(key), encode(&packet)?);
        Ok(packet)
    }

    /// PENDING -> FINALIZED.
    pub fn finalize<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        key: &PacketKey,
    ) -> SettlementResult<RollappPacket> {
        Self::transition(tx, key, SettlementOutcome::Finalized)
    }

    /// PENDING -> REVERTED.
    pub fn revert<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        key: &PacketKey,
    ) -> SettlementResult<RollappPacket> {
        Self::transition(tx, key, SettlementOutcome::Reverted)
    }

    /// Apply `outcome` to every PENDING packet tied to `commitment`.
    ///
    /// Returns the resolved packets in key order; none is fine.
    pub fn resolve_batch<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        commitment: &StateCommitmentRef,
        outcome: SettlementOutcome,
    ) -> SettlementResult<Vec<RollappPacket>> {
        let pending = keys_under(&*tx, &keys::commitment_index_prefix(commitment))?;
        let mut resolved = Vec::with_capacity(pending.len());
        for key in pending {
            resolved.push(Self::transition(tx, &key, outcome)?);
        }
        if !resolved.is_empty() {
            debug!(
                commitment = %commitment,
                outcome = %outcome,
                packets = resolved.len(),
                "resolved packet batch"
            );
        }
        Ok(resolved)
    }

    /// Drop and recompute every index from the packet map.
    ///
    /// Stored packets are never rewritten. One whose counterparty does not
    /// follow the direction policy fails the step with `InvalidArgument`.
    /// Returns the packet count.
    pub fn rebuild_indices<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
    ) -> SettlementResult<usize> {
        let packets = Self::all_packets(&*tx)?;
        for packet in &packets {
            let derived = counterparty_address(packet.direction, &packet.payload);
            if derived != packet.counterparty_address {
                return Err(SettlementError::InvalidArgument(format!(
                    "stored {} packet {} has counterparty {} but policy derives {}",
                    packet.status, packet.key, packet.counterparty_address, derived
                )));
            }
        }

        for prefix in [
            keys::PACKET_BY_STATUS_PREFIX,
            keys::PACKET_BY_ADDRESS_PREFIX,
            keys::PACKET_BY_COMMITMENT_PREFIX,
        ] {
            for (key, _) in tx.prefix_scan(&[prefix])? {
                tx.delete(key);
            }
        }
        for packet in &packets {
            Self::write_indices(tx, packet);
        }
        info!(packets = packets.len(), "rebuilt packet indices");
        Ok(packets.len())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Packet by key. Unknown keys are `NotFound`.
    pub fn get<R: StateReader + ?Sized>(reader: &R, key: &PacketKey) -> SettlementResult<RollappPacket> {
        load_packet(reader, key)?.ok_or_else(|| SettlementError::NotFound(format!("packet {}", key)))
    }

    /// Keys currently in `status`.
    pub fn keys_by_status<R: StateReader + ?Sized>(
        reader: &R,
        status: PacketStatus,
    ) -> SettlementResult<Vec<PacketKey>> {
        keys_under(reader, &keys::status_index_prefix(status))
    }

    /// Keys whose counterparty is `address`, any status.
    pub fn keys_by_address<R: StateReader + ?Sized>(
        reader: &R,
        address: &str,
    ) -> SettlementResult<Vec<PacketKey>> {
        keys_under(reader, &keys::address_index_prefix(address))
    }

    /// Lazy listing of packets in `status`.
    pub fn list_by_status<P: ReadSource>(
        source: P,
        status: PacketStatus,
    ) -> SettlementResult<PacketCursor<P>> {
        let keys = source.read_with(|reader| Self::keys_by_status(reader, status))?;
        Ok(PacketCursor::new(source, keys))
    }

    /// Lazy listing of packets whose counterparty is `address`.
    pub fn list_by_address<P: ReadSource>(
        source: P,
        address: &str,
    ) -> SettlementResult<PacketCursor<P>> {
        let keys = source.read_with(|reader| Self::keys_by_address(reader, address))?;
        Ok(PacketCursor::new(source, keys))
    }

    /// Every packet in key order.
    pub fn all_packets<R: StateReader + ?Sized>(reader: &R) -> SettlementResult<Vec<RollappPacket>> {
        reader
            .prefix_scan(&keys::packet_prefix())?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryKVStore;
    use crate::domain::{ErrorKind, PacketDirection, PacketParams, TransferPacketData};
    use crate::ports::KeyValueStore;

    fn packet(seq: u64, direction: PacketDirection, idx: u64) -> RollappPacket {
        RollappPacket::pending(PacketParams {
            channel_id: "channel-0".into(),
            sequence: seq,
            direction,
            origin: StateCommitmentRef::new("rollapp-a", idx),
            payload: TransferPacketData {
                denom: "arax".into(),
                amount: "1".into(),
                sender: "rol1sender".into(),
                receiver: "dym1addr".into(),
                memo: String::new(),
            },
        })
    }

    fn apply(store: &mut InMemoryKVStore, f: impl FnOnce(&mut StagedWrites<'_, InMemoryKVStore>)) {
        let batch = {
            let mut tx = StagedWrites::new(&*store);
            f(&mut tx);
            tx.into_batch()
        };
        store.atomic_batch_write(batch).unwrap();
    }

    #[test]
    fn test_record_and_list() {
        let mut store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        apply(&mut store, |tx| {
            packets.record_pending(tx, packet(1, PacketDirection::OnRecv, 1)).unwrap();
            packets.record_pending(tx, packet(2, PacketDirection::OnAck, 1)).unwrap();
        });

        let pending = PacketLifecycleStore::list_by_status(&store, PacketStatus::Pending).unwrap();
        assert_eq!(pending.len(), 2);
        let by_receiver: Vec<_> = PacketLifecycleStore::list_by_address(&store, "dym1addr")
            .unwrap()
            .collect::<SettlementResult<_>>()
            .unwrap();
        assert_eq!(by_receiver.len(), 1);
        assert_eq!(by_receiver[0].direction, PacketDirection::OnRecv);
        assert_eq!(
            PacketLifecycleStore::keys_by_address(&store, "rol1sender").unwrap().len(),
            1
        );
    }

    #[test]
    fn test_duplicate_and_non_pending_rejected() {
        let store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        let mut tx = StagedWrites::new(&store);
        packets.record_pending(&mut tx, packet(1, PacketDirection::OnRecv, 1)).unwrap();
        let err = packets
            .record_pending(&mut tx, packet(1, PacketDirection::OnRecv, 2))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let mut done = packet(9, PacketDirection::OnRecv, 1);
        done.status = PacketStatus::Finalized;
        let err = packets.record_pending(&mut tx, done).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_tampered_counterparty_rejected() {
        let store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        let mut tx = StagedWrites::new(&store);
        let mut p = packet(1, PacketDirection::OnTimeout, 1);
        p.counterparty_address = "dym1addr".into();
        let err = packets.record_pending(&mut tx, p).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_transitions_move_status_index_only() {
        let mut store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        let p = packet(1, PacketDirection::OnRecv, 1);
        let key = p.key;
        apply(&mut store, |tx| packets.record_pending(tx, p).unwrap());
        apply(&mut store, |tx| {
            packets.finalize(tx, &key).unwrap();
        });

        assert!(PacketLifecycleStore::keys_by_status(&store, PacketStatus::Pending)
            .unwrap()
            .is_empty());
        assert_eq!(
            PacketLifecycleStore::keys_by_status(&store, PacketStatus::Finalized).unwrap(),
            vec![key]
        );
        assert_eq!(
            PacketLifecycleStore::keys_by_address(&store, "dym1addr").unwrap(),
            vec![key]
        );

        let mut tx = StagedWrites::new(&store);
        let err = packets.revert(&mut tx, &key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let unknown = PacketKey::derive("channel-9", 1, PacketDirection::OnRecv);
        assert!(packets.finalize(&mut tx, &unknown).unwrap_err().is_not_found());
    }

    #[test]
    fn test_resolve_batch_only_touches_its_commitment() {
        let mut store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        apply(&mut store, |tx| {
            packets.record_pending(tx, packet(1, PacketDirection::OnRecv, 1)).unwrap();
            packets.record_pending(tx, packet(2, PacketDirection::OnRecv, 1)).unwrap();
            packets.record_pending(tx, packet(3, PacketDirection::OnRecv, 2)).unwrap();
        });
        apply(&mut store, |tx| {
            let resolved = packets
                .resolve_batch(tx, &StateCommitmentRef::new("rollapp-a", 1), SettlementOutcome::Reverted)
                .unwrap();
            assert_eq!(resolved.len(), 2);
            assert!(resolved.iter().all(|p| p.status == PacketStatus::Reverted));
        });

        assert_eq!(
            PacketLifecycleStore::keys_by_status(&store, PacketStatus::Pending).unwrap().len(),
            1
        );
        let mut tx = StagedWrites::new(&store);
        let again = packets
            .resolve_batch(&mut tx, &StateCommitmentRef::new("rollapp-a", 1), SettlementOutcome::Finalized)
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_rebuild_indices_restores_projection() {
        let mut store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        let p = packet(1, PacketDirection::OnRecv, 1);
        let key = p.key;
        apply(&mut store, |tx| packets.record_pending(tx, p).unwrap());

        // Lose the address index entry, then rebuild.
        store.delete(&keys::address_index_key("dym1addr", &key)).unwrap();
        assert!(PacketLifecycleStore::keys_by_address(&store, "dym1addr").unwrap().is_empty());

        apply(&mut store, |tx| {
            assert_eq!(packets.rebuild_indices(tx).unwrap(), 1);
        });
        assert_eq!(
            PacketLifecycleStore::keys_by_address(&store, "dym1addr").unwrap(),
            vec![key]
        );
        assert_eq!(
            PacketLifecycleStore::keys_by_status(&store, PacketStatus::Pending).unwrap(),
            vec![key]
        );
    }

    #[test]
    fn test_rebuild_rejects_policy_violation_without_rewriting() {
        let mut store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        let p = packet(1, PacketDirection::OnRecv, 1);
        let key = p.key;
        apply(&mut store, |tx| packets.record_pending(tx, p).unwrap());
        apply(&mut store, |tx| {
            packets.finalize(tx, &key).unwrap();
        });

        let mut tampered = PacketLifecycleStore::get(&store, &key).unwrap();
        tampered.counterparty_address = "dym1someoneelse".into();
        store
            .put(&keys::packet_key(&key), &encode(&tampered).unwrap())
            .unwrap();

        let mut tx = StagedWrites::new(&store);
        let err = packets.rebuild_indices(&mut tx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        drop(tx);
        assert_eq!(
            PacketLifecycleStore::get(&store, &key).unwrap().counterparty_address,
            "dym1someoneelse"
        );
    }

    #[test]
    fn test_empty_memo_packet_reads_back_through_lifecycle() {
        let mut store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        let p = packet(3, PacketDirection::OnTimeout, 2);
        assert!(p.payload.memo.is_empty());
        let key = p.key;
        apply(&mut store, |tx| packets.record_pending(tx, p.clone()).unwrap());
        assert_eq!(PacketLifecycleStore::get(&store, &key).unwrap(), p);

        apply(&mut store, |tx| {
            let reverted = packets
                .resolve_batch(tx, &StateCommitmentRef::new("rollapp-a", 2), SettlementOutcome::Reverted)
                .unwrap();
            assert_eq!(reverted.len(), 1);
        });
        let listed: Vec<_> = PacketLifecycleStore::list_by_address(&store, "rol1sender")
            .unwrap()
            .collect::<SettlementResult<_>>()
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, PacketStatus::Reverted);
        assert!(listed[0].payload.memo.is_empty());
    }

    #[test]
    fn test_cursor_rewinds() {
        let mut store = InMemoryKVStore::new();
        let packets = PacketLifecycleStore::default();
        apply(&mut store, |tx| {
            packets.record_pending(tx, packet(1, PacketDirection::OnRecv, 1)).unwrap();
        });
        let mut cursor = PacketLifecycleStore::list_by_status(&store, PacketStatus::Pending).unwrap();
        assert!(cursor.next().is_some());
        assert!(cursor.next().is_none());
        cursor.rewind();
        assert_eq!(cursor.count(), 1);
    }
}
