//! # Settlement Service
//!
//! Orchestrates the three components over one store.
//!
//! ## Architecture
//!
//! ```text
//! submit_state_update ──→ FinalizationQueue::enqueue
//!                         PacketLifecycleStore::record_pending
//!
//! end_block / finalize_height ──→ FinalizationQueue::sweep_height
//!                                 PacketLifecycleStore::resolve_batch(FINALIZED)
//!
//! handle_fraud ──→ CanonicalClientBinding::resolve ──→ ProofVerifier
//!                  FinalizationQueue::revert
//!                  PacketLifecycleStore::resolve_batch(REVERTED)
//! ```
//!
//! Each mutating call holds the store's write lock, stages its writes in a
//! [`StagedWrites`] overlay and commits them with one `atomic_batch_write`.
//! On error the overlay is dropped and the store is untouched. Events are
//! published after the commit, with the lock released.

use crate::components::{
    BindOutcome, CanonicalClientBinding, FinalizationQueue, PacketCursor, PacketLifecycleStore,
};
use crate::config::SettlementConfig;
use crate::domain::{
    invariant_valid_height, ClientId, FinalizationQueueEntry, Height, PacketKey, PacketParams,
    PacketStatus, RollappId, RollappPacket, SettlementError, SettlementOutcome, SettlementResult,
    StateCommitmentRef, StateIndex,
};
use crate::events::SettlementEvent;
use crate::genesis::GenesisState;
use crate::metrics;
use crate::ports::{
    ChannelClientLookup, DisputeWindow, FraudEvidence, FraudOutcome, IncomingPacket,
    KeyValueStore, ProofVerdict, ProofVerifier, RevertSummary, SettlementApi, SettlementEventSink,
    StateReader, StateUpdate, SubmitReceipt, SweepSummary, TransferDataDecoder,
};
use crate::staging::StagedWrites;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lazy packet listing. Locks the store only while loading each packet.
pub type PacketQuery<S> = PacketCursor<Arc<RwLock<S>>>;

/// The settlement service.
pub struct SettlementService<S, W, V, D, E>
where
    S: KeyValueStore,
    W: DisputeWindow,
    V: ProofVerifier,
    D: TransferDataDecoder,
    E: SettlementEventSink,
{
    store: Arc<RwLock<S>>,
    window: W,
    verifier: V,
    decoder: D,
    events: E,
    config: SettlementConfig,
    queue: FinalizationQueue,
    packets: PacketLifecycleStore,
    bindings: CanonicalClientBinding,
}

impl<S, W, V, D, E> SettlementService<S, W, V, D, E>
where
    S: KeyValueStore,
    W: DisputeWindow,
    V: ProofVerifier,
    D: TransferDataDecoder,
    E: SettlementEventSink,
{
    /// Create a service owning `store`.
    pub fn new(
        store: S,
        window: W,
        verifier: V,
        decoder: D,
        events: E,
        config: SettlementConfig,
    ) -> SettlementResult<Self> {
        config.validate()?;
        let limits = config.limits();
        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            window,
            verifier,
            decoder,
            events,
            queue: FinalizationQueue::new(limits),
            packets: PacketLifecycleStore::new(limits),
            bindings: CanonicalClientBinding::new(limits),
            config,
        })
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// The block clock.
    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// The event sink.
    pub fn events(&self) -> &E {
        &self.events
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<RwLock<S>> {
        &self.store
    }

    /// Run `step` against a staged overlay and commit it atomically.
    fn run_step<T, F>(&self, operation: &'static str, step: F) -> SettlementResult<T>
    where
        F: FnOnce(&mut StagedWrites<'_, S>) -> SettlementResult<T>,
    {
        let mut store = self.store.write();
        let staged = {
            let mut tx = StagedWrites::new(&*store);
            step(&mut tx).map(|value| (value, tx.into_batch()))
        };
        match staged {
            Ok((value, batch)) => {
                if !batch.is_empty() {
                    debug!(operation, writes = batch.len(), "committing settlement step");
                    store.atomic_batch_write(batch)?;
                }
                Ok(value)
            }
            Err(e) => {
                warn!(operation, error = %e, "settlement step aborted");
                metrics::record_step_aborted(operation);
                Err(e)
            }
        }
    }

    fn decode_packet(
        &self,
        origin: &StateCommitmentRef,
        incoming: IncomingPacket,
    ) -> SettlementResult<RollappPacket> {
        let payload = self.decoder.decode(&incoming.payload)?;
        Ok(RollappPacket::pending(PacketParams {
            channel_id: incoming.channel_id,
            sequence: incoming.sequence,
            direction: incoming.direction,
            origin: origin.clone(),
            payload,
        }))
    }

    /// Sweep one height and finalize its packets inside a step.
    fn sweep(&self, tx: &mut StagedWrites<'_, S>, height: Height) -> SettlementResult<SweepSummary> {
        let groups = self.queue.sweep_height(tx, height)?;
        let mut settled = Vec::new();
        for entry in &groups {
            for commitment in &entry.refs {
                settled.extend(self.packets.resolve_batch(
                    tx,
                    commitment,
                    SettlementOutcome::Finalized,
                )?);
            }
        }
        Ok(SweepSummary {
            height,
            groups,
            settled,
        })
    }

    fn publish_sweep(&self, summary: &SweepSummary) {
        if summary.is_empty() {
            return;
        }
        info!(
            height = summary.height,
            rollapps = summary.groups.len(),
            refs = summary.ref_count(),
            packets = summary.settled.len(),
            "finalized height"
        );
        metrics::record_height_swept();
        metrics::record_packets_settled("FINALIZED", summary.settled.len() as u64);

        for entry in &summary.groups {
            for commitment in &entry.refs {
                self.events.publish(SettlementEvent::StateFinalized {
                    commitment: commitment.clone(),
                    creation_height: entry.creation_height,
                });
            }
        }
        self.publish_settled(&summary.settled, SettlementOutcome::Finalized);
    }

    fn publish_settled(&self, packets: &[RollappPacket], outcome: SettlementOutcome) {
        for packet in packets {
            self.events.publish(SettlementEvent::PacketSettled {
                key: packet.key,
                rollapp_id: packet.rollapp_id.clone(),
                counterparty_address: packet.counterparty_address.clone(),
                outcome,
            });
        }
    }

    fn canonical_client(
        &self,
        rollapp_id: &RollappId,
        claimed: Option<&ClientId>,
    ) -> SettlementResult<ClientId> {
        let store = self.store.read();
        match claimed {
            Some(client_id) => {
                CanonicalClientBinding::ensure_bound_to(&*store, rollapp_id, client_id)
            }
            None => CanonicalClientBinding::resolve(&*store, rollapp_id),
        }
    }

    /// Bind `rollapp_id` to the client behind `channel_id`.
    pub fn bind_from_channel<L: ChannelClientLookup + ?Sized>(
        &self,
        rollapp_id: &RollappId,
        channel_id: &str,
        lookup: &L,
    ) -> SettlementResult<(ClientId, BindOutcome)> {
        let client_id = lookup.client_for_channel(channel_id)?;
        let outcome = self.bind_client(rollapp_id, &client_id)?;
        Ok((client_id, outcome))
    }

    /// Write a legacy flat ref list recorded at `height` in grouped form.
    pub fn import_legacy_queue(
        &self,
        height: Height,
        refs: Vec<StateCommitmentRef>,
    ) -> SettlementResult<usize> {
        let groups = self.run_step("import_legacy_queue", |tx| {
            self.queue.import_flat(tx, height, refs)
        })?;
        info!(height, groups, "imported legacy queue");
        Ok(groups)
    }

    /// Recompute every packet index from the packet map.
    pub fn rebuild_indices(&self) -> SettlementResult<usize> {
        self.run_step("rebuild_indices", |tx| self.packets.rebuild_indices(tx))
    }

    /// Snapshot the full settlement state.
    pub fn export_genesis(&self) -> SettlementResult<GenesisState> {
        let store = self.store.read();
        Ok(GenesisState {
            queue: FinalizationQueue::all_entries(&*store)?,
            packets: PacketLifecycleStore::all_packets(&*store)?,
            bindings: CanonicalClientBinding::all_bindings(&*store)?,
        })
    }

    /// Load a snapshot into an empty store.
    pub fn init_genesis(&self, genesis: GenesisState) -> SettlementResult<()> {
        genesis.validate()?;
        let (entries, packets, bindings) = (
            genesis.queue.len(),
            genesis.packets.len(),
            genesis.bindings.len(),
        );
        self.run_step("init_genesis", |tx| {
            if !tx.prefix_scan(&[])?.is_empty() {
                return Err(SettlementError::Conflict(
                    "genesis requires an empty store".to_string(),
                ));
            }
            for binding in &genesis.bindings {
                self.bindings
                    .bind(tx, &binding.rollapp_id, &binding.client_id)?;
            }
            for entry in genesis.queue {
                for commitment in entry.refs {
                    self.queue
                        .enqueue(tx, entry.creation_height, entry.creation_height, commitment)?;
                }
            }
            for packet in genesis.packets {
                self.packets.restore(tx, packet)?;
            }
            Ok(())
        })?;
        info!(entries, packets, bindings, "initialized settlement genesis");
        Ok(())
    }
}

impl<S, W, V, D, E> SettlementApi for SettlementService<S, W, V, D, E>
where
    S: KeyValueStore,
    W: DisputeWindow,
    V: ProofVerifier,
    D: TransferDataDecoder,
    E: SettlementEventSink,
{
    type PacketQuery<'a>
        = PacketQuery<S>
    where
        Self: 'a;

    fn submit_state_update(&self, update: StateUpdate) -> SettlementResult<SubmitReceipt> {
        let height = self.window.current_height();
        let StateUpdate {
            commitment,
            packets,
        } = update;

        let receipt = self.run_step("submit_state_update", |tx| {
            self.queue.enqueue(tx, height, height, commitment.clone())?;
            let mut keys = Vec::with_capacity(packets.len());
            for incoming in packets {
                let packet = self.decode_packet(&commitment, incoming)?;
                keys.push(packet.key);
                self.packets.record_pending(tx, packet)?;
            }
            Ok(SubmitReceipt {
                commitment: commitment.clone(),
                creation_height: height,
                packets: keys,
            })
        })?;

        metrics::record_refs_enqueued(1);
        info!(
            rollapp_id = %receipt.commitment.rollapp_id,
            state_index = receipt.commitment.state_index,
            height,
            packets = receipt.packets.len(),
            "state update queued"
        );
        Ok(receipt)
    }

    fn record_packet(
        &self,
        origin: StateCommitmentRef,
        packet: IncomingPacket,
    ) -> SettlementResult<PacketKey> {
        let key = self.run_step("record_packet", |tx| {
            if FinalizationQueue::queued_height(&*tx, &origin)?.is_none() {
                return Err(SettlementError::NotFound(format!(
                    "state commitment {} is not queued",
                    origin
                )));
            }
            let packet = self.decode_packet(&origin, packet)?;
            let key = packet.key;
            self.packets.record_pending(tx, packet)?;
            Ok(key)
        })?;
        debug!(packet = %key, origin = %origin, "packet recorded");
        Ok(key)
    }

    fn finalize_height(&self, height: Height) -> SettlementResult<SweepSummary> {
        invariant_valid_height(height)?;
        if !self.window.is_window_elapsed(height) {
            return Err(SettlementError::InvalidArgument(format!(
                "dispute window of height {} still open at {}",
                height,
                self.window.current_height()
            )));
        }
        let summary = self.run_step("finalize_height", |tx| self.sweep(tx, height))?;
        self.publish_sweep(&summary);
        Ok(summary)
    }

    fn end_block(&self) -> SettlementResult<Vec<SweepSummary>> {
        let summaries = self.run_step("end_block", |tx| {
            let heights =
                FinalizationQueue::elapsed_heights(&*tx, |h| self.window.is_window_elapsed(h))?;
            let mut summaries = Vec::with_capacity(heights.len());
            for height in heights {
                summaries.push(self.sweep(tx, height)?);
            }
            Ok(summaries)
        })?;
        for summary in &summaries {
            self.publish_sweep(summary);
        }
        Ok(summaries)
    }

    fn handle_fraud(&self, evidence: FraudEvidence) -> SettlementResult<FraudOutcome> {
        let client_id = self.canonical_client(&evidence.rollapp_id, evidence.client_id.as_ref())?;
        let commitment = StateCommitmentRef {
            rollapp_id: evidence.rollapp_id.clone(),
            state_index: evidence.state_index,
        };

        match self
            .verifier
            .verify_state(&client_id, &commitment, &evidence.proof)?
        {
            ProofVerdict::Accepted => {
                metrics::record_fraud_evidence("dismissed");
                warn!(
                    rollapp_id = %evidence.rollapp_id,
                    state_index = evidence.state_index,
                    client_id = %client_id,
                    "fraud evidence rejected by verifier"
                );
                Ok(FraudOutcome::Dismissed)
            }
            ProofVerdict::Rejected => {
                metrics::record_fraud_evidence("proven");
                warn!(
                    rollapp_id = %evidence.rollapp_id,
                    state_index = evidence.state_index,
                    client_id = %client_id,
                    "fraud proven, reverting rollapp"
                );
                let summary = self.revert_rollapp(&evidence.rollapp_id, evidence.state_index)?;
                Ok(FraudOutcome::Reverted(summary))
            }
        }
    }

    fn revert_rollapp(
        &self,
        rollapp_id: &RollappId,
        from_state_index: StateIndex,
    ) -> SettlementResult<RevertSummary> {
        let summary = self.run_step("revert_rollapp", |tx| {
            let refs = match self.queue.revert(tx, rollapp_id, from_state_index) {
                Ok(refs) => refs,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            let mut reverted = Vec::new();
            for commitment in &refs {
                reverted.extend(self.packets.resolve_batch(
                    tx,
                    commitment,
                    SettlementOutcome::Reverted,
                )?);
            }
            Ok(RevertSummary {
                rollapp_id: rollapp_id.clone(),
                from_state_index,
                refs,
                reverted,
            })
        })?;

        if summary.is_empty() {
            debug!(rollapp_id = %rollapp_id, from_state_index, "nothing queued to revert");
            return Ok(summary);
        }

        metrics::record_revert();
        metrics::record_packets_settled("REVERTED", summary.reverted.len() as u64);
        info!(
            rollapp_id = %rollapp_id,
            from_state_index,
            refs = summary.refs.len(),
            packets = summary.reverted.len(),
            "rollapp reverted"
        );
        self.events.publish(SettlementEvent::RollappReverted {
            rollapp_id: rollapp_id.clone(),
            from_state_index,
            reverted_refs: summary.refs.len(),
            reverted_packets: summary.reverted.len(),
        });
        self.publish_settled(&summary.reverted, SettlementOutcome::Reverted);
        Ok(summary)
    }

    fn verify_state_commitment(
        &self,
        rollapp_id: &RollappId,
        state_index: StateIndex,
        proof: &[u8],
    ) -> SettlementResult<ProofVerdict> {
        let client_id = self.canonical_client(rollapp_id, None)?;
        let commitment = StateCommitmentRef {
            rollapp_id: rollapp_id.clone(),
            state_index,
        };
        self.verifier.verify_state(&client_id, &commitment, proof)
    }

    fn bind_client(
        &self,
        rollapp_id: &RollappId,
        client_id: &ClientId,
    ) -> SettlementResult<BindOutcome> {
        let outcome = self.run_step("bind_client", |tx| {
            self.bindings.bind(tx, rollapp_id, client_id)
        })?;
        if outcome == BindOutcome::Bound {
            self.events.publish(SettlementEvent::ClientBound {
                rollapp_id: rollapp_id.clone(),
                client_id: client_id.clone(),
            });
        }
        Ok(outcome)
    }

    fn resolve_client(&self, rollapp_id: &RollappId) -> SettlementResult<ClientId> {
        CanonicalClientBinding::resolve(&*self.store.read(), rollapp_id)
    }

    fn list_by_status(&self, status: PacketStatus) -> SettlementResult<Self::PacketQuery<'_>> {
        PacketLifecycleStore::list_by_status(Arc::clone(&self.store), status)
    }

    fn list_by_address(&self, address: &str) -> SettlementResult<Self::PacketQuery<'_>> {
        PacketLifecycleStore::list_by_address(Arc::clone(&self.store), address)
    }

    fn get_packet(&self, key: &PacketKey) -> SettlementResult<RollappPacket> {
        PacketLifecycleStore::get(&*self.store.read(), key)
    }

    fn pending_entries(&self, height: Height) -> SettlementResult<Vec<FinalizationQueueEntry>> {
        FinalizationQueue::entries_at(&*self.store.read(), height)
    }

    fn state_digest(&self) -> SettlementResult<String> {
        let store = self.store.read();
        let mut hasher = Sha256::new();
        for (key, value) in store.prefix_scan(&[])? {
            hasher.update((key.len() as u32).to_be_bytes());
            hasher.update(&key);
            hasher.update((value.len() as u32).to_be_bytes());
            hasher.update(&value);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        FixedDisputePeriod, InMemoryKVStore, JsonTransferDecoder, RecordingEventSink,
    };
    use crate::domain::PacketDirection;
    use crate::ports::MockProofVerifier;

    type TestService = SettlementService<
        InMemoryKVStore,
        FixedDisputePeriod,
        MockProofVerifier,
        JsonTransferDecoder,
        RecordingEventSink,
    >;

    fn service() -> TestService {
        SettlementService::new(
            InMemoryKVStore::new(),
            FixedDisputePeriod::starting_at(3, 10),
            MockProofVerifier::accept_all(),
            JsonTransferDecoder,
            RecordingEventSink::new(),
            SettlementConfig::for_testing(),
        )
        .unwrap()
    }

    fn incoming(seq: u64) -> IncomingPacket {
        IncomingPacket {
            channel_id: "channel-0".into(),
            sequence: seq,
            direction: PacketDirection::OnRecv,
            payload: br#"{"denom":"arax","amount":"1","sender":"rol1s","receiver":"dym1r"}"#
                .to_vec(),
        }
    }

    #[test]
    fn test_rejects_zero_dispute_period() {
        let config = SettlementConfig {
            dispute_period_blocks: 0,
            ..SettlementConfig::for_testing()
        };
        let result = SettlementService::new(
            InMemoryKVStore::new(),
            FixedDisputePeriod::new(0),
            MockProofVerifier::accept_all(),
            JsonTransferDecoder,
            RecordingEventSink::new(),
            config,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_payload_aborts_whole_update() {
        let svc = service();
        let digest = svc.state_digest().unwrap();
        let mut bad = incoming(2);
        bad.payload = b"{".to_vec();
        let err = svc
            .submit_state_update(StateUpdate {
                commitment: StateCommitmentRef::new("ra", 1),
                packets: vec![incoming(1), bad],
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::InvalidArgument);
        assert_eq!(svc.state_digest().unwrap(), digest);
        assert!(svc.pending_entries(10).unwrap().is_empty());
    }

    #[test]
    fn test_finalize_before_window_is_rejected() {
        let svc = service();
        svc.submit_state_update(StateUpdate {
            commitment: StateCommitmentRef::new("ra", 1),
            packets: vec![],
        })
        .unwrap();
        assert!(svc.finalize_height(10).is_err());
        svc.window().advance_to(13);
        let summary = svc.finalize_height(10).unwrap();
        assert_eq!(summary.ref_count(), 1);
        assert!(svc.finalize_height(10).unwrap().is_empty());
    }

    #[test]
    fn test_record_packet_requires_queued_origin() {
        let svc = service();
        let err = svc
            .record_packet(StateCommitmentRef::new("ra", 1), incoming(1))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
