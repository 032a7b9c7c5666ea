//! # Inbound Ports (Driving Ports)
//!
//! The API the block-processing driver and query surfaces call.
//!
//! All mutating calls are synchronous and run as one atomic step: either
//! everything they change becomes visible, or nothing does.

use crate::components::BindOutcome;
use crate::domain::{
    ClientId, FinalizationQueueEntry, Height, PacketDirection, PacketKey, PacketStatus,
    RollappId, RollappPacket, SettlementResult, StateCommitmentRef, StateIndex,
};
use crate::ports::outbound::ProofVerdict;
use serde::{Deserialize, Serialize};

/// A rollapp state update together with the packets it carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// The claimed state submission.
    pub commitment: StateCommitmentRef,
    /// Packets proven against this state, recorded as PENDING.
    #[serde(default)]
    pub packets: Vec<IncomingPacket>,
}

/// A packet arriving from a rollapp, payload still encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingPacket {
    /// Channel on the hub side.
    pub channel_id: String,
    /// Packet sequence on that channel.
    pub sequence: u64,
    /// Packet direction.
    pub direction: PacketDirection,
    /// Opaque transfer payload.
    pub payload: Vec<u8>,
}

/// Evidence that a rollapp's claimed history is wrong.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudEvidence {
    /// Accused rollapp.
    pub rollapp_id: RollappId,
    /// Client the evidence was produced against, if stated.
    #[serde(default)]
    pub client_id: Option<ClientId>,
    /// First disputed state index.
    pub state_index: StateIndex,
    /// Proof handed to the verifier.
    pub proof: Vec<u8>,
}

/// Result of [`SettlementApi::submit_state_update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub commitment: StateCommitmentRef,
    /// Height the commitment was queued at.
    pub creation_height: Height,
    /// Keys of the packets recorded with it.
    pub packets: Vec<PacketKey>,
}

/// One swept height.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub height: Height,
    /// Swept entries, ordered by rollapp id.
    pub groups: Vec<FinalizationQueueEntry>,
    /// Packets moved to FINALIZED.
    pub settled: Vec<RollappPacket>,
}

impl SweepSummary {
    /// True when the height had nothing queued.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of refs finalized.
    pub fn ref_count(&self) -> usize {
        self.groups.iter().map(|g| g.refs.len()).sum()
    }
}

/// Result of a rollapp revert. Empty when nothing was queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevertSummary {
    pub rollapp_id: RollappId,
    pub from_state_index: StateIndex,
    /// Refs removed from the queue.
    pub refs: Vec<StateCommitmentRef>,
    /// Packets moved to REVERTED.
    pub reverted: Vec<RollappPacket>,
}

impl RevertSummary {
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Result of [`SettlementApi::handle_fraud`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FraudOutcome {
    /// The verifier accepted the claimed state; nothing changed.
    Dismissed,
    /// The claimed history was rejected and reverted.
    Reverted(RevertSummary),
}

/// Primary API of the settlement core.
pub trait SettlementApi {
    /// Lazy packet listing.
    type PacketQuery<'a>: Iterator<Item = SettlementResult<RollappPacket>>
    where
        Self: 'a;

    /// Queue a state update at the current height and record its packets.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: malformed ids, payload or height
    /// - `Conflict`: ref already queued or packet already recorded
    fn submit_state_update(&self, update: StateUpdate) -> SettlementResult<SubmitReceipt>;

    /// Record one packet against an already queued commitment.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: `origin` is not queued
    /// - `Conflict`: packet already recorded
    fn record_packet(
        &self,
        origin: StateCommitmentRef,
        packet: IncomingPacket,
    ) -> SettlementResult<PacketKey>;

    /// Sweep `height` and finalize everything tied to it.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: the dispute window of `height` is still open
    fn finalize_height(&self, height: Height) -> SettlementResult<SweepSummary>;

    /// Sweep every queued height whose window has elapsed, ascending.
    fn end_block(&self) -> SettlementResult<Vec<SweepSummary>>;

    /// Verify fraud evidence through the canonical client and revert on
    /// rejection.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: rollapp has no canonical client
    /// - `InvalidArgument`: evidence names a non-canonical client
    fn handle_fraud(&self, evidence: FraudEvidence) -> SettlementResult<FraudOutcome>;

    /// Revert queued refs of `rollapp_id` from `from_state_index` on.
    /// Nothing queued is an empty summary.
    fn revert_rollapp(
        &self,
        rollapp_id: &RollappId,
        from_state_index: StateIndex,
    ) -> SettlementResult<RevertSummary>;

    /// Verify a state proof against the rollapp's canonical client.
    fn verify_state_commitment(
        &self,
        rollapp_id: &RollappId,
        state_index: StateIndex,
        proof: &[u8],
    ) -> SettlementResult<ProofVerdict>;

    /// Bind a rollapp to its canonical client.
    fn bind_client(&self, rollapp_id: &RollappId, client_id: &ClientId)
        -> SettlementResult<BindOutcome>;

    /// Canonical client of `rollapp_id`.
    fn resolve_client(&self, rollapp_id: &RollappId) -> SettlementResult<ClientId>;

    /// Packets in `status`.
    fn list_by_status(&self, status: PacketStatus) -> SettlementResult<Self::PacketQuery<'_>>;

    /// Packets whose counterparty is `address`, any status.
    fn list_by_address(&self, address: &str) -> SettlementResult<Self::PacketQuery<'_>>;

    /// Packet by key.
    fn get_packet(&self, key: &PacketKey) -> SettlementResult<RollappPacket>;

    /// Queue entries at `height`.
    fn pending_entries(&self, height: Height) -> SettlementResult<Vec<FinalizationQueueEntry>>;

    /// SHA-256 over the whole store, hex encoded.
    fn state_digest(&self) -> SettlementResult<String>;
}
