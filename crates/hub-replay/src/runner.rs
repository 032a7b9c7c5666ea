//! Drives a [`SettlementService`] from scripted steps.

use crate::script::{Op, ScriptPacket, Step};
use anyhow::{bail, Result};
use hub_settlement::adapters::{
    FixedDisputePeriod, InMemoryKVStore, JsonTransferDecoder, StaticChannelDirectory,
    TracingEventSink, TrustedRootVerifier,
};
use hub_settlement::ports::{
    DisputeWindow, FraudEvidence, FraudOutcome, IncomingPacket, SettlementApi, StateUpdate,
};
use hub_settlement::{
    ClientId, PacketStatus, RollappId, RollappPacket, SettlementConfig, SettlementError,
    SettlementResult, SettlementService, StateCommitmentRef,
};
use std::sync::Arc;
use tracing::debug;

type ReplayService = SettlementService<
    InMemoryKVStore,
    Arc<FixedDisputePeriod>,
    Arc<TrustedRootVerifier>,
    JsonTransferDecoder,
    TracingEventSink,
>;

/// In-memory hub that scripted steps run against.
pub struct Replay {
    service: ReplayService,
    clock: Arc<FixedDisputePeriod>,
    roots: Arc<TrustedRootVerifier>,
    directory: StaticChannelDirectory,
}

impl Replay {
    /// Fresh hub with the clock at height 0.
    pub fn new(config: SettlementConfig) -> SettlementResult<Self> {
        let clock = Arc::new(FixedDisputePeriod::new(config.dispute_period_blocks));
        let roots = Arc::new(TrustedRootVerifier::new());
        let service = SettlementService::new(
            InMemoryKVStore::new(),
            Arc::clone(&clock),
            Arc::clone(&roots),
            JsonTransferDecoder,
            TracingEventSink,
            config,
        )?;
        Ok(Self {
            service,
            clock,
            roots,
            directory: StaticChannelDirectory::new(),
        })
    }

    pub fn service(&self) -> &ReplayService {
        &self.service
    }

    /// Run one step, checking its expected failure class.
    pub fn run_step(&mut self, line_no: usize, step: Step) -> Result<String> {
        debug!(line = line_no, op = ?step.op, "replaying step");
        match (self.apply(step.op), step.expect_error) {
            (Ok(out), None) => Ok(out),
            (Err(e), Some(kind)) if e.kind() == kind => Ok(format!("failed as expected: {}", e)),
            (Err(e), None) => Err(anyhow::Error::new(e).context(format!("line {}", line_no))),
            (Err(e), Some(kind)) => {
                bail!("line {}: expected {:?} error, got {}", line_no, kind, e)
            }
            (Ok(out), Some(kind)) => {
                bail!("line {}: expected {:?} error, step succeeded: {}", line_no, kind, out)
            }
        }
    }

    fn apply(&mut self, op: Op) -> SettlementResult<String> {
        match op {
            Op::Channel {
                channel,
                connection,
                client,
            } => {
                let line = format!("{} -> {} -> {}", channel, connection, client);
                self.directory.add_channel(channel, connection.clone());
                self.directory.add_connection(connection, ClientId::new(client));
                Ok(line)
            }
            Op::Bind {
                rollapp,
                client,
                channel,
            } => {
                let rollapp = RollappId::new(rollapp);
                let (client, outcome) = match (client, channel) {
                    (Some(client), _) => {
                        let client = ClientId::new(client);
                        let outcome = self.service.bind_client(&rollapp, &client)?;
                        (client, outcome)
                    }
                    (None, Some(channel)) => {
                        self.service
                            .bind_from_channel(&rollapp, &channel, &self.directory)?
                    }
                    (None, None) => {
                        return Err(SettlementError::InvalidArgument(
                            "bind needs a client or a channel".into(),
                        ))
                    }
                };
                Ok(format!("{} bound to {} ({:?})", rollapp, client, outcome))
            }
            Op::Trust {
                client,
                rollapp,
                index,
                root,
            } => {
                let commitment = StateCommitmentRef::new(rollapp, index);
                let line = format!("{} trusts root {} for {}", client, root, commitment);
                self.roots
                    .trust(ClientId::new(client), commitment, decode_hex(&root)?);
                Ok(line)
            }
            Op::Submit {
                rollapp,
                index,
                packets,
            } => {
                let packets = packets
                    .into_iter()
                    .map(incoming)
                    .collect::<SettlementResult<Vec<_>>>()?;
                let receipt = self.service.submit_state_update(StateUpdate {
                    commitment: StateCommitmentRef::new(rollapp, index),
                    packets,
                })?;
                Ok(format!(
                    "queued {} at height {} with {} packet(s)",
                    receipt.commitment,
                    receipt.creation_height,
                    receipt.packets.len()
                ))
            }
            Op::Packet {
                rollapp,
                index,
                packet,
            } => {
                let origin = StateCommitmentRef::new(rollapp, index);
                let key = self.service.record_packet(origin.clone(), incoming(packet)?)?;
                Ok(format!("recorded {} against {}", key, origin))
            }
            Op::Advance { to, blocks } => {
                match (to, blocks) {
                    (Some(height), _) => self.clock.advance_to(height),
                    (None, None) => {
                        self.clock.next_block();
                    }
                    (None, Some(blocks)) => {
                        let blocks = i64::try_from(blocks).map_err(|_| {
                            SettlementError::InvalidArgument(
                                "block count out of range".into(),
                            )
                        })?;
                        self.clock
                            .advance_to(self.clock.current_height().saturating_add(blocks));
                    }
                }
                Ok(format!("height {}", self.clock.current_height()))
            }
            Op::EndBlock => {
                let summaries = self.service.end_block()?;
                if summaries.is_empty() {
                    return Ok("nothing to finalize".into());
                }
                let parts: Vec<String> = summaries
                    .iter()
                    .map(|s| {
                        format!(
                            "height {}: {} ref(s), {} packet(s)",
                            s.height,
                            s.ref_count(),
                            s.settled.len()
                        )
                    })
                    .collect();
                Ok(format!("finalized {}", parts.join("; ")))
            }
            Op::Finalize { height } => {
                let summary = self.service.finalize_height(height)?;
                Ok(format!(
                    "height {}: {} ref(s), {} packet(s) finalized",
                    summary.height,
                    summary.ref_count(),
                    summary.settled.len()
                ))
            }
            Op::Fraud {
                rollapp,
                index,
                client,
                proof,
            } => {
                let outcome = self.service.handle_fraud(FraudEvidence {
                    rollapp_id: RollappId::new(rollapp),
                    client_id: client.map(ClientId::new),
                    state_index: index,
                    proof: decode_hex(&proof)?,
                })?;
                Ok(match outcome {
                    FraudOutcome::Dismissed => "evidence dismissed".into(),
                    FraudOutcome::Reverted(summary) => format!(
                        "reverted {} ref(s), {} packet(s) of {} from {}",
                        summary.refs.len(),
                        summary.reverted.len(),
                        summary.rollapp_id,
                        summary.from_state_index
                    ),
                })
            }
            Op::Revert { rollapp, index } => {
                let summary = self
                    .service
                    .revert_rollapp(&RollappId::new(rollapp), index)?;
                Ok(format!(
                    "reverted {} ref(s), {} packet(s)",
                    summary.refs.len(),
                    summary.reverted.len()
                ))
            }
            Op::List { status, address } => {
                let packets: Vec<RollappPacket> = match (status, address) {
                    (Some(status), _) => self
                        .service
                        .list_by_status(status)?
                        .collect::<SettlementResult<_>>()?,
                    (None, Some(address)) => self
                        .service
                        .list_by_address(&address)?
                        .collect::<SettlementResult<_>>()?,
                    (None, None) => {
                        let mut counts = Vec::with_capacity(PacketStatus::ALL.len());
                        for status in PacketStatus::ALL {
                            counts.push(format!(
                                "{} {}",
                                status,
                                self.service.list_by_status(status)?.len()
                            ));
                        }
                        return Ok(counts.join(", "));
                    }
                };
                let rows: Vec<String> = packets
                    .iter()
                    .map(|p| {
                        format!(
                            "{} {}/{} {} {} {}",
                            p.key,
                            p.channel_id,
                            p.sequence,
                            p.direction.as_str(),
                            p.status,
                            p.counterparty_address
                        )
                    })
                    .collect();
                Ok(format!("{} packet(s)\n{}", rows.len(), rows.join("\n")))
            }
            Op::Digest => self.service.state_digest(),
        }
    }
}

fn incoming(packet: ScriptPacket) -> SettlementResult<IncomingPacket> {
    let payload = serde_json::to_vec(&packet.transfer)
        .map_err(|e| SettlementError::Serialization(e.to_string()))?;
    Ok(IncomingPacket {
        channel_id: packet.channel,
        sequence: packet.sequence,
        direction: packet.direction,
        payload,
    })
}

fn decode_hex(s: &str) -> SettlementResult<Vec<u8>> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| {
        SettlementError::InvalidArgument(format!("bad hex '{}': {}", s, e))
    })
}
