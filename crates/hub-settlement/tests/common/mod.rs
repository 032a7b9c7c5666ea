//! Shared fixtures for the settlement integration tests.

#![allow(dead_code)]

use hub_settlement::prelude::*;
use hub_settlement::ports::MockProofVerifier;
use std::sync::Arc;

pub type Service = SettlementService<
    InMemoryKVStore,
    Arc<FixedDisputePeriod>,
    Arc<MockProofVerifier>,
    JsonTransferDecoder,
    Arc<RecordingEventSink>,
>;

pub struct Harness {
    pub service: Service,
    pub clock: Arc<FixedDisputePeriod>,
    pub verifier: Arc<MockProofVerifier>,
    pub events: Arc<RecordingEventSink>,
}

/// Service with a 3-block dispute window, clock at `start`.
pub fn harness(start: Height) -> Harness {
    let config = SettlementConfig::for_testing();
    let clock = Arc::new(FixedDisputePeriod::starting_at(
        config.dispute_period_blocks,
        start,
    ));
    let verifier = Arc::new(MockProofVerifier::accept_all());
    let events = Arc::new(RecordingEventSink::new());
    let service = SettlementService::new(
        InMemoryKVStore::new(),
        Arc::clone(&clock),
        Arc::clone(&verifier),
        JsonTransferDecoder,
        Arc::clone(&events),
        config,
    )
    .unwrap();
    Harness {
        service,
        clock,
        verifier,
        events,
    }
}

pub fn transfer_json(sender: &str, receiver: &str) -> Vec<u8> {
    serde_json::to_vec(&TransferPacketData {
        denom: "arax".into(),
        amount: "100".into(),
        sender: sender.into(),
        receiver: receiver.into(),
        memo: String::new(),
    })
    .unwrap()
}

pub fn recv_packet(channel: &str, sequence: u64, receiver: &str) -> IncomingPacket {
    IncomingPacket {
        channel_id: channel.into(),
        sequence,
        direction: PacketDirection::OnRecv,
        payload: transfer_json("rol1sender", receiver),
    }
}

pub fn ack_packet(channel: &str, sequence: u64, sender: &str) -> IncomingPacket {
    IncomingPacket {
        channel_id: channel.into(),
        sequence,
        direction: PacketDirection::OnAck,
        payload: transfer_json(sender, "rol1receiver"),
    }
}

pub fn update(rollapp: &str, index: u64, packets: Vec<IncomingPacket>) -> StateUpdate {
    StateUpdate {
        commitment: StateCommitmentRef::new(rollapp, index),
        packets,
    }
}

pub fn statuses(service: &Service, status: PacketStatus) -> Vec<RollappPacket> {
    service
        .list_by_status(status)
        .unwrap()
        .collect::<SettlementResult<Vec<_>>>()
        .unwrap()
}

pub fn by_address(service: &Service, address: &str) -> Vec<RollappPacket> {
    service
        .list_by_address(address)
        .unwrap()
        .collect::<SettlementResult<Vec<_>>>()
        .unwrap()
}
