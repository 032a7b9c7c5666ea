//! # Settlement Flow Tests
//!
//! End-to-end behaviour of the service: sweeping, fraud handling, atomic
//! rollback, event publication and genesis round trips.

mod common;

use common::*;
use hub_settlement::ports::MockChannelLookup;
use hub_settlement::prelude::*;

// =============================================================================
// SWEEP
// =============================================================================

#[test]
fn test_two_rollapps_same_height_scenario() {
    let h = harness(100);
    let svc = &h.service;

    svc.submit_state_update(update("rollapp-B", 1, vec![])).unwrap();
    let receipt = svc
        .submit_state_update(update("rollapp-A", 1, vec![recv_packet("channel-0", 1, "addr1")]))
        .unwrap();
    assert_eq!(receipt.creation_height, 100);
    let key = receipt.packets[0];

    assert_eq!(statuses(svc, PacketStatus::Pending).len(), 1);

    h.clock.advance_to(103);
    let summary = svc.finalize_height(100).unwrap();
    let order: Vec<_> = summary
        .groups
        .iter()
        .map(|g| (g.rollapp_id.as_str().to_string(), g.state_indexes()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("rollapp-A".to_string(), vec![1]),
            ("rollapp-B".to_string(), vec![1])
        ]
    );

    assert_eq!(svc.get_packet(&key).unwrap().status, PacketStatus::Finalized);
    assert!(statuses(svc, PacketStatus::Pending).is_empty());
    let mine = by_address(svc, "addr1");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, PacketStatus::Finalized);

    // Consumed exactly once.
    assert!(svc.finalize_height(100).unwrap().is_empty());
}

#[test]
fn test_end_block_sweeps_elapsed_heights_in_order() {
    let h = harness(10);
    let svc = &h.service;

    svc.submit_state_update(update("ra", 1, vec![])).unwrap();
    h.clock.advance_to(11);
    svc.submit_state_update(update("ra", 2, vec![])).unwrap();
    h.clock.advance_to(12);
    svc.submit_state_update(update("ra", 3, vec![])).unwrap();

    h.clock.advance_to(14);
    let swept = svc.end_block().unwrap();
    let heights: Vec<_> = swept.iter().map(|s| s.height).collect();
    assert_eq!(heights, vec![10, 11]);
    assert_eq!(svc.pending_entries(12).unwrap().len(), 1);

    h.clock.advance_to(15);
    assert_eq!(svc.end_block().unwrap().len(), 1);
    assert!(svc.end_block().unwrap().is_empty());
}

#[test]
fn test_packets_recorded_after_submission_settle_with_their_ref() {
    let h = harness(5);
    let svc = &h.service;
    svc.submit_state_update(update("ra", 7, vec![])).unwrap();
    let key = svc
        .record_packet(
            StateCommitmentRef::new("ra", 7),
            ack_packet("channel-2", 4, "dym1sender"),
        )
        .unwrap();
    assert_eq!(by_address(svc, "dym1sender").len(), 1);

    h.clock.advance_to(8);
    let summary = svc.finalize_height(5).unwrap();
    assert_eq!(summary.settled.len(), 1);
    assert_eq!(summary.settled[0].key, key);
}

#[test]
fn test_duplicate_submission_conflicts_and_changes_nothing() {
    let h = harness(1);
    let svc = &h.service;
    svc.submit_state_update(update("ra", 1, vec![recv_packet("channel-0", 1, "a")]))
        .unwrap();
    let digest = svc.state_digest().unwrap();

    h.clock.advance_to(2);
    let err = svc
        .submit_state_update(update("ra", 1, vec![recv_packet("channel-0", 2, "a")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Same packet key under a fresh ref: the ref is staged, then rolled back.
    let err = svc
        .submit_state_update(update("ra", 2, vec![recv_packet("channel-0", 1, "a")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(svc.pending_entries(2).unwrap().is_empty());
    assert_eq!(svc.state_digest().unwrap(), digest);
}

// =============================================================================
// FRAUD
// =============================================================================

#[test]
fn test_fraud_reverts_from_index_and_spares_lower_refs() {
    let h = harness(20);
    let svc = &h.service;
    svc.bind_client(&RollappId::new("ra"), &ClientId::new("07-tendermint-0"))
        .unwrap();

    svc.submit_state_update(update("ra", 1, vec![recv_packet("channel-0", 1, "low")]))
        .unwrap();
    h.clock.advance_to(21);
    svc.submit_state_update(update("ra", 2, vec![recv_packet("channel-0", 2, "high")]))
        .unwrap();
    svc.submit_state_update(update("rb", 1, vec![recv_packet("channel-1", 1, "other")]))
        .unwrap();

    let bad = StateCommitmentRef::new("ra", 2);
    h.verifier.set_verdict(bad, ProofVerdict::Rejected);
    let outcome = svc
        .handle_fraud(FraudEvidence {
            rollapp_id: RollappId::new("ra"),
            client_id: None,
            state_index: 2,
            proof: b"root".to_vec(),
        })
        .unwrap();

    let summary = match outcome {
        FraudOutcome::Reverted(summary) => summary,
        FraudOutcome::Dismissed => panic!("fraud should have been proven"),
    };
    assert_eq!(summary.refs, vec![StateCommitmentRef::new("ra", 2)]);
    assert_eq!(summary.reverted.len(), 1);

    assert_eq!(by_address(svc, "high")[0].status, PacketStatus::Reverted);
    assert_eq!(by_address(svc, "low")[0].status, PacketStatus::Pending);
    assert_eq!(by_address(svc, "other")[0].status, PacketStatus::Pending);
    assert_eq!(svc.pending_entries(20).unwrap().len(), 1);
    assert_eq!(svc.pending_entries(21).unwrap().len(), 1);

    let calls = h.verifier.calls();
    assert_eq!(calls[0].0, ClientId::new("07-tendermint-0"));
}

#[test]
fn test_fraud_requires_canonical_client() {
    let h = harness(1);
    let svc = &h.service;
    let evidence = FraudEvidence {
        rollapp_id: RollappId::new("ra"),
        client_id: None,
        state_index: 1,
        proof: vec![],
    };
    assert!(svc.handle_fraud(evidence.clone()).unwrap_err().is_not_found());
    assert!(h.verifier.calls().is_empty());

    svc.bind_client(&RollappId::new("ra"), &ClientId::new("c-good"))
        .unwrap();
    let wrong = FraudEvidence {
        client_id: Some(ClientId::new("c-evil")),
        ..evidence
    };
    assert_eq!(
        svc.handle_fraud(wrong).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert!(h.verifier.calls().is_empty());
}

#[test]
fn test_accepted_claim_dismisses_evidence() {
    let h = harness(1);
    let svc = &h.service;
    svc.bind_client(&RollappId::new("ra"), &ClientId::new("c"))
        .unwrap();
    svc.submit_state_update(update("ra", 1, vec![])).unwrap();
    let digest = svc.state_digest().unwrap();

    let outcome = svc
        .handle_fraud(FraudEvidence {
            rollapp_id: RollappId::new("ra"),
            client_id: Some(ClientId::new("c")),
            state_index: 1,
            proof: vec![1],
        })
        .unwrap();
    assert_eq!(outcome, FraudOutcome::Dismissed);
    assert_eq!(svc.state_digest().unwrap(), digest);
}

#[test]
fn test_revert_is_idempotent() {
    let h = harness(1);
    let svc = &h.service;
    svc.submit_state_update(update("ra", 4, vec![])).unwrap();

    let first = svc.revert_rollapp(&RollappId::new("ra"), 0).unwrap();
    assert_eq!(first.refs.len(), 1);
    let second = svc.revert_rollapp(&RollappId::new("ra"), 0).unwrap();
    assert!(second.is_empty());
}

#[test]
fn test_mutating_while_iterating_a_listing() {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let h = harness(0);
        let svc = &h.service;
        for index in 1..=3 {
            svc.submit_state_update(update(
                "ra",
                index,
                vec![recv_packet("channel-0", index, "addr1")],
            ))
            .unwrap();
        }

        let mut seen = Vec::new();
        for packet in svc.list_by_status(PacketStatus::Pending).unwrap() {
            let packet = packet.unwrap();
            seen.push(packet.status);
            if packet.origin.state_index == 2 {
                svc.revert_rollapp(&packet.rollapp_id, 2).unwrap();
            }
        }
        let mut after: Vec<_> = by_address(svc, "addr1")
            .into_iter()
            .map(|p| (p.origin.state_index, p.status))
            .collect();
        after.sort();
        done_tx.send((seen, after)).unwrap();
    });

    let (seen, after) = done_rx
        .recv_timeout(std::time::Duration::from_secs(10))
        .expect("listing blocked a mutation");
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|s| *s != PacketStatus::Finalized));
    assert_eq!(
        after,
        vec![
            (1, PacketStatus::Pending),
            (2, PacketStatus::Reverted),
            (3, PacketStatus::Reverted),
        ]
    );
}

// =============================================================================
// BINDING
// =============================================================================

#[test]
fn test_binding_is_set_once() {
    let h = harness(1);
    let svc = &h.service;
    let ra = RollappId::new("ra");
    assert_eq!(
        svc.bind_client(&ra, &ClientId::new("c1")).unwrap(),
        BindOutcome::Bound
    );
    assert_eq!(
        svc.bind_client(&ra, &ClientId::new("c2")).unwrap_err().kind(),
        ErrorKind::Conflict
    );
    assert_eq!(svc.resolve_client(&ra).unwrap(), ClientId::new("c1"));
    assert_eq!(
        svc.bind_client(&ra, &ClientId::new("c1")).unwrap(),
        BindOutcome::AlreadyBound
    );
}

#[test]
fn test_bind_from_channel() {
    let h = harness(1);
    let svc = &h.service;
    let lookup = MockChannelLookup::default().with_channel("channel-5", "07-tendermint-9");

    let (client, outcome) = svc
        .bind_from_channel(&RollappId::new("ra"), "channel-5", &lookup)
        .unwrap();
    assert_eq!(client, ClientId::new("07-tendermint-9"));
    assert_eq!(outcome, BindOutcome::Bound);
    assert!(svc
        .bind_from_channel(&RollappId::new("rb"), "channel-6", &lookup)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_verify_state_commitment_never_uses_unbound_client() {
    let h = harness(1);
    let svc = &h.service;
    let ra = RollappId::new("ra");
    assert!(svc
        .verify_state_commitment(&ra, 1, b"proof")
        .unwrap_err()
        .is_not_found());
    svc.bind_client(&ra, &ClientId::new("c")).unwrap();
    assert_eq!(
        svc.verify_state_commitment(&ra, 1, b"proof").unwrap(),
        ProofVerdict::Accepted
    );
}

// =============================================================================
// EVENTS
// =============================================================================

#[test]
fn test_events_only_for_committed_steps() {
    let h = harness(1);
    let svc = &h.service;
    svc.bind_client(&RollappId::new("ra"), &ClientId::new("c"))
        .unwrap();
    svc.submit_state_update(update("ra", 1, vec![recv_packet("channel-0", 1, "dym1r")]))
        .unwrap();
    h.events.take();

    // Window still open: nothing committed, nothing published.
    assert!(svc.finalize_height(1).is_err());
    assert!(h.events.events().is_empty());

    h.clock.advance_to(4);
    svc.end_block().unwrap();
    let names: Vec<_> = h.events.events().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["state_finalized", "packet_settled"]);
    match &h.events.events()[1] {
        SettlementEvent::PacketSettled {
            counterparty_address,
            outcome,
            ..
        } => {
            assert_eq!(counterparty_address, "dym1r");
            assert_eq!(*outcome, SettlementOutcome::Finalized);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

// =============================================================================
// GENESIS / DETERMINISM
// =============================================================================

fn populate(h: &Harness) {
    let svc = &h.service;
    svc.bind_client(&RollappId::new("ra"), &ClientId::new("c-a"))
        .unwrap();
    svc.submit_state_update(update("ra", 1, vec![recv_packet("channel-0", 1, "x")]))
        .unwrap();
    svc.submit_state_update(update("rb", 1, vec![ack_packet("channel-1", 1, "y")]))
        .unwrap();
    h.clock.advance_to(2);
    svc.submit_state_update(update("ra", 2, vec![recv_packet("channel-0", 2, "x")]))
        .unwrap();
    h.clock.advance_to(4);
    svc.end_block().unwrap();
}

#[test]
fn test_replicas_reach_identical_digest() {
    let a = harness(1);
    let b = harness(1);
    populate(&a);
    populate(&b);
    assert_eq!(
        a.service.state_digest().unwrap(),
        b.service.state_digest().unwrap()
    );
}

#[test]
fn test_genesis_round_trip() {
    let source = harness(1);
    populate(&source);
    let genesis = source.service.export_genesis().unwrap();
    assert_eq!(genesis.queue.len(), 1);
    assert_eq!(genesis.packets.len(), 3);

    let target = harness(4);
    target.service.init_genesis(genesis.clone()).unwrap();
    assert_eq!(
        target.service.state_digest().unwrap(),
        source.service.state_digest().unwrap()
    );
    assert_eq!(target.service.export_genesis().unwrap(), genesis);

    // Only into an empty store.
    assert_eq!(
        target.service.init_genesis(genesis).unwrap_err().kind(),
        ErrorKind::Conflict
    );
}

#[test]
fn test_legacy_import_then_sweep() {
    let h = harness(50);
    let svc = &h.service;
    let groups = svc
        .import_legacy_queue(
            45,
            vec![
                StateCommitmentRef::new("rc", 3),
                StateCommitmentRef::new("ra", 8),
                StateCommitmentRef::new("rc", 4),
            ],
        )
        .unwrap();
    assert_eq!(groups, 2);
    let swept = svc.end_block().unwrap();
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].groups[0].rollapp_id, RollappId::new("ra"));
    assert_eq!(swept[0].groups[1].state_indexes(), vec![3, 4]);
}

#[test]
fn test_rebuild_indices_keeps_digest() {
    let h = harness(1);
    populate(&h);
    let before = h.service.state_digest().unwrap();
    assert_eq!(h.service.rebuild_indices().unwrap(), 3);
    assert_eq!(h.service.state_digest().unwrap(), before);
}
