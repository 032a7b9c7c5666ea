//! Property tests for queue grouping, exactly-once sweeps, the packet state
//! machine and the address index projection.

mod common;

use common::*;
use hub_settlement::prelude::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn rollapp_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("rollapp-a".to_string()),
        Just("rollapp-b".to_string()),
        Just("rollapp-c".to_string()),
        Just("ra".to_string()),
        Just("rollapp-aa".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sweeping a height returns exactly what was enqueued there, grouped one
    /// entry per rollapp in lexicographic order, and only once.
    #[test]
    fn prop_sweep_returns_exactly_what_was_enqueued(
        submissions in prop::collection::vec((0i64..4, rollapp_name()), 1..24)
    ) {
        let h = harness(0);
        let svc = &h.service;
        let mut expected: BTreeMap<Height, BTreeMap<String, Vec<u64>>> = BTreeMap::new();
        let mut next_index: BTreeMap<String, u64> = BTreeMap::new();

        let mut ordered = submissions.clone();
        ordered.sort_by_key(|(offset, _)| *offset);
        for (offset, rollapp) in ordered {
            h.clock.advance_to(offset);
            let index = next_index.entry(rollapp.clone()).or_insert(0);
            *index += 1;
            svc.submit_state_update(update(&rollapp, *index, vec![])).unwrap();
            expected
                .entry(offset)
                .or_default()
                .entry(rollapp)
                .or_default()
                .push(*index);
        }

        h.clock.advance_to(10);
        for height in 0i64..4 {
            let summary = svc.finalize_height(height).unwrap();
            let got: Vec<(String, Vec<u64>)> = summary
                .groups
                .iter()
                .map(|g| (g.rollapp_id.as_str().to_string(), g.state_indexes()))
                .collect();
            let want: Vec<(String, Vec<u64>)> = expected
                .get(&height)
                .map(|m| m.clone().into_iter().collect())
                .unwrap_or_default();
            prop_assert_eq!(got, want);
            prop_assert!(svc.finalize_height(height).unwrap().is_empty());
        }
    }

    /// Every packet ends in exactly one terminal status and the address
    /// index always lists every packet of that address.
    #[test]
    fn prop_address_index_is_projection(
        packets in prop::collection::vec((0u8..3, 0u8..4), 1..16),
        revert_from in 1u64..4,
    ) {
        let h = harness(0);
        let svc = &h.service;
        let mut by_addr: BTreeMap<String, BTreeSet<PacketKey>> = BTreeMap::new();

        for (i, (direction, address)) in packets.iter().enumerate() {
            let index = i as u64 + 1;
            let addr = format!("addr{}", address);
            let incoming = match direction {
                0 => recv_packet("channel-0", index, &addr),
                1 => ack_packet("channel-0", index, &addr),
                _ => IncomingPacket {
                    direction: PacketDirection::OnTimeout,
                    ..ack_packet("channel-0", index, &addr)
                },
            };
            let receipt = svc
                .submit_state_update(update("ra", index, vec![incoming]))
                .unwrap();
            by_addr.entry(addr).or_default().insert(receipt.packets[0]);
        }

        svc.revert_rollapp(&RollappId::new("ra"), revert_from).unwrap();
        h.clock.advance_to(3);
        svc.end_block().unwrap();

        for (addr, keys) in &by_addr {
            let listed: BTreeSet<PacketKey> =
                by_address(svc, addr).into_iter().map(|p| p.key).collect();
            prop_assert_eq!(&listed, keys);
        }

        let finalized = statuses(svc, PacketStatus::Finalized);
        let reverted = statuses(svc, PacketStatus::Reverted);
        prop_assert!(statuses(svc, PacketStatus::Pending).is_empty());
        prop_assert_eq!(finalized.len() + reverted.len(), packets.len());
        for p in &reverted {
            prop_assert!(p.origin.state_index >= revert_from);
        }
        for p in &finalized {
            prop_assert!(p.origin.state_index < revert_from);
            let again = svc.revert_rollapp(&p.rollapp_id, 0).unwrap();
            prop_assert!(again.is_empty());
        }
    }
}
