//! Event sink adapters.

use crate::events::SettlementEvent;
use crate::ports::SettlementEventSink;
use parking_lot::Mutex;
use tracing::info;

/// Logs every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl SettlementEventSink for TracingEventSink {
    fn publish(&self, event: SettlementEvent) {
        match &event {
            SettlementEvent::StateFinalized {
                commitment,
                creation_height,
            } => info!(
                event = event.name(),
                commitment = %commitment,
                creation_height,
                "state finalized"
            ),
            SettlementEvent::PacketSettled {
                key,
                counterparty_address,
                outcome,
                ..
            } => info!(
                event = event.name(),
                packet = %key,
                counterparty = %counterparty_address,
                outcome = %outcome,
                "packet settled"
            ),
            SettlementEvent::RollappReverted {
                rollapp_id,
                from_state_index,
                reverted_refs,
                reverted_packets,
            } => info!(
                event = event.name(),
                rollapp = %rollapp_id,
                from_state_index,
                reverted_refs,
                reverted_packets,
                "rollapp reverted"
            ),
            SettlementEvent::ClientBound {
                rollapp_id,
                client_id,
            } => info!(
                event = event.name(),
                rollapp = %rollapp_id,
                client = %client_id,
                "canonical client bound"
            ),
        }
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SettlementEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events published so far.
    pub fn events(&self) -> Vec<SettlementEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<SettlementEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl SettlementEventSink for RecordingEventSink {
    fn publish(&self, event: SettlementEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientId, RollappId};
    use std::sync::Arc;

    #[test]
    fn test_recording_sink_through_arc() {
        let sink = Arc::new(RecordingEventSink::new());
        let shared: Arc<RecordingEventSink> = Arc::clone(&sink);
        shared.publish(SettlementEvent::ClientBound {
            rollapp_id: RollappId::new("ra"),
            client_id: ClientId::new("c"),
        });
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }
}
