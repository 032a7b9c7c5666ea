//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the settlement core requires from the host application:
//! an ordered key-value store, the block clock and dispute-window policy,
//! proof verification, transfer payload decoding, channel-to-client lookup
//! and an event sink through which the ledger learns about outcomes.

use crate::domain::{
    ClientId, Height, KVStoreError, SettlementError, SettlementResult, StateCommitmentRef,
    TransferPacketData,
};
use crate::events::SettlementEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Read side of the key-value store.
pub trait StateReader {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// All pairs whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// Smallest key `>= start` that starts with `prefix`. Reads no values.
    ///
    /// `start` must itself start with `prefix`.
    fn first_key_from(&self, start: &[u8], prefix: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;
}

/// Abstract interface for ordered key-value database operations.
///
/// Production: `RocksDbStore` (feature `rocksdb`)
/// Testing: `InMemoryKVStore`
pub trait KeyValueStore: StateReader + Send + Sync {
    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Block clock and dispute-window policy.
///
/// The core never computes time itself.
pub trait DisputeWindow: Send + Sync {
    /// Height of the block currently being processed.
    fn current_height(&self) -> Height;

    /// Whether the dispute window of refs created at `creation_height` has elapsed.
    fn is_window_elapsed(&self, creation_height: Height) -> bool;
}

/// Verdict of the proof-verification collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofVerdict {
    /// The rollapp's claimed state is consistent with the proof.
    Accepted,
    /// The proof contradicts the rollapp's claimed state.
    Rejected,
}

/// Proof verification against a specific client's root of trust.
pub trait ProofVerifier: Send + Sync {
    /// Check the claimed state `commitment` against `proof` using `client_id`.
    fn verify_state(
        &self,
        client_id: &ClientId,
        commitment: &StateCommitmentRef,
        proof: &[u8],
    ) -> SettlementResult<ProofVerdict>;
}

/// Extracts transfer data from an opaque packet payload.
pub trait TransferDataDecoder: Send + Sync {
    /// Decode the payload.
    fn decode(&self, payload: &[u8]) -> SettlementResult<TransferPacketData>;
}

/// Resolves the verification client behind a channel.
pub trait ChannelClientLookup: Send + Sync {
    /// Client id of the connection that `channel_id` runs over.
    fn client_for_channel(&self, channel_id: &str) -> SettlementResult<ClientId>;
}

/// Receives outcomes after a step commits.
///
/// The ledger collaborator subscribes here to move funds.
pub trait SettlementEventSink: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: SettlementEvent);
}

// Shared collaborators: the host keeps a handle (to advance the clock or
// read recorded events) while the service owns another.

impl<T: DisputeWindow + ?Sized> DisputeWindow for Arc<T> {
    fn current_height(&self) -> Height {
        (**self).current_height()
    }

    fn is_window_elapsed(&self, creation_height: Height) -> bool {
        (**self).is_window_elapsed(creation_height)
    }
}

impl<T: ProofVerifier + ?Sized> ProofVerifier for Arc<T> {
    fn verify_state(
        &self,
        client_id: &ClientId,
        commitment: &StateCommitmentRef,
        proof: &[u8],
    ) -> SettlementResult<ProofVerdict> {
        (**self).verify_state(client_id, commitment, proof)
    }
}

impl<T: SettlementEventSink + ?Sized> SettlementEventSink for Arc<T> {
    fn publish(&self, event: SettlementEvent) {
        (**self).publish(event)
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock verifier with a default verdict and per-commitment overrides.
pub struct MockProofVerifier {
    default: ProofVerdict,
    overrides: Mutex<HashMap<StateCommitmentRef, ProofVerdict>>,
    calls: Mutex<Vec<(ClientId, StateCommitmentRef)>>,
}

impl MockProofVerifier {
    /// Verifier that accepts every claimed state.
    pub fn accept_all() -> Self {
        Self::with_default(ProofVerdict::Accepted)
    }

    /// Verifier that rejects every claimed state.
    pub fn reject_all() -> Self {
        Self::with_default(ProofVerdict::Rejected)
    }

    fn with_default(default: ProofVerdict) -> Self {
        Self {
            default,
            overrides: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Override the verdict for one commitment.
    pub fn set_verdict(&self, commitment: StateCommitmentRef, verdict: ProofVerdict) {
        self.overrides.lock().insert(commitment, verdict);
    }

    /// Clients the verifier was asked to use, in call order.
    pub fn calls(&self) -> Vec<(ClientId, StateCommitmentRef)> {
        self.calls.lock().clone()
    }
}

impl ProofVerifier for MockProofVerifier {
    fn verify_state(
        &self,
        client_id: &ClientId,
        commitment: &StateCommitmentRef,
        _proof: &[u8],
    ) -> SettlementResult<ProofVerdict> {
        self.calls.lock().push((client_id.clone(), commitment.clone()));
        Ok(self
            .overrides
            .lock()
            .get(commitment)
            .copied()
            .unwrap_or(self.default))
    }
}

/// Mock channel lookup backed by a map.
#[derive(Default)]
pub struct MockChannelLookup {
    /// channel id -> client id
    pub clients: HashMap<String, ClientId>,
}

impl MockChannelLookup {
    /// Register a channel.
    pub fn with_channel(mut self, channel_id: &str, client_id: &str) -> Self {
        self.clients
            .insert(channel_id.to_string(), ClientId::new(client_id));
        self
    }
}

impl ChannelClientLookup for MockChannelLookup {
    fn client_for_channel(&self, channel_id: &str) -> SettlementResult<ClientId> {
        self.clients
            .get(channel_id)
            .cloned()
            .ok_or_else(|| SettlementError::NotFound(format!("connection for channel {}", channel_id)))
    }
}
