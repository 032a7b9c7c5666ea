//! # Domain Invariants
//!
//! Business rules shared by the components.

use super::entities::{FinalizationQueueEntry, TransferPacketData};
use super::errors::{SettlementError, SettlementResult};
use super::value_objects::{Height, PacketDirection, RollappId};
use std::collections::HashSet;

/// Default upper bound on rollapp identifier length.
pub const DEFAULT_MAX_ROLLAPP_ID_LEN: usize = 64;

/// Default upper bound on counterparty address length.
pub const DEFAULT_MAX_ADDRESS_LEN: usize = 256;

/// Input bounds enforced by the components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Maximum rollapp identifier length in bytes.
    pub max_rollapp_id_len: usize,
    /// Maximum address length in bytes.
    pub max_address_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_rollapp_id_len: DEFAULT_MAX_ROLLAPP_ID_LEN,
            max_address_len: DEFAULT_MAX_ADDRESS_LEN,
        }
    }
}

impl ValidationLimits {
    /// Rollapp identifiers must be non-empty and bounded.
    pub fn check_rollapp_id(&self, id: &RollappId) -> SettlementResult<()> {
        let len = id.as_str().len();
        if len == 0 || len > self.max_rollapp_id_len {
            return Err(SettlementError::InvalidArgument(format!(
                "rollapp id length {} outside 1..={}",
                len, self.max_rollapp_id_len
            )));
        }
        Ok(())
    }

    /// Addresses must be non-empty and bounded.
    pub fn check_address(&self, address: &str) -> SettlementResult<()> {
        if address.is_empty() || address.len() > self.max_address_len {
            return Err(SettlementError::InvalidArgument(format!(
                "address length {} outside 1..={}",
                address.len(),
                self.max_address_len
            )));
        }
        Ok(())
    }
}

/// Party whose funds are at risk for a packet.
///
/// Fixed policy: receiver for `ON_RECV`, sender for `ON_ACK` and `ON_TIMEOUT`.
pub fn counterparty_address(direction: PacketDirection, data: &TransferPacketData) -> &str {
    match direction {
        PacketDirection::OnRecv => &data.receiver,
        PacketDirection::OnAck | PacketDirection::OnTimeout => &data.sender,
    }
}

/// Heights are non-negative.
pub fn invariant_valid_height(height: Height) -> SettlementResult<()> {
    if height < 0 {
        return Err(SettlementError::InvalidArgument(format!(
            "negative height {}",
            height
        )));
    }
    Ok(())
}

/// A queue entry holds refs of its own rollapp only, without repeats.
pub fn invariant_entry_consistent(entry: &FinalizationQueueEntry) -> SettlementResult<()> {
    invariant_valid_height(entry.creation_height)?;
    let mut seen = HashSet::new();
    for r in &entry.refs {
        if r.rollapp_id != entry.rollapp_id {
            return Err(SettlementError::InvalidArgument(format!(
                "entry ({}, {}) contains ref {} of another rollapp",
                entry.creation_height, entry.rollapp_id, r
            )));
        }
        if !seen.insert(r.state_index) {
            return Err(SettlementError::Conflict(format!("ref {} queued twice", r)));
        }
    }
    Ok(())
}
