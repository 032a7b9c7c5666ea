//! # Domain Value Objects
//!
//! Identifiers, enums and immutable references used across the settlement core.

use super::errors::{SettlementError, SettlementResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Anchor-chain block height.
pub type Height = i64;

/// Monotonic index of a rollapp state submission.
pub type StateIndex = u64;

/// Rollapp (chain) identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollappId(String);

impl RollappId {
    /// Wrap a rollapp identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RollappId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RollappId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Verification (light) client identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap a client identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Reference to one rollapp state submission pending dispute.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateCommitmentRef {
    /// Submitting rollapp.
    pub rollapp_id: RollappId,
    /// Index of the state update.
    pub state_index: StateIndex,
}

impl StateCommitmentRef {
    /// Create a new reference.
    pub fn new(rollapp_id: impl Into<String>, state_index: StateIndex) -> Self {
        Self {
            rollapp_id: RollappId::new(rollapp_id),
            state_index,
        }
    }
}

impl fmt::Display for StateCommitmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rollapp_id, self.state_index)
    }
}

/// Direction of a delayed packet relative to the hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketDirection {
    /// Packet received from the rollapp.
    OnRecv,
    /// Acknowledgement of a packet the hub sent.
    OnAck,
    /// Timeout of a packet the hub sent.
    OnTimeout,
}

impl PacketDirection {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnRecv => "ON_RECV",
            Self::OnAck => "ON_ACK",
            Self::OnTimeout => "ON_TIMEOUT",
        }
    }

    /// Stable discriminant used in key derivation.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::OnRecv => 0,
            Self::OnAck => 1,
            Self::OnTimeout => 2,
        }
    }
}

impl TryFrom<i32> for PacketDirection {
    type Error = SettlementError;

    fn try_from(value: i32) -> SettlementResult<Self> {
        match value {
            0 => Ok(Self::OnRecv),
            1 => Ok(Self::OnAck),
            2 => Ok(Self::OnTimeout),
            other => Err(SettlementError::InvalidArgument(format!(
                "unknown packet direction {}",
                other
            ))),
        }
    }
}

impl FromStr for PacketDirection {
    type Err = SettlementError;

    fn from_str(s: &str) -> SettlementResult<Self> {
        match s {
            "ON_RECV" => Ok(Self::OnRecv),
            "ON_ACK" => Ok(Self::OnAck),
            "ON_TIMEOUT" => Ok(Self::OnTimeout),
            other => Err(SettlementError::InvalidArgument(format!(
                "unknown packet direction {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packet lifecycle status.
///
/// ```text
/// PENDING ──finalize──→ FINALIZED
///    │
///    └──────revert────→ REVERTED
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketStatus {
    /// Awaiting finalization of the originating state commitment.
    #[default]
    Pending,
    /// Originating state commitment finalized.
    Finalized,
    /// Originating state commitment reverted.
    Reverted,
}

impl PacketStatus {
    /// All statuses, in index order.
    pub const ALL: [PacketStatus; 3] = [Self::Pending, Self::Finalized, Self::Reverted];

    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: PacketStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Finalized) | (Self::Pending, Self::Reverted)
        )
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Reverted)
    }

    /// Discriminant used in the status index key.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Finalized => 1,
            Self::Reverted => 2,
        }
    }
}

impl fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Finalized => "FINALIZED",
            Self::Reverted => "REVERTED",
        };
        f.write_str(name)
    }
}

/// Outcome applied to the packets of a resolved state commitment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementOutcome {
    /// Dispute window elapsed without fraud.
    Finalized,
    /// Fraud proven against the commitment.
    Reverted,
}

impl SettlementOutcome {
    /// Terminal packet status for this outcome.
    pub fn status(&self) -> PacketStatus {
        match self {
            Self::Finalized => PacketStatus::Finalized,
            Self::Reverted => PacketStatus::Reverted,
        }
    }
}

impl fmt::Display for SettlementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.status().fmt(f)
    }
}

/// Opaque packet identifier derived from channel, sequence and direction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketKey([u8; 32]);

impl PacketKey {
    /// Key length in bytes.
    pub const LEN: usize = 32;

    /// Derive the key: SHA-256 over `len(channel) | channel | sequence | direction`.
    pub fn derive(channel_id: &str, sequence: u64, direction: PacketDirection) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((channel_id.len() as u32).to_be_bytes());
        hasher.update(channel_id.as_bytes());
        hasher.update(sequence.to_be_bytes());
        hasher.update([direction.as_u8()]);
        Self(hasher.finalize().into())
    }

    /// Parse from a key-suffix slice.
    pub fn from_slice(bytes: &[u8]) -> SettlementResult<Self> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            SettlementError::Serialization(format!("packet key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> SettlementResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| SettlementError::InvalidArgument(format!("packet key hex: {}", e)))?;
        Self::from_slice(&bytes)
            .map_err(|_| SettlementError::InvalidArgument(format!("packet key length {}", bytes.len())))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketKey({})", &hex::encode(self.0)[..16])
    }
}
