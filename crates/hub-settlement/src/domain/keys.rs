//! # Store Key Layout
//!
//! All settlement state lives in one ordered key space, partitioned by a
//! one-byte prefix per map. Integers are big-endian so byte order matches
//! numeric order; heights have the sign bit flipped for the same reason.
//! Strings followed by more key material carry a `u16` length prefix so that
//! one identifier can never be a key prefix of another.
//!
//! | Prefix | Key | Value |
//! |--------|-----|-------|
//! | `0x01` | height, rollapp id | `FinalizationQueueEntry` |
//! | `0x02` | len, rollapp id, state index | creation height |
//! | `0x10` | packet key | `RollappPacket` |
//! | `0x11` | status, packet key | - |
//! | `0x12` | len, address, packet key | - |
//! | `0x13` | len, rollapp id, state index, packet key | - |
//! | `0x20` | rollapp id | `CanonicalBinding` |

use super::errors::{SettlementError, SettlementResult};
use super::value_objects::{Height, PacketKey, PacketStatus, RollappId, StateCommitmentRef};

/// Queue entries by `(height, rollapp)`.
pub const QUEUE_ENTRY_PREFIX: u8 = 0x01;
/// Queued ref locator: ref -> creation height.
pub const QUEUE_LOCATOR_PREFIX: u8 = 0x02;
/// Primary packet map.
pub const PACKET_PREFIX: u8 = 0x10;
/// Packets by status.
pub const PACKET_BY_STATUS_PREFIX: u8 = 0x11;
/// Packets by counterparty address.
pub const PACKET_BY_ADDRESS_PREFIX: u8 = 0x12;
/// Pending packets by originating commitment.
pub const PACKET_BY_COMMITMENT_PREFIX: u8 = 0x13;
/// Canonical client bindings.
pub const BINDING_PREFIX: u8 = 0x20;

const SIGN_BIT: u64 = 1 << 63;

fn encode_height(height: Height) -> [u8; 8] {
    ((height as u64) ^ SIGN_BIT).to_be_bytes()
}

fn decode_height(bytes: &[u8]) -> SettlementResult<Height> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| corrupt("height must be 8 bytes"))?;
    Ok((u64::from_be_bytes(raw) ^ SIGN_BIT) as Height)
}

fn push_len_prefixed(key: &mut Vec<u8>, s: &str) {
    // Identifiers are bounded well below u16::MAX by ValidationLimits.
    key.extend_from_slice(&(s.len() as u16).to_be_bytes());
    key.extend_from_slice(s.as_bytes());
}

fn corrupt(message: &str) -> SettlementError {
    SettlementError::Serialization(format!("malformed store key: {}", message))
}

// =============================================================================
// Finalization queue
// =============================================================================

/// Prefix of every queue entry.
pub fn queue_prefix() -> Vec<u8> {
    vec![QUEUE_ENTRY_PREFIX]
}

/// Prefix of every queue entry at `height`.
pub fn queue_height_prefix(height: Height) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(QUEUE_ENTRY_PREFIX);
    key.extend_from_slice(&encode_height(height));
    key
}

/// Key of the entry for `(height, rollapp)`.
///
/// The rollapp id is the key suffix, so a height scan yields rollapps in
/// lexicographic byte order.
pub fn queue_entry_key(height: Height, rollapp_id: &RollappId) -> Vec<u8> {
    let mut key = queue_height_prefix(height);
    key.extend_from_slice(rollapp_id.as_str().as_bytes());
    key
}

/// Creation height encoded in a queue entry key.
pub fn height_from_queue_key(key: &[u8]) -> SettlementResult<Height> {
    if key.len() < 9 || key[0] != QUEUE_ENTRY_PREFIX {
        return Err(corrupt("not a queue entry key"));
    }
    decode_height(&key[1..9])
}

/// Prefix of every locator for `rollapp`.
pub fn locator_rollapp_prefix(rollapp_id: &RollappId) -> Vec<u8> {
    let mut key = vec![QUEUE_LOCATOR_PREFIX];
    push_len_prefixed(&mut key, rollapp_id.as_str());
    key
}

/// Locator key for a queued ref.
pub fn locator_key(commitment: &StateCommitmentRef) -> Vec<u8> {
    let mut key = locator_rollapp_prefix(&commitment.rollapp_id);
    key.extend_from_slice(&commitment.state_index.to_be_bytes());
    key
}

/// State index encoded at the tail of a locator key.
pub fn state_index_from_locator(key: &[u8]) -> SettlementResult<u64> {
    let tail = key
        .len()
        .checked_sub(8)
        .map(|start| &key[start..])
        .ok_or_else(|| corrupt("locator too short"))?;
    let raw: [u8; 8] = tail.try_into().map_err(|_| corrupt("locator index"))?;
    Ok(u64::from_be_bytes(raw))
}

/// Encode a creation height as a locator value.
pub fn encode_locator_value(height: Height) -> Vec<u8> {
    encode_height(height).to_vec()
}

/// Decode a locator value.
pub fn decode_locator_value(value: &[u8]) -> SettlementResult<Height> {
    decode_height(value)
}

// =============================================================================
// Packets
// =============================================================================

/// Prefix of the primary packet map.
pub fn packet_prefix() -> Vec<u8> {
    vec![PACKET_PREFIX]
}

/// Primary key of a packet.
pub fn packet_key(key: &PacketKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + PacketKey::LEN);
    out.push(PACKET_PREFIX);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Prefix of the status index for `status`.
pub fn status_index_prefix(status: PacketStatus) -> Vec<u8> {
    vec![PACKET_BY_STATUS_PREFIX, status.as_u8()]
}

/// Status index key.
pub fn status_index_key(status: PacketStatus, key: &PacketKey) -> Vec<u8> {
    let mut out = status_index_prefix(status);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Prefix of the address index for `address`.
pub fn address_index_prefix(address: &str) -> Vec<u8> {
    let mut out = vec![PACKET_BY_ADDRESS_PREFIX];
    push_len_prefixed(&mut out, address);
    out
}

/// Address index key.
pub fn address_index_key(address: &str, key: &PacketKey) -> Vec<u8> {
    let mut out = address_index_prefix(address);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Prefix of the commitment join for one ref.
pub fn commitment_index_prefix(commitment: &StateCommitmentRef) -> Vec<u8> {
    let mut out = vec![PACKET_BY_COMMITMENT_PREFIX];
    push_len_prefixed(&mut out, commitment.rollapp_id.as_str());
    out.extend_from_slice(&commitment.state_index.to_be_bytes());
    out
}

/// Commitment join key.
pub fn commitment_index_key(commitment: &StateCommitmentRef, key: &PacketKey) -> Vec<u8> {
    let mut out = commitment_index_prefix(commitment);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Packet key at the tail of any index key.
pub fn packet_key_suffix(index_key: &[u8]) -> SettlementResult<PacketKey> {
    let start = index_key
        .len()
        .checked_sub(PacketKey::LEN)
        .ok_or_else(|| corrupt("index key too short"))?;
    PacketKey::from_slice(&index_key[start..])
}

// =============================================================================
// Bindings
// =============================================================================

/// Prefix of every binding.
pub fn binding_prefix() -> Vec<u8> {
    vec![BINDING_PREFIX]
}

/// Binding key for a rollapp.
pub fn binding_key(rollapp_id: &RollappId) -> Vec<u8> {
    let mut out = binding_prefix();
    out.extend_from_slice(rollapp_id.as_str().as_bytes());
    out
}
