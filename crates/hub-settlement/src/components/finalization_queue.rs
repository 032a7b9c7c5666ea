//! # Finalization Queue
//!
//! Height-indexed queue of state commitments awaiting their dispute window.
//!
//! Entries are stored grouped by rollapp: one entry per `(height, rollapp)`,
//! keyed so that a height scan yields rollapps in lexicographic order. A
//! locator per queued ref maps it back to its height, which gives duplicate
//! detection and lets a revert touch only the offending rollapp's entries.

use super::{decode, encode};
use crate::domain::keys;
use crate::domain::{
    invariant_valid_height, FinalizationQueueEntry, Height, RollappId, SettlementError,
    SettlementResult, StateCommitmentRef, StateIndex, ValidationLimits,
};
use crate::ports::StateReader;
use crate::staging::StagedWrites;
use std::collections::BTreeMap;
use tracing::debug;

/// Owner of the queue entry and locator maps.
#[derive(Clone, Debug, Default)]
pub struct FinalizationQueue {
    limits: ValidationLimits,
}

impl FinalizationQueue {
    /// Queue enforcing `limits` on incoming refs.
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    /// Append `commitment` to the entry for `(height, rollapp)`.
    ///
    /// `submission_height` is the height the caller is currently processing;
    /// any other `height` is rejected. A ref already queued anywhere is a
    /// conflict.
    pub fn enqueue<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        submission_height: Height,
        height: Height,
        commitment: StateCommitmentRef,
    ) -> SettlementResult<()> {
        invariant_valid_height(height)?;
        if height != submission_height {
            return Err(SettlementError::InvalidArgument(format!(
                "enqueue at height {} while submitting at {}",
                height, submission_height
            )));
        }
        self.limits.check_rollapp_id(&commitment.rollapp_id)?;

        if let Some(existing) = Self::queued_height(&*tx, &commitment)? {
            return Err(SettlementError::Conflict(format!(
                "ref {} already queued at height {}",
                commitment, existing
            )));
        }

        let entry_key = keys::queue_entry_key(height, &commitment.rollapp_id);
        let mut entry = match tx.get(&entry_key)? {
            Some(bytes) => decode::<FinalizationQueueEntry>(&bytes)?,
            None => FinalizationQueueEntry::new(height, commitment.rollapp_id.clone()),
        };

        tx.put(
            keys::locator_key(&commitment),
            keys::encode_locator_value(height),
        );
        debug!(height, commitment = %commitment, "enqueued state commitment");
        entry.push(commitment)?;
        tx.put(entry_key, encode(&entry)?);
        Ok(())
    }

    /// Remove and return every entry at `height`, ordered by rollapp id.
    ///
    /// An empty height yields an empty list.
    pub fn sweep_height<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        height: Height,
    ) -> SettlementResult<Vec<FinalizationQueueEntry>> {
        let scanned = tx.prefix_scan(&keys::queue_height_prefix(height))?;
        let mut entries = Vec::with_capacity(scanned.len());
        for (key, value) in scanned {
            let entry: FinalizationQueueEntry = decode(&value)?;
            for commitment in &entry.refs {
                tx.delete(keys::locator_key(commitment));
            }
            tx.delete(key);
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Remove every queued ref of `rollapp_id` with `state_index >= from`,
    /// across all heights.
    ///
    /// Returns the removed refs in ascending state-index order, or `NotFound`
    /// when nothing matched.
    pub fn revert<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        rollapp_id: &RollappId,
        from: StateIndex,
    ) -> SettlementResult<Vec<StateCommitmentRef>> {
        let mut by_height: BTreeMap<Height, Vec<StateIndex>> = BTreeMap::new();
        let mut removed = Vec::new();

        // Locator keys end in a big-endian index, so the scan is index-ordered.
        for (key, value) in tx.prefix_scan(&keys::locator_rollapp_prefix(rollapp_id))? {
            let state_index = keys::state_index_from_locator(&key)?;
            if state_index < from {
                continue;
            }
            let height = keys::decode_locator_value(&value)?;
            by_height.entry(height).or_default().push(state_index);
            removed.push(StateCommitmentRef {
                rollapp_id: rollapp_id.clone(),
                state_index,
            });
            tx.delete(key);
        }

        if removed.is_empty() {
            return Err(SettlementError::NotFound(format!(
                "no queued refs for {} from state index {}",
                rollapp_id, from
            )));
        }

        for height in by_height.keys() {
            let entry_key = keys::queue_entry_key(*height, rollapp_id);
            let bytes = tx.get(&entry_key)?.ok_or_else(|| {
                SettlementError::Serialization(format!(
                    "locator points at missing entry ({}, {})",
                    height, rollapp_id
                ))
            })?;
            let mut entry: FinalizationQueueEntry = decode(&bytes)?;
            entry.refs.retain(|r| r.state_index < from);
            if entry.is_empty() {
                tx.delete(entry_key);
            } else {
                tx.put(entry_key, encode(&entry)?);
            }
        }

        debug!(
            rollapp_id = %rollapp_id,
            from,
            removed = removed.len(),
            heights = by_height.len(),
            "reverted queued refs"
        );
        Ok(removed)
    }

    /// Write a legacy flat ref list recorded at `height` in grouped form.
    ///
    /// Refs are grouped per rollapp (groups in lexicographic order, refs in
    /// list order). Returns the number of groups written.
    pub fn import_flat<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        height: Height,
        refs: Vec<StateCommitmentRef>,
    ) -> SettlementResult<usize> {
        let mut groups: BTreeMap<RollappId, Vec<StateCommitmentRef>> = BTreeMap::new();
        for r in refs {
            groups.entry(r.rollapp_id.clone()).or_default().push(r);
        }
        let count = groups.len();
        for r in groups.into_values().flatten() {
            self.enqueue(tx, height, height, r)?;
        }
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Entries at `height`, ordered by rollapp id.
    pub fn entries_at<R: StateReader + ?Sized>(
        reader: &R,
        height: Height,
    ) -> SettlementResult<Vec<FinalizationQueueEntry>> {
        reader
            .prefix_scan(&keys::queue_height_prefix(height))?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }

    /// Entry for `(height, rollapp)`, if any.
    pub fn entry<R: StateReader + ?Sized>(
        reader: &R,
        height: Height,
        rollapp_id: &RollappId,
    ) -> SettlementResult<Option<FinalizationQueueEntry>> {
        reader
            .get(&keys::queue_entry_key(height, rollapp_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Height at which `commitment` is queued, if it is.
    pub fn queued_height<R: StateReader + ?Sized>(
        reader: &R,
        commitment: &StateCommitmentRef,
    ) -> SettlementResult<Option<Height>> {
        reader
            .get(&keys::locator_key(commitment))?
            .map(|bytes| keys::decode_locator_value(&bytes))
            .transpose()
    }

    /// Queued heights, ascending, up to the first one whose window has not
    /// elapsed.
    ///
    /// Seeks one key per height and never reads entries, so the cost is
    /// bounded by the number of elapsed heights, not the queue length.
    pub fn elapsed_heights<R, F>(reader: &R, is_elapsed: F) -> SettlementResult<Vec<Height>>
    where
        R: StateReader + ?Sized,
        F: Fn(Height) -> bool,
    {
        let prefix = keys::queue_prefix();
        let mut from = prefix.clone();
        let mut heights: Vec<Height> = Vec::new();
        while let Some(key) = reader.first_key_from(&from, &prefix)? {
            let height = keys::height_from_queue_key(&key)?;
            if !is_elapsed(height) {
                break;
            }
            heights.push(height);
            match height.checked_add(1) {
                Some(next) => from = keys::queue_height_prefix(next),
                None => break,
            }
        }
        Ok(heights)
    }

    /// Every entry in height then rollapp order.
    pub fn all_entries<R: StateReader + ?Sized>(
        reader: &R,
    ) -> SettlementResult<Vec<FinalizationQueueEntry>> {
        reader
            .prefix_scan(&keys::queue_prefix())?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }
}
